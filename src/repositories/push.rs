use std::collections::BTreeMap;

use async_trait::async_trait;

mod fcm;

pub use fcm::FcmPush;

pub type PushData = BTreeMap<String, String>;

#[async_trait]
pub trait PushSender: Send + Sync + 'static {
    /// Returns the provider's delivery receipt.
    async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<String, anyhow::Error>;
}

/// Used when no push provider is configured.
pub struct DisabledPush;

#[async_trait]
impl PushSender for DisabledPush {
    async fn send(
        &self,
        _device_token: &str,
        title: &str,
        _body: &str,
        _data: &PushData,
    ) -> Result<String, anyhow::Error> {
        log::warn!("Push provider not configured, dropping notification: {}", title);
        anyhow::bail!("Push provider not configured")
    }
}
