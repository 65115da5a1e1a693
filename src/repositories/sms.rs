use async_trait::async_trait;

mod twilio;

pub use twilio::TwilioSms;

#[async_trait]
pub trait SmsSender: Send + Sync + 'static {
    /// Fire and forget. Delivery failures are logged, never returned.
    async fn send(&self, phone_number: &str, message: &str);
}

/// Used when no SMS provider is configured.
pub struct DisabledSms;

#[async_trait]
impl SmsSender for DisabledSms {
    async fn send(&self, _phone_number: &str, message: &str) {
        log::warn!("SMS provider not configured, dropping message: {}", message);
    }
}
