use crate::settings;

use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;

use super::SmsSender;

pub struct TwilioSms {
    url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioSms {
    pub fn new(settings: &settings::Sms, timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: settings.url.trim_end_matches('/').to_string(),
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from_number: settings.from_number.clone(),
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.url, self.account_sid
        )
    }

    async fn publish(&self, phone_number: &str, message: &str) -> Result<String, anyhow::Error> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", phone_number),
                ("From", self.from_number.as_str()),
                ("Body", message),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            bail!(
                "SMS gateway returned {}: {}",
                status,
                body["message"].as_str().unwrap_or("no message")
            )
        }

        match body.get("sid").and_then(|sid| sid.as_str()) {
            Some(sid) => Ok(sid.to_string()),
            None => bail!("SMS gateway: Bad response format."),
        }
    }
}

#[async_trait]
impl SmsSender for TwilioSms {
    async fn send(&self, phone_number: &str, message: &str) {
        match self.publish(phone_number, message).await {
            Ok(sid) => log::info!("SMS sent ({}): {}", sid, message),
            Err(e) => log::error!("Error sending SMS: {}", e),
        }
    }
}
