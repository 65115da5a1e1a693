use crate::settings;

use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::json;

use super::{PushData, PushSender};

pub struct FcmPush {
    url: String,
    project_id: String,
    access_token: String,
    link: String,
    icon: Option<String>,
    badge: Option<String>,
    vibrate: Vec<u32>,
    action_title: String,
    client: reqwest::Client,
}

impl FcmPush {
    pub fn new(settings: &settings::Push, timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: settings.url.trim_end_matches('/').to_string(),
            project_id: settings.project_id.clone(),
            access_token: settings.access_token.clone(),
            link: settings.link.clone(),
            icon: settings.icon.clone(),
            badge: settings.badge.clone(),
            vibrate: settings.vibrate.clone(),
            action_title: settings.action_title.clone(),
            client,
        })
    }

    fn send_url(&self) -> String {
        format!("{}/v1/projects/{}/messages:send", self.url, self.project_id)
    }

    fn message(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> serde_json::Value {
        let mut notification = json!({
            "vibrate": self.vibrate,
            "actions": [{
                "action": "view",
                "title": self.action_title
            }]
        });
        if let Some(icon) = &self.icon {
            notification["icon"] = json!(icon);
        }
        if let Some(badge) = &self.badge {
            notification["badge"] = json!(badge);
        }

        json!({
            "message": {
                "token": device_token,
                "notification": {
                    "title": title,
                    "body": body
                },
                "data": data,
                "webpush": {
                    "fcm_options": {
                        "link": self.link
                    },
                    "notification": notification
                }
            }
        })
    }
}

#[async_trait]
impl PushSender for FcmPush {
    async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<String, anyhow::Error> {
        let payload = self.message(device_token, title, body, data);

        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                log::error!("Error sending push notification: {}", e);
                e
            })?;

        let status = response.status();
        let response_json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let reason = response_json["error"]["message"]
                .as_str()
                .unwrap_or("no message")
                .to_string();
            log::error!("Push notification rejected ({}): {}", status, reason);
            bail!("FCM returned {}: {}", status, reason)
        }

        match response_json.get("name").and_then(|name| name.as_str()) {
            Some(name) => {
                log::info!("Push notification sent successfully: {}", name);
                Ok(name.to_string())
            }
            None => bail!("FCM: Bad response format."),
        }
    }
}
