// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! OneSignal push notification delivery, addressed by an Actor's
//! `userid` (the OneSignal player/subscription id).

use super::{Provider, ProviderContext, ProviderType, SendResult, SentCallback, SentReceipt};
use crate::error::NotifyError;
use crate::model::{Message, Recipient};
use async_trait::async_trait;
use reqwest::Client;

const ONESIGNAL_API: &str = "https://onesignal.com/api/v1/notifications";

pub struct OneSignalProvider {
    client: Client,
    app_id: Option<String>,
    api_key: Option<String>,
    sent_callback: Option<SentCallback>,
}

impl OneSignalProvider {
    pub fn new(ctx: &ProviderContext) -> Result<Self, NotifyError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| NotifyError::Provider(e.to_string()))?,
            app_id: ctx.settings.onesignal.app_id.clone(),
            api_key: ctx.settings.onesignal.api_key.clone(),
            sent_callback: ctx.sent_callback.clone(),
        })
    }

    fn player_id(to: &Recipient) -> Result<String, NotifyError> {
        match to {
            Recipient::Actor(actor) => Ok(actor.userid.to_string()),
            other => Err(NotifyError::Validation(format!(
                "onesignal provider cannot address {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl Provider for OneSignalProvider {
    fn name(&self) -> &'static str {
        "onesignal"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Push
    }

    async fn connect(&mut self) -> Result<(), NotifyError> {
        if self.app_id.is_none() || self.api_key.is_none() {
            return Err(NotifyError::Auth("onesignal app id/api key not configured".into()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }

    fn sent_callback(&self) -> Option<&SentCallback> {
        self.sent_callback.as_ref()
    }

    async fn send_one(
        &self,
        to: &Recipient,
        _message: &Message,
        subject: Option<&str>,
        rendered: &str,
    ) -> SendResult {
        let app_id = self
            .app_id
            .as_ref()
            .ok_or_else(|| NotifyError::Auth("onesignal app id not configured".into()))?;
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| NotifyError::Auth("onesignal api key not configured".into()))?;
        let player_id = Self::player_id(to)?;

        let payload = serde_json::json!({
            "app_id": app_id,
            "include_player_ids": [player_id],
            "headings": {"en": subject.unwrap_or_default()},
            "contents": {"en": rendered},
        });

        let response = self
            .client
            .post(ONESIGNAL_API)
            .header("Authorization", format!("Basic {api_key}"))
            .json(&payload)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NotifyError::Auth("onesignal rejected the api key".into()));
        }
        let response = response.error_for_status()?;
        let body = response.text().await.unwrap_or_default();
        Ok(SentReceipt::new(player_id, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_actors_are_addressable() {
        let channel = Recipient::Channel(crate::model::Channel {
            channel_name: None,
            channel_id: "C1".into(),
        });
        assert!(OneSignalProvider::player_id(&channel).is_err());
    }

    #[tokio::test]
    async fn connect_without_credentials_fails_auth() {
        let ctx = ProviderContext {
            kwargs: serde_json::json!({}),
            template_engine: crate::template::TemplateEngine::empty(),
            settings: std::sync::Arc::new(crate::settings::Settings::default()),
            sent_callback: None,
        };
        let mut provider = OneSignalProvider::new(&ctx).unwrap();
        assert!(matches!(provider.connect().await, Err(NotifyError::Auth(_))));
    }
}
