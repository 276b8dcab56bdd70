// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Microsoft Teams delivery via incoming webhook, rendering either the
//! legacy `MessageCard` or the Adaptive Card schema depending on the
//! webhook's target connector (§3 `TeamsCard`).

use super::{Provider, ProviderContext, ProviderType, SendResult, SentCallback, SentReceipt};
use crate::error::NotifyError;
use crate::model::{Message, Recipient, TeamsCard};
use async_trait::async_trait;
use reqwest::Client;

pub struct TeamsProvider {
    client: Client,
    webhook_url: Option<String>,
    use_adaptive_card: bool,
    sent_callback: Option<SentCallback>,
}

impl TeamsProvider {
    pub fn new(ctx: &ProviderContext) -> Result<Self, NotifyError> {
        let webhook_url = ctx
            .kwargs
            .get("webhook_url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| ctx.settings.teams.webhook_url.clone());
        let use_adaptive_card = ctx
            .kwargs
            .get("adaptive_card")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| NotifyError::Provider(e.to_string()))?,
            webhook_url,
            use_adaptive_card,
            sent_callback: ctx.sent_callback.clone(),
        })
    }

    fn target_webhook(&self, to: &Recipient) -> Result<String, NotifyError> {
        if let Recipient::TeamsWebhook(hook) = to {
            return Ok(hook.uri.clone());
        }
        self.webhook_url
            .clone()
            .ok_or_else(|| NotifyError::Validation("no teams webhook url configured".into()))
    }

    fn card_for(name: uuid::Uuid, rendered: &str) -> TeamsCard {
        TeamsCard {
            card_id: name,
            summary: rendered.to_string(),
            title: None,
            text: Some(rendered.to_string()),
            sections: Vec::new(),
            actions: Vec::new(),
            body_objects: Vec::new(),
            version: "1.4".to_string(),
        }
    }
}

#[async_trait]
impl Provider for TeamsProvider {
    fn name(&self) -> &'static str {
        "teams"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Im
    }

    async fn connect(&mut self) -> Result<(), NotifyError> {
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
        message: &Message,
        _subject: Option<&str>,
        rendered: &str,
    ) -> SendResult {
        let url = self.target_webhook(to)?;
        let card = Self::card_for(message.name, rendered);
        let payload = if self.use_adaptive_card {
            card.to_adaptive_card()
        } else {
            card.to_message_card()
        };

        self.client
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(SentReceipt::new(to.display_name(), rendered.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_recipient_overrides_configured_default() {
        let ctx = ProviderContext {
            kwargs: serde_json::json!({"webhook_url": "https://default.test"}),
            template_engine: crate::template::TemplateEngine::empty(),
            settings: std::sync::Arc::new(crate::settings::Settings::default()),
            sent_callback: None,
        };
        let provider = TeamsProvider::new(&ctx).unwrap();
        let to = Recipient::TeamsWebhook(crate::model::TeamsWebhook {
            uri: "https://specific.test".into(),
        });
        assert_eq!(provider.target_webhook(&to).unwrap(), "https://specific.test");
    }

    #[test]
    fn card_carries_rendered_text_as_summary() {
        let card = TeamsProvider::card_for(uuid::Uuid::new_v4(), "hello");
        assert_eq!(card.summary, "hello");
    }
}
