// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Slack incoming-webhook delivery (§2: "Slack (webhook)").

use super::{Provider, ProviderContext, ProviderType, SendResult, SentCallback, SentReceipt};
use crate::error::NotifyError;
use crate::model::{Message, Recipient};
use async_trait::async_trait;
use reqwest::Client;

pub struct SlackProvider {
    client: Client,
    webhook_url: Option<String>,
    sent_callback: Option<SentCallback>,
}

impl SlackProvider {
    pub fn new(ctx: &ProviderContext) -> Result<Self, NotifyError> {
        let webhook_url = ctx
            .kwargs
            .get("webhook_url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| ctx.settings.slack.webhook_url.clone());

        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| NotifyError::Provider(e.to_string()))?,
            webhook_url,
            sent_callback: ctx.sent_callback.clone(),
        })
    }

    fn target_webhook(&self, to: &Recipient) -> Result<String, NotifyError> {
        if let Recipient::TeamsWebhook(hook) = to {
            return Ok(hook.uri.clone());
        }
        self.webhook_url
            .clone()
            .ok_or_else(|| NotifyError::Validation("no slack webhook url configured".into()))
    }
}

#[async_trait]
impl Provider for SlackProvider {
    fn name(&self) -> &'static str {
        "slack"
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
        _message: &Message,
        _subject: Option<&str>,
        rendered: &str,
    ) -> SendResult {
        let url = self.target_webhook(to)?;
        let payload = serde_json::json!({ "text": rendered });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await.unwrap_or_default();
        Ok(SentReceipt::new(to.display_name(), body))
    }
}
