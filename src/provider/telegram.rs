// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Telegram bot API delivery (`sendMessage`), addressed by `chat_id`.

use super::{Provider, ProviderContext, ProviderType, SendResult, SentCallback, SentReceipt};
use crate::error::NotifyError;
use crate::model::{Message, Recipient};
use async_trait::async_trait;
use reqwest::Client;

pub struct TelegramProvider {
    client: Client,
    token: Option<String>,
    sent_callback: Option<SentCallback>,
}

impl TelegramProvider {
    pub fn new(ctx: &ProviderContext) -> Result<Self, NotifyError> {
        let token = ctx
            .kwargs
            .get("token")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| ctx.settings.telegram.token.clone());

        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| NotifyError::Provider(e.to_string()))?,
            token,
            sent_callback: ctx.sent_callback.clone(),
        })
    }

    fn chat_id(to: &Recipient) -> Result<String, NotifyError> {
        match to {
            Recipient::Chat(chat) => Ok(chat.chat_id.clone()),
            other => Err(NotifyError::Validation(format!(
                "telegram provider cannot address {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl Provider for TelegramProvider {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Im
    }

    async fn connect(&mut self) -> Result<(), NotifyError> {
        if self.token.is_none() {
            return Err(NotifyError::Auth("no telegram bot token configured".into()));
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
        _subject: Option<&str>,
        rendered: &str,
    ) -> SendResult {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| NotifyError::Auth("no telegram bot token configured".into()))?;
        let chat_id = Self::chat_id(to)?;

        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": rendered,
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NotifyError::Auth("telegram rejected the bot token".into()));
        }
        let response = response.error_for_status()?;
        let body = response.text().await.unwrap_or_default();
        Ok(SentReceipt::new(chat_id, body))
    }
}
