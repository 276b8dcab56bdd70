// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Twilio SMS delivery via the Messages REST resource, addressed by
//! an Actor's phone number.

use super::{Provider, ProviderContext, ProviderType, SendResult, SentCallback, SentReceipt};
use crate::error::NotifyError;
use crate::model::{Message, Recipient};
use async_trait::async_trait;
use reqwest::Client;

pub struct TwilioProvider {
    client: Client,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    sent_callback: Option<SentCallback>,
}

impl TwilioProvider {
    pub fn new(ctx: &ProviderContext) -> Result<Self, NotifyError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| NotifyError::Provider(e.to_string()))?,
            account_sid: ctx.settings.twilio.account_sid.clone(),
            auth_token: ctx.settings.twilio.auth_token.clone(),
            from_number: ctx.settings.twilio.from_number.clone(),
            sent_callback: ctx.sent_callback.clone(),
        })
    }

    fn number(to: &Recipient) -> Result<String, NotifyError> {
        match to {
            Recipient::Actor(actor) => actor
                .primary_account()
                .and_then(|a| a.primary_number())
                .map(str::to_string)
                .ok_or_else(|| NotifyError::Validation(format!("actor {} has no phone number", actor.name))),
            other => Err(NotifyError::Validation(format!(
                "twilio provider cannot address {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl Provider for TwilioProvider {
    fn name(&self) -> &'static str {
        "twilio"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Sms
    }

    async fn connect(&mut self) -> Result<(), NotifyError> {
        if self.account_sid.is_none() || self.auth_token.is_none() {
            return Err(NotifyError::Auth("twilio credentials not configured".into()));
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
        let sid = self
            .account_sid
            .as_ref()
            .ok_or_else(|| NotifyError::Auth("twilio account sid not configured".into()))?;
        let token = self
            .auth_token
            .as_ref()
            .ok_or_else(|| NotifyError::Auth("twilio auth token not configured".into()))?;
        let from = self
            .from_number
            .as_ref()
            .ok_or_else(|| NotifyError::Validation("twilio from_number not configured".into()))?;
        let to_number = Self::number(to)?;

        let url = format!("https://api.twilio.com/2010-04-01/Accounts/{sid}/Messages.json");
        let params = [
            ("To", to_number.as_str()),
            ("From", from.as_str()),
            ("Body", rendered),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(sid, Some(token))
            .form(&params)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NotifyError::Auth("twilio rejected the account credentials".into()));
        }
        let response = response.error_for_status()?;
        let body = response.text().await.unwrap_or_default();
        Ok(SentReceipt::new(to_number, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Account;

    #[test]
    fn reads_primary_number_from_actor() {
        let actor = Recipient::Actor(crate::model::Actor::new(
            "A",
            Account {
                provider: "twilio".into(),
                enabled: true,
                address: vec![],
                number: vec!["+1555".into()],
                userid: String::new(),
                attributes: Default::default(),
            },
        ));
        assert_eq!(TwilioProvider::number(&actor).unwrap(), "+1555");
    }

    #[tokio::test]
    async fn connect_without_credentials_fails_auth() {
        let ctx = ProviderContext {
            kwargs: serde_json::json!({}),
            template_engine: crate::template::TemplateEngine::empty(),
            settings: std::sync::Arc::new(crate::settings::Settings::default()),
            sent_callback: None,
        };
        let mut provider = TwilioProvider::new(&ctx).unwrap();
        assert!(matches!(provider.connect().await, Err(NotifyError::Auth(_))));
    }
}
