// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! SMTP/STARTTLS delivery, grounded directly on the teacher's
//! `AsyncSmtpTransport<Tokio1Executor>` construction (§4.5).

use super::{Blocking, Provider, ProviderContext, ProviderType, SendResult, SentCallback, SentReceipt};
use crate::error::NotifyError;
use crate::model::{Attachment, Message, Recipient};
use crate::settings::SmtpConfig;
use crate::template::TemplateEngine;
use async_trait::async_trait;
use lettre::message::header::{ContentDisposition, ContentTransferEncoding, ContentType};
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor};
use std::time::Duration;

pub struct EmailProvider {
    config: SmtpConfig,
    attachments: Vec<Attachment>,
    sent_callback: Option<SentCallback>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailProvider {
    pub fn new(ctx: &ProviderContext) -> Result<Self, NotifyError> {
        let attachments = ctx
            .kwargs
            .get("attachments")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| NotifyError::Validation(format!("invalid attachments: {e}")))?
            .unwrap_or_default();

        Ok(Self {
            config: ctx.settings.smtp.clone(),
            attachments,
            sent_callback: ctx.sent_callback.clone(),
            transport: None,
        })
    }

    fn recipient_address(to: &Recipient) -> Result<String, NotifyError> {
        match to {
            Recipient::Actor(actor) => actor
                .primary_account()
                .and_then(|a| a.primary_address())
                .map(str::to_string)
                .ok_or_else(|| NotifyError::Validation(format!("actor {} has no address", actor.name))),
            other => Err(NotifyError::Validation(format!(
                "email provider cannot address {:?}",
                other
            ))),
        }
    }

    /// §4.5: every attachment is shipped base-64 encoded under
    /// `Content-Disposition: attachment`, mirroring the teacher's ics
    /// attachment construction.
    fn attachment_part(attachment: &Attachment) -> Result<SinglePart, NotifyError> {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|e| NotifyError::Message(format!("invalid attachment content type: {e}")))?;
        let bytes = match &attachment.content {
            serde_json::Value::String(s) => s.clone().into_bytes(),
            other => other.to_string().into_bytes(),
        };
        Ok(SinglePart::builder()
            .content_type(content_type)
            .header(ContentDisposition::attachment(&attachment.name))
            .header(ContentTransferEncoding::Base64)
            .body(bytes))
    }
}

#[async_trait]
impl Provider for EmailProvider {
    fn name(&self) -> &'static str {
        "email"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Email
    }

    fn blocking(&self) -> Blocking {
        Blocking::Asyncio
    }

    fn sent_callback(&self) -> Option<&SentCallback> {
        self.sent_callback.as_ref()
    }

    async fn connect(&mut self) -> Result<(), NotifyError> {
        if self.transport.is_some() {
            return Ok(());
        }

        let mut builder = if self.config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };
        builder = builder.port(self.config.port);

        if let Some(username) = &self.config.username {
            let password = self.config.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        self.transport = Some(builder.build());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), NotifyError> {
        self.transport = None;
        Ok(())
    }

    async fn send_one(
        &self,
        to: &Recipient,
        _message: &Message,
        subject: Option<&str>,
        rendered: &str,
    ) -> SendResult {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| NotifyError::Provider("email provider not connected".into()))?;
        let address = Self::recipient_address(to)?;

        let html = format!("<p>{}</p>", rendered);
        let mut parts = MultiPart::mixed().multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::builder().content_type(ContentType::TEXT_PLAIN).body(rendered.to_string()))
                .singlepart(SinglePart::builder().content_type(ContentType::TEXT_HTML).body(html)),
        );
        for attachment in &self.attachments {
            parts = parts.singlepart(Self::attachment_part(attachment)?);
        }

        let email = LettreMessage::builder()
            .from(
                format!("{} <{}>", self.config.from_name, self.config.from_email)
                    .parse()
                    .map_err(|e| NotifyError::Message(format!("invalid from address: {e}")))?,
            )
            .to(address
                .parse()
                .map_err(|e| NotifyError::Message(format!("invalid to address: {e}")))?)
            .subject(subject.unwrap_or_default())
            .multipart(parts)
            .map_err(|e| NotifyError::Message(format!("could not build message: {e}")))?;

        transport.send(email).await?;
        Ok(SentReceipt::new(address, rendered.to_string()))
    }

    async fn send_asyncio(
        &self,
        recipients: &[Recipient],
        message: &Message,
        subject: Option<&str>,
        template_engine: &TemplateEngine,
    ) -> Vec<SendResult> {
        let batch = async {
            let mut futures = futures::stream::FuturesOrdered::new();
            for to in recipients {
                futures.push_back(async move {
                    let result = match self.render_one(to, message, subject, template_engine) {
                        Ok(rendered) => self.send_one(to, message, subject, &rendered).await,
                        Err(err) => Err(err),
                    };
                    if let Some(callback) = self.sent_callback() {
                        callback.invoke(to, message, &result).await;
                    }
                    result
                });
            }
            futures::stream::StreamExt::collect::<Vec<_>>(futures).await
        };

        match tokio::time::timeout(Duration::from_secs(self.config.batch_timeout_secs), batch).await {
            Ok(results) => results,
            Err(_) => {
                log::warn!("email fan-out batch timed out after {}s", self.config.batch_timeout_secs);
                recipients.iter().map(|_| Err(NotifyError::Timeout)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Account;

    fn ctx() -> ProviderContext {
        ProviderContext {
            kwargs: serde_json::json!({}),
            template_engine: crate::template::TemplateEngine::empty(),
            settings: std::sync::Arc::new(crate::settings::Settings::default()),
            sent_callback: None,
        }
    }

    #[test]
    fn rejects_non_actor_recipients() {
        let recipient = Recipient::Channel(crate::model::Channel {
            channel_name: None,
            channel_id: "c1".into(),
        });
        assert!(EmailProvider::recipient_address(&recipient).is_err());
    }

    #[test]
    fn reads_primary_address_from_actor() {
        let actor = Recipient::Actor(crate::model::Actor::new(
            "A",
            Account {
                provider: "email".into(),
                enabled: true,
                address: vec!["a@x.test".into()],
                number: vec![],
                userid: String::new(),
                attributes: Default::default(),
            },
        ));
        assert_eq!(EmailProvider::recipient_address(&actor).unwrap(), "a@x.test");
    }

    #[test]
    fn attachments_are_parsed_from_kwargs() {
        let ctx = ProviderContext {
            kwargs: serde_json::json!({
                "attachments": [
                    {"name": "note.txt", "content": "hi", "content_type": "text/plain", "type": "file"},
                ],
            }),
            ..ctx()
        };
        let provider = EmailProvider::new(&ctx).unwrap();
        assert_eq!(provider.attachments.len(), 1);
        assert_eq!(provider.attachments[0].name, "note.txt");
    }

    #[tokio::test]
    async fn not_connected_send_one_fails_with_provider_error() {
        let provider = EmailProvider::new(&ctx()).unwrap();
        let actor = Recipient::Actor(crate::model::Actor::new(
            "A",
            Account {
                provider: "email".into(),
                enabled: true,
                address: vec!["a@x.test".into()],
                number: vec![],
                userid: String::new(),
                attributes: Default::default(),
            },
        ));
        let result = provider
            .send_one(&actor, &Message::text("hi"), None, "hi")
            .await;
        assert!(matches!(result, Err(NotifyError::Provider(_))));
    }
}
