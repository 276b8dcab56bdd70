// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! The unit of work every ingress path builds and every queue worker
//! consumes (§3 "Wrapper", §4.6). Recipient entries are coerced from raw
//! JSON by structural sniffing rather than an explicit discriminant tag,
//! mirroring the source's duck-typed recipient handling.

use crate::error::NotifyError;
use crate::model::{Actor, Chat, Channel, Message, Recipient, TeamsChannel, TeamsChat, TeamsWebhook, WireRecipient};
use crate::provider::registry::ProviderRegistry;
use crate::provider::{Provider, ProviderContext, SendResult};
use crate::settings::Settings;
use crate::template::TemplateEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Wrapper {
    pub id: Uuid,
    pub provider: String,
    pub recipients: Vec<Recipient>,
    pub message: Message,
    pub subject: Option<String>,
    pub kwargs: Value,
}

/// Bincode-friendly mirror of [`Wrapper`], used only for the stream's
/// opaque `task` field (§4.10); see [`crate::model::WireRecipient`] for why
/// `Recipient` itself can't round-trip through bincode.
#[derive(Debug, Serialize, Deserialize)]
struct OpaqueWrapper {
    id: Uuid,
    provider: String,
    recipients: Vec<WireRecipient>,
    message: Message,
    subject: Option<String>,
    kwargs: Value,
}

impl Wrapper {
    /// Parses a wrapper from a raw ingress payload (the JSON object
    /// described in §6). Unknown keys become `kwargs`, available to
    /// providers and template rendering as `extra` context.
    pub fn from_value(value: Value) -> Result<Self, NotifyError> {
        let mut object = value
            .as_object()
            .cloned()
            .ok_or_else(|| NotifyError::Validation("wrapper payload must be a JSON object".into()))?;

        let provider = object
            .remove("provider")
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| NotifyError::Validation("missing \"provider\" key".into()))?;

        let recipients = object
            .remove("recipient")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(coerce_recipient)
            .collect();

        let mut message = match object.remove("message") {
            Some(Value::String(body)) => Message::text(body),
            Some(other @ Value::Object(_)) => {
                serde_json::from_value(other).unwrap_or_else(|_| Message::text(String::new()))
            }
            _ => Message::text(String::new()),
        };

        let subject = object
            .remove("subject")
            .and_then(|v| v.as_str().map(str::to_string));

        if let Some(template) = object.remove("template").and_then(|v| v.as_str().map(str::to_string)) {
            message.template = Some(template);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            provider,
            recipients,
            message,
            subject,
            kwargs: Value::Object(object),
        })
    }

    /// Opaque base64-of-bincode form for the stream's pre-built task path
    /// (§3, §4.10) — the systems-language analogue of shipping a
    /// pre-serialized coroutine across the process boundary.
    pub fn to_opaque(&self) -> Result<String, NotifyError> {
        let wire = OpaqueWrapper {
            id: self.id,
            provider: self.provider.clone(),
            recipients: self.recipients.iter().map(WireRecipient::from).collect(),
            message: self.message.clone(),
            subject: self.subject.clone(),
            kwargs: self.kwargs.clone(),
        };
        let bytes = bincode::serialize(&wire).map_err(|e| NotifyError::Provider(e.to_string()))?;
        Ok(base64::encode(bytes))
    }

    pub fn from_opaque(encoded: &str) -> Result<Self, NotifyError> {
        let bytes = base64::decode(encoded).map_err(|e| NotifyError::Provider(e.to_string()))?;
        let wire: OpaqueWrapper =
            bincode::deserialize(&bytes).map_err(|e| NotifyError::Provider(e.to_string()))?;
        Ok(Self {
            id: wire.id,
            provider: wire.provider,
            recipients: wire.recipients.into_iter().map(Recipient::from).collect(),
            message: wire.message,
            subject: wire.subject,
            kwargs: wire.kwargs,
        })
    }

    /// Reconstructs the wire JSON a client would have sent, for the
    /// client SDK's publish/xadd/send_tcp paths (§4.12).
    pub fn to_value(&self) -> Value {
        let mut object = match self.kwargs.clone() {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        object.insert("provider".to_string(), Value::String(self.provider.clone()));
        object.insert(
            "recipient".to_string(),
            serde_json::to_value(&self.recipients).unwrap_or(Value::Array(Vec::new())),
        );
        object.insert(
            "message".to_string(),
            serde_json::to_value(&self.message).unwrap_or(Value::Null),
        );
        if let Some(subject) = &self.subject {
            object.insert("subject".to_string(), Value::String(subject.clone()));
        }
        if let Some(template) = &self.message.template {
            object.insert("template".to_string(), Value::String(template.clone()));
        }
        Value::Object(object)
    }

    /// Resolves the named provider, connects, fans out, and closes
    /// best-effort. A fresh provider instance is constructed per
    /// invocation (§5 shared-resource policy).
    pub async fn invoke(
        &self,
        registry: &ProviderRegistry,
        template_engine: &TemplateEngine,
        settings: Arc<Settings>,
    ) -> Result<Vec<SendResult>, NotifyError> {
        let ctx = ProviderContext {
            kwargs: self.kwargs.clone(),
            template_engine: template_engine.clone(),
            settings,
            sent_callback: None,
        };
        let mut provider = registry.build(&self.provider, &ctx)?;
        provider.connect().await?;

        let results = provider
            .send(&self.recipients, &self.message, self.subject.as_deref(), template_engine)
            .await;

        if let Err(err) = provider.close().await {
            log::warn!("error closing provider {:?}: {err}", self.provider);
        }

        Ok(results)
    }
}

/// Structural sniffing of one `recipient` array entry, in the priority
/// order fixed by §4.6. Invalid entries are discarded rather than
/// rejecting the whole wrapper (ingress-lenient).
fn coerce_recipient(value: &Value) -> Option<Recipient> {
    let object = value.as_object()?;

    if let (Some(team_id), Some(channel_id)) = (
        object.get("team_id").and_then(Value::as_str),
        object.get("channel_id").and_then(Value::as_str),
    ) {
        return Some(Recipient::TeamsChannel(TeamsChannel {
            team_id: team_id.to_string(),
            channel_id: channel_id.to_string(),
        }));
    }

    if let Some(teams) = object.get("teams").and_then(Value::as_object) {
        if let Some(chat_id) = teams.get("chat_id").and_then(Value::as_str) {
            return Some(Recipient::TeamsChat(TeamsChat {
                chat_id: chat_id.to_string(),
            }));
        }
    }

    if let Some(uri) = object.get("uri").and_then(Value::as_str) {
        return Some(Recipient::TeamsWebhook(TeamsWebhook { uri: uri.to_string() }));
    }

    if let Some(chat_id) = object.get("chat_id").and_then(Value::as_str) {
        return Some(Recipient::Chat(Chat {
            chat_name: object.get("chat_name").and_then(Value::as_str).map(str::to_string),
            chat_id: chat_id.to_string(),
        }));
    }

    if let Some(channel_id) = object.get("channel_id").and_then(Value::as_str) {
        return Some(Recipient::Channel(Channel {
            channel_name: object
                .get("channel_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            channel_id: channel_id.to_string(),
        }));
    }

    serde_json::from_value::<Actor>(value.clone())
        .ok()
        .filter(Actor::is_valid)
        .map(Recipient::Actor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_chat_channel_and_actor_shapes() {
        let value = serde_json::json!({
            "provider": "dummy",
            "recipient": [
                {"chat_id": "c1"},
                {"channel_id": "ch1", "channel_name": "general"},
                {"team_id": "t1", "channel_id": "ch2"},
                {"uri": "https://hook.test"},
                {"name": "A", "account": {"provider": "dummy", "address": "a@x.test"}},
                {"garbage": true},
            ],
            "message": "hi",
            "subject": "Subj",
        });

        let wrapper = Wrapper::from_value(value).unwrap();
        assert_eq!(wrapper.provider, "dummy");
        assert_eq!(wrapper.recipients.len(), 5);
        assert!(matches!(wrapper.recipients[0], Recipient::Chat(_)));
        assert!(matches!(wrapper.recipients[1], Recipient::Channel(_)));
        assert!(matches!(wrapper.recipients[2], Recipient::TeamsChannel(_)));
        assert!(matches!(wrapper.recipients[3], Recipient::TeamsWebhook(_)));
        assert!(matches!(wrapper.recipients[4], Recipient::Actor(_)));
        assert_eq!(wrapper.subject.as_deref(), Some("Subj"));
    }

    #[test]
    fn zero_valid_recipients_still_builds_a_wrapper() {
        let value = serde_json::json!({"provider": "dummy", "recipient": [{"garbage": 1}], "message": "hi"});
        let wrapper = Wrapper::from_value(value).unwrap();
        assert!(wrapper.recipients.is_empty());
    }

    #[test]
    fn missing_provider_is_a_validation_error() {
        let value = serde_json::json!({"recipient": [], "message": "hi"});
        assert!(matches!(Wrapper::from_value(value), Err(NotifyError::Validation(_))));
    }

    #[test]
    fn opaque_round_trip_preserves_fields() {
        let value = serde_json::json!({
            "provider": "dummy",
            "recipient": [{"chat_id": "c1"}],
            "message": "hi",
        });
        let wrapper = Wrapper::from_value(value).unwrap();
        let encoded = wrapper.to_opaque().unwrap();
        let decoded = Wrapper::from_opaque(&encoded).unwrap();
        assert_eq!(decoded.id, wrapper.id);
        assert_eq!(decoded.provider, wrapper.provider);
        assert_eq!(decoded.recipients.len(), 1);
        assert_eq!(decoded.message.as_text(), "hi");
    }
}
