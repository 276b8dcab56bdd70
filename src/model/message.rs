// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const CONTENT_TYPES: &[&str] = &[
    "text/plain",
    "text/html",
    "multipart/alternative",
    "application/json",
];

/// Base message block shared by every provider family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "Uuid::new_v4")]
    pub name: Uuid,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub content: String,
    #[serde(default = "Utc::now")]
    pub sent: DateTime<Utc>,
    #[serde(default)]
    pub template: Option<String>,
}

impl Message {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            name: Uuid::new_v4(),
            body: Value::String(body.into()),
            content: String::new(),
            sent: Utc::now(),
            template: None,
        }
    }

    /// The plain-text form of the body, regardless of whether it arrived
    /// as a bare string or a structured object.
    pub fn as_text(&self) -> String {
        match &self.body {
            Value::String(s) => s.clone(),
            Value::Null => self.content.clone(),
            other => other.to_string(),
        }
    }
}

/// Any document attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(default)]
    pub content: Value,
    pub content_type: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// An [`Attachment`] bound to an email, adding MIME-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailAttachment {
    #[serde(flatten)]
    pub attachment: Attachment,
    pub filename: String,
    pub content_disposition: String,
    pub size: usize,
    #[serde(default)]
    pub subject: Option<String>,
}

/// A message addressed to one or more recipients, carrying attachments
/// and content-type/flag metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMessage {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub flags: Vec<String>,
}

fn default_content_type() -> String {
    CONTENT_TYPES[0].to_string()
}

/// An email, adding MIME attachments on top of [`BlockMessage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMessage {
    #[serde(flatten)]
    pub block: BlockMessage,
    #[serde(default)]
    pub mail_attachments: Vec<MailAttachment>,
}

/// A card action button, as rendered in both Adaptive Cards and legacy
/// MessageCards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardAction {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsSection {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub facts: Vec<(String, String)>,
}

/// A Microsoft Teams message card, convertible to either of the two
/// on-wire forms Teams accepts: the legacy `MessageCard` and the
/// Adaptive Card schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsCard {
    #[serde(default = "Uuid::new_v4")]
    pub card_id: Uuid,
    pub summary: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub sections: Vec<TeamsSection>,
    #[serde(default)]
    pub actions: Vec<CardAction>,
    #[serde(default)]
    pub body_objects: Vec<Value>,
    #[serde(default = "default_card_version")]
    pub version: String,
}

fn default_card_version() -> String {
    "1.4".to_string()
}

impl TeamsCard {
    /// The legacy `MessageCard` connector payload.
    pub fn to_message_card(&self) -> Value {
        let sections: Vec<Value> = self
            .sections
            .iter()
            .map(|s| {
                serde_json::json!({
                    "activityTitle": s.title,
                    "text": s.text,
                    "facts": s.facts.iter().map(|(k, v)| serde_json::json!({"name": k, "value": v})).collect::<Vec<_>>(),
                })
            })
            .collect();

        let actions: Vec<Value> = self
            .actions
            .iter()
            .map(|a| {
                serde_json::json!({
                    "@type": "OpenUri",
                    "name": a.title,
                    "targets": [{"os": "default", "uri": a.url}],
                })
            })
            .collect();

        serde_json::json!({
            "@type": "MessageCard",
            "@context": "https://schema.org/extensions",
            "summary": self.summary,
            "title": self.title,
            "text": self.text,
            "sections": sections,
            "potentialAction": actions,
        })
    }

    /// The Adaptive Card schema payload, wrapped as a Teams `attachment`.
    pub fn to_adaptive_card(&self) -> Value {
        let mut body: Vec<Value> = Vec::new();
        if let Some(title) = &self.title {
            body.push(serde_json::json!({
                "type": "TextBlock",
                "text": title,
                "weight": "Bolder",
                "size": "Medium",
            }));
        }
        if let Some(text) = &self.text {
            body.push(serde_json::json!({"type": "TextBlock", "text": text, "wrap": true}));
        }
        for section in &self.sections {
            if let Some(title) = &section.title {
                body.push(serde_json::json!({"type": "TextBlock", "text": title, "weight": "Bolder"}));
            }
            if let Some(text) = &section.text {
                body.push(serde_json::json!({"type": "TextBlock", "text": text, "wrap": true}));
            }
        }
        body.extend(self.body_objects.iter().cloned());

        let actions: Vec<Value> = self
            .actions
            .iter()
            .map(|a| {
                serde_json::json!({
                    "type": "Action.OpenUrl",
                    "title": a.title,
                    "url": a.url,
                })
            })
            .collect();

        serde_json::json!({
            "contentType": "application/vnd.microsoft.card.adaptive",
            "content": {
                "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                "type": "AdaptiveCard",
                "version": self.version,
                "body": body,
                "actions": actions,
            }
        })
    }
}
