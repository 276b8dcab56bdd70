// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use super::actor::Actor;
use serde::{Deserialize, Serialize};

/// A 1:1 or group message thread, keyed by `chat_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub chat_name: Option<String>,
    pub chat_id: String,
}

/// A broadcast channel, keyed by `channel_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub channel_name: Option<String>,
    pub channel_id: String,
}

/// A Microsoft Teams channel, addressed by team + channel id pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsChannel {
    pub team_id: String,
    pub channel_id: String,
}

/// A Microsoft Teams 1:1 or group chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsChat {
    pub chat_id: String,
}

/// A Microsoft Teams incoming webhook connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsWebhook {
    pub uri: String,
}

/// The tagged union every provider pattern-matches on. Built by structural
/// sniffing of the wire JSON (see [`crate::wrapper::coerce_recipient`])
/// rather than by an explicit `type` discriminant, mirroring the source's
/// duck-typed recipient handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    TeamsWebhook(TeamsWebhook),
    TeamsChannel(TeamsChannel),
    TeamsChat(TeamsChat),
    Chat(Chat),
    Channel(Channel),
    Actor(Actor),
}

impl Recipient {
    pub fn display_name(&self) -> String {
        match self {
            Recipient::Actor(a) => a.name.clone(),
            Recipient::Chat(c) => c.chat_name.clone().unwrap_or_else(|| c.chat_id.clone()),
            Recipient::Channel(c) => c
                .channel_name
                .clone()
                .unwrap_or_else(|| c.channel_id.clone()),
            Recipient::TeamsChannel(t) => format!("{}/{}", t.team_id, t.channel_id),
            Recipient::TeamsChat(t) => t.chat_id.clone(),
            Recipient::TeamsWebhook(t) => t.uri.clone(),
        }
    }
}

/// Externally-tagged mirror of [`Recipient`] used only for the stream's
/// opaque bincode form (§4.10): `bincode` cannot deserialize an untagged
/// enum (it never calls `deserialize_any`, which untagged variant probing
/// relies on), so the binary wire format carries an explicit tag while the
/// JSON ingress paths keep using structural sniffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireRecipient {
    Actor(Actor),
    Chat(Chat),
    Channel(Channel),
    TeamsChannel(TeamsChannel),
    TeamsChat(TeamsChat),
    TeamsWebhook(TeamsWebhook),
}

impl From<&Recipient> for WireRecipient {
    fn from(r: &Recipient) -> Self {
        match r.clone() {
            Recipient::Actor(a) => WireRecipient::Actor(a),
            Recipient::Chat(c) => WireRecipient::Chat(c),
            Recipient::Channel(c) => WireRecipient::Channel(c),
            Recipient::TeamsChannel(t) => WireRecipient::TeamsChannel(t),
            Recipient::TeamsChat(t) => WireRecipient::TeamsChat(t),
            Recipient::TeamsWebhook(t) => WireRecipient::TeamsWebhook(t),
        }
    }
}

impl From<WireRecipient> for Recipient {
    fn from(r: WireRecipient) -> Self {
        match r {
            WireRecipient::Actor(a) => Recipient::Actor(a),
            WireRecipient::Chat(c) => Recipient::Chat(c),
            WireRecipient::Channel(c) => Recipient::Channel(c),
            WireRecipient::TeamsChannel(t) => Recipient::TeamsChannel(t),
            WireRecipient::TeamsChat(t) => Recipient::TeamsChat(t),
            WireRecipient::TeamsWebhook(t) => Recipient::TeamsWebhook(t),
        }
    }
}
