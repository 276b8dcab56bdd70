// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Typed recipient and message model (§3 of the design).

pub mod account;
pub mod actor;
pub mod message;
pub mod recipient;

pub use account::Account;
pub use actor::Actor;
pub use message::{
    Attachment, BlockMessage, CardAction, MailAttachment, MailMessage, Message, TeamsCard,
    TeamsSection, CONTENT_TYPES,
};
pub use recipient::{Chat, Channel, Recipient, TeamsChannel, TeamsChat, TeamsWebhook, WireRecipient};
