// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Notification dispatch worker: queues, renders and fans out notifications
//! to pluggable providers across three ingress paths (TCP, pub/sub, stream).

pub mod broker;
pub mod client;
pub mod error;
pub mod ingress;
pub mod model;
pub mod provider;
pub mod queue;
pub mod settings;
pub mod template;
pub mod worker;
pub mod wrapper;

pub use client::Client;
pub use error::{NotifyError, Result};
pub use worker::Worker;

/// Entry point of the library part of notify-worker.
pub async fn run(settings: settings::Settings) -> anyhow::Result<()> {
    Worker::new(settings)?.run().await
}
