// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Fire-and-forget pub/sub ingress (§4.9): executed inline, bypassing the
//! bounded queue entirely — the intentional low-throughput path.

use crate::broker::Broker;
use crate::error::NotifyError;
use crate::provider::registry::ProviderRegistry;
use crate::settings::Settings;
use crate::template::TemplateEngine;
use crate::wrapper::Wrapper;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Reconnects with a short backoff on connection loss; returns only once
/// `cancellation` fires.
pub async fn subscribe(
    broker: Broker,
    channel: String,
    registry: Arc<ProviderRegistry>,
    template_engine: TemplateEngine,
    settings: Arc<Settings>,
    cancellation: CancellationToken,
) {
    loop {
        if cancellation.is_cancelled() {
            return;
        }

        match run_once(&broker, &channel, &registry, &template_engine, &settings, &cancellation).await {
            Ok(()) => return,
            Err(err) => {
                log::warn!("pub/sub subscriber error on channel {channel}: {err}; retrying in 1s");
                tokio::select! {
                    _ = cancellation.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }
    }
}

async fn run_once(
    broker: &Broker,
    channel: &str,
    registry: &Arc<ProviderRegistry>,
    template_engine: &TemplateEngine,
    settings: &Arc<Settings>,
    cancellation: &CancellationToken,
) -> Result<(), NotifyError> {
    let mut pubsub = broker.pubsub().await?;
    pubsub.subscribe(channel).await?;

    let cancelled = {
        let mut messages = pubsub.on_message();
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break true,
                message = messages.next() => {
                    match message {
                        Some(message) => {
                            let payload: String = message.get_payload().unwrap_or_default();
                            handle_payload(&payload, registry, template_engine, settings).await;
                        }
                        None => break false,
                    }
                }
            }
        }
    };

    pubsub.unsubscribe(channel).await?;

    if cancelled {
        Ok(())
    } else {
        Err(NotifyError::Transport("pub/sub connection closed by broker".into()))
    }
}

async fn handle_payload(
    payload: &str,
    registry: &ProviderRegistry,
    template_engine: &TemplateEngine,
    settings: &Arc<Settings>,
) {
    let result = async {
        let de = &mut serde_json::Deserializer::from_str(payload);
        let value: serde_json::Value = serde_path_to_error::deserialize(de)?;
        let wrapper = Wrapper::from_value(value)?;
        wrapper.invoke(registry, template_engine, settings.clone()).await
    }
    .await;

    match result {
        Ok(results) => {
            let failures = results.iter().filter(|r| r.is_err()).count();
            if failures > 0 {
                log::warn!("pub/sub job delivered with {failures} recipient failures");
            }
        }
        Err(err) => log::error!("pub/sub job failed: {err}"),
    }
}
