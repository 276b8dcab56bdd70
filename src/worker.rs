// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Orchestrates ingress, the queue, and graceful shutdown (§4.11).

use crate::broker::Broker;
use crate::ingress::{pubsub, stream, tcp};
use crate::provider::registry::ProviderRegistry;
use crate::queue::{LoggingDoneCallback, QueueManager};
use crate::settings::Settings;
use crate::template::TemplateEngine;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Worker {
    settings: Arc<Settings>,
    registry: Arc<ProviderRegistry>,
    template_engine: TemplateEngine,
}

impl Worker {
    pub fn new(settings: Settings) -> Result<Self> {
        let template_engine =
            TemplateEngine::load(&settings.template_dir).context("loading notification templates")?;

        Ok(Self {
            settings: Arc::new(settings),
            registry: Arc::new(ProviderRegistry::with_builtin_providers()),
            template_engine,
        })
    }

    /// Starts every ingress path and the queue, then blocks until a
    /// shutdown signal arrives and drains everything before returning.
    pub async fn run(self) -> Result<()> {
        let broker = Broker::connect(&self.settings.redis.url).context("connecting to redis broker")?;
        let cancellation = CancellationToken::new();

        let queue = QueueManager::start(
            self.settings.queue.size,
            self.registry.clone(),
            self.template_engine.clone(),
            self.settings.clone(),
            Arc::new(LoggingDoneCallback),
        );

        let pubsub_handle = tokio::spawn(pubsub::subscribe(
            broker.clone(),
            self.settings.redis.channel.clone(),
            self.registry.clone(),
            self.template_engine.clone(),
            self.settings.clone(),
            cancellation.clone(),
        ));

        let consumer_name = self
            .settings
            .stream
            .consumer_name
            .clone()
            .unwrap_or_else(default_consumer_name);

        let stream_handle = {
            let broker = broker.clone();
            let config = self.settings.stream.clone();
            let registry = self.registry.clone();
            let template_engine = self.template_engine.clone();
            let settings = self.settings.clone();
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                if let Err(err) = stream::run(
                    broker,
                    config,
                    consumer_name,
                    registry,
                    template_engine,
                    settings,
                    cancellation,
                )
                .await
                {
                    log::error!("stream ingress terminated: {err}");
                }
            })
        };

        let monitor_handle = if self.settings.stream.notify_empty_stream {
            let broker = broker.clone();
            let stream_name = self.settings.stream.name.clone();
            let threshold = self.settings.stream.empty_stream_minutes;
            let cancellation = cancellation.clone();
            Some(tokio::spawn(stream::monitor_empty_stream(
                broker,
                stream_name,
                threshold,
                None,
                cancellation,
            )))
        } else {
            None
        };

        let tcp_handle = {
            let host = self.settings.tcp.host.clone();
            let port = self.settings.tcp.port;
            let sender = queue.sender_handle();
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                if let Err(err) = tcp::serve(&host, port, sender, cancellation).await {
                    log::error!("tcp ingress terminated: {err}");
                }
            })
        };

        wait_for_shutdown_signal().await;
        log::info!("shutdown signal received, draining");

        cancellation.cancel();
        queue.drain().await;

        // In-flight TCP connections get a grace period before we stop
        // waiting on the listener task (§4.11).
        let _ = tokio::time::timeout(Duration::from_secs(5), tcp_handle).await;
        let _ = tokio::time::timeout(Duration::from_secs(5), pubsub_handle).await;
        let _ = tokio::time::timeout(Duration::from_secs(5), stream_handle).await;
        if let Some(handle) = monitor_handle {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }

        log::info!("worker shut down cleanly");
        Ok(())
    }
}

fn default_consumer_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "notify-worker".to_string())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sighup.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
