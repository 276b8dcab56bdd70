// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Integration tests for the concrete scenarios seeded in the design's
//! testable-properties section: TCP enqueue against the dummy provider,
//! template substitution, queue-full rejection, and fan-out resilience
//! when one recipient out of several fails. All run against in-process
//! fixtures (the dummy provider, a temp-directory template engine) so no
//! live Redis or SMTP server is required.

use async_trait::async_trait;
use notify_worker::error::NotifyError;
use notify_worker::ingress::tcp;
use notify_worker::model::{Account, Actor, Message, Recipient};
use notify_worker::provider::registry::ProviderRegistry;
use notify_worker::provider::{
    Blocking, Provider, ProviderContext, ProviderType, SendResult, SentCallback, SentReceipt,
};
use notify_worker::queue::{LoggingDoneCallback, QueueManager};
use notify_worker::settings::Settings;
use notify_worker::template::TemplateEngine;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

fn actor(name: &str) -> serde_json::Value {
    serde_json::json!({"name": name, "account": {"provider": "dummy", "address": format!("{name}@x.test")}})
}

/// Scenario 1: TCP enqueue, dummy provider, three recipients.
#[tokio::test]
async fn tcp_enqueue_dummy_provider_three_recipients() {
    let registry = Arc::new(ProviderRegistry::with_builtin_providers());
    let queue = QueueManager::start(
        8,
        registry,
        TemplateEngine::empty(),
        Arc::new(Settings::default()),
        Arc::new(LoggingDoneCallback),
    );

    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancellation = CancellationToken::new();
    let sender = queue.sender_handle();
    let server_cancellation = cancellation.clone();
    let server = tokio::spawn(async move {
        let _ = tcp::serve_listener(listener, sender, server_cancellation).await;
    });

    let payload = serde_json::json!({
        "provider": "dummy",
        "recipient": [actor("A"), actor("B"), actor("C")],
        "message": "hi",
    });
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(payload.to_string().as_bytes()).await.unwrap();
    client.shutdown().await.unwrap();

    let mut response = String::new();
    client.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("Message was Queued with id"));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancellation.cancel();
    let _ = server.await;
    queue.drain().await;
}

/// Scenario 2: template substitution renders `{{ recipient.name }}` per
/// recipient, matching the standard rendering context. Goes through the
/// dummy provider's real `send` path rather than calling `engine.render`
/// directly, so it actually exercises `prepare`/`render_one`/`send_one`.
#[tokio::test]
async fn template_substitution_renders_recipient_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("template_hello.txt"), "Hello {{ recipient.name }}!").unwrap();
    let engine = TemplateEngine::load(dir.path()).unwrap();

    let recipients: Vec<Recipient> = ["A", "B", "C"]
        .into_iter()
        .map(|name| {
            Recipient::Actor(Actor::new(
                name,
                Account {
                    provider: "dummy".into(),
                    enabled: true,
                    address: vec![format!("{name}@x.test")],
                    number: vec![],
                    userid: String::new(),
                    attributes: Default::default(),
                },
            ))
        })
        .collect();

    let registry = ProviderRegistry::with_builtin_providers();
    let ctx = ProviderContext {
        kwargs: serde_json::json!({}),
        template_engine: engine.clone(),
        settings: Arc::new(Settings::default()),
        sent_callback: None,
    };
    let mut message = Message::text("hi");
    message.template = Some("template_hello.txt".into());
    let provider = registry.build("dummy", &ctx).unwrap();

    let results = provider.send(&recipients, &message, None, &engine).await;
    assert_eq!(results.len(), 3);
    for (result, name) in results.iter().zip(["A", "B", "C"]) {
        let receipt = result.as_ref().unwrap();
        assert_eq!(receipt.detail, format!("Hello {name}!"));
    }
}

/// Scenario 3: with capacity 2, a third `try_put` before any worker has
/// drained the channel reports `QueueFull`.
#[tokio::test]
async fn queue_full_rejection_at_capacity() {
    let registry = Arc::new(ProviderRegistry::with_builtin_providers());
    let queue = QueueManager::start(
        2,
        registry,
        TemplateEngine::empty(),
        Arc::new(Settings::default()),
        Arc::new(LoggingDoneCallback),
    );

    let make = || notify_worker::wrapper::Wrapper::from_value(serde_json::json!({
        "provider": "dummy",
        "recipient": [actor("A")],
        "message": "hi",
    }))
    .unwrap();

    assert!(queue.try_put(make()).is_ok());
    assert!(queue.try_put(make()).is_ok());
    assert!(matches!(queue.try_put(make()), Err(NotifyError::QueueFull)));
    queue.drain().await;
}

/// A provider whose `send_one` fails for exactly one recipient, used to
/// exercise scenario 5 (fan-out resilience).
struct FlakyProvider {
    sent_callback: Option<SentCallback>,
}

#[async_trait]
impl Provider for FlakyProvider {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Notify
    }

    fn blocking(&self) -> Blocking {
        Blocking::Asyncio
    }

    fn sent_callback(&self) -> Option<&SentCallback> {
        self.sent_callback.as_ref()
    }

    async fn connect(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send_one(
        &self,
        to: &Recipient,
        _message: &Message,
        _subject: Option<&str>,
        rendered: &str,
    ) -> SendResult {
        if to.display_name() == "B" {
            return Err(NotifyError::Provider("B always fails".into()));
        }
        Ok(SentReceipt::new(to.display_name(), rendered.to_string()))
    }
}

fn recipient(name: &str) -> Recipient {
    Recipient::Actor(Actor::new(
        name,
        Account {
            provider: "flaky".into(),
            enabled: true,
            address: vec![format!("{name}@x.test")],
            number: vec![],
            userid: String::new(),
            attributes: Default::default(),
        },
    ))
}

/// Scenario 5: three recipients, the middle one fails; result list stays
/// length 3, ordered, the other two still succeed, and the sent callback
/// fires exactly once per recipient regardless of outcome.
#[tokio::test]
async fn fan_out_resilience_one_recipient_fails() {
    let callback_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = callback_count.clone();
    let provider = FlakyProvider {
        sent_callback: Some(SentCallback::Sync(Arc::new(move |_to, _message, _result| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }))),
    };
    let recipients = vec![recipient("A"), recipient("B"), recipient("C")];
    let message = Message::text("hi");
    let engine = TemplateEngine::empty();

    let results = provider.send(&recipients, &message, None, &engine).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
    assert_eq!(callback_count.load(std::sync::atomic::Ordering::SeqCst), 3);
}

/// Scenario 6 (partial): cancelling the shared token stops the TCP
/// listener from accepting further connections.
#[tokio::test]
async fn cancellation_stops_tcp_listener_from_accepting() {
    let registry = Arc::new(ProviderRegistry::with_builtin_providers());
    let queue = QueueManager::start(
        4,
        registry,
        TemplateEngine::empty(),
        Arc::new(Settings::default()),
        Arc::new(LoggingDoneCallback),
    );

    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancellation = CancellationToken::new();
    let sender = queue.sender_handle();
    let server_cancellation = cancellation.clone();
    let server = tokio::spawn(async move {
        let _ = tcp::serve_listener(listener, sender, server_cancellation).await;
    });

    cancellation.cancel();
    let joined = tokio::time::timeout(std::time::Duration::from_secs(1), server).await;
    assert!(joined.is_ok(), "tcp listener should stop promptly after cancellation");

    assert!(TcpStream::connect(addr).await.is_err());
    queue.drain().await;
}
