// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Bounded async work queue with a fixed worker pool (§4.7).

use crate::error::NotifyError;
use crate::provider::registry::ProviderRegistry;
use crate::provider::SendResult;
use crate::settings::Settings;
use crate::template::TemplateEngine;
use crate::wrapper::Wrapper;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Invoked once per successfully-dequeued wrapper, with its fan-out
/// results. The default is a no-op logger — the compile-time-registry
/// substitute for a dynamically loaded callback (§4.7, §9).
pub trait DoneCallback: Send + Sync {
    fn on_done(&self, wrapper: &Wrapper, results: &[SendResult]);
}

pub struct LoggingDoneCallback;

impl DoneCallback for LoggingDoneCallback {
    fn on_done(&self, wrapper: &Wrapper, results: &[SendResult]) {
        let failures = results.iter().filter(|r| r.is_err()).count();
        log::info!(
            "wrapper {} ({}) delivered to {} recipients, {} failed",
            wrapper.id,
            wrapper.provider,
            results.len(),
            failures
        );
    }
}

pub struct QueueManager {
    sender: mpsc::Sender<Wrapper>,
    workers: Vec<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl QueueManager {
    /// Spawns `capacity - 1` worker tasks sharing one bounded channel
    /// (capacity itself governs backpressure for `try_put`).
    pub fn start(
        capacity: usize,
        registry: Arc<ProviderRegistry>,
        template_engine: TemplateEngine,
        settings: Arc<Settings>,
        done_callback: Arc<dyn DoneCallback>,
    ) -> Self {
        let capacity = capacity.max(2);
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let cancellation = CancellationToken::new();

        let worker_count = capacity - 1;
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let receiver = receiver.clone();
            let registry = registry.clone();
            let template_engine = template_engine.clone();
            let settings = settings.clone();
            let done_callback = done_callback.clone();
            let cancellation = cancellation.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let wrapper = tokio::select! {
                        _ = cancellation.cancelled() => break,
                        wrapper = async { receiver.lock().await.recv().await } => wrapper,
                    };

                    let Some(wrapper) = wrapper else { break };

                    match wrapper.invoke(&registry, &template_engine, settings.clone()).await {
                        Ok(results) => done_callback.on_done(&wrapper, &results),
                        Err(err) => {
                            log::error!("worker {worker_id} failed to invoke wrapper {}: {err}", wrapper.id);
                        }
                    }
                }
            }));
        }

        Self {
            sender,
            workers,
            cancellation,
        }
    }

    /// Non-blocking enqueue; returns `NotifyError::QueueFull` immediately
    /// rather than waiting for room.
    pub fn try_put(&self, wrapper: Wrapper) -> Result<(), NotifyError> {
        self.sender
            .try_send(wrapper)
            .map_err(|_| NotifyError::QueueFull)
    }

    /// A cloned sender handle for ingress tasks that enqueue directly
    /// without holding the whole manager (and its shutdown/drain logic).
    pub fn sender_handle(&self) -> mpsc::Sender<Wrapper> {
        self.sender.clone()
    }

    /// Closes the sender (no more `try_put`s will succeed), cancels the
    /// workers, and awaits their shutdown. Any wrappers still sitting in
    /// the channel buffer are dropped unprocessed.
    pub async fn drain(self) {
        drop(self.sender);
        self.cancellation.cancel();
        for handle in self.workers {
            if let Err(err) = handle.await {
                log::warn!("queue worker panicked during shutdown: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, Recipient};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCallback(Arc<AtomicUsize>);

    impl DoneCallback for CountingCallback {
        fn on_done(&self, _wrapper: &Wrapper, _results: &[SendResult]) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_wrapper() -> Wrapper {
        Wrapper {
            id: uuid::Uuid::new_v4(),
            provider: "dummy".into(),
            recipients: vec![Recipient::Actor(crate::model::Actor::new(
                "A",
                Account {
                    provider: "dummy".into(),
                    enabled: true,
                    address: vec!["a@x.test".into()],
                    number: vec![],
                    userid: String::new(),
                    attributes: Default::default(),
                },
            ))],
            message: crate::model::Message::text("hi"),
            subject: None,
            kwargs: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn processes_enqueued_wrappers_and_invokes_callback() {
        let processed = Arc::new(AtomicUsize::new(0));
        let queue = QueueManager::start(
            4,
            Arc::new(ProviderRegistry::with_builtin_providers()),
            TemplateEngine::empty(),
            Arc::new(Settings::default()),
            Arc::new(CountingCallback(processed.clone())),
        );

        for _ in 0..3 {
            queue.try_put(test_wrapper()).unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(processed.load(Ordering::SeqCst), 3);
        queue.drain().await;
    }

    #[tokio::test]
    async fn queue_full_is_reported_immediately() {
        let queue = QueueManager::start(
            2,
            Arc::new(ProviderRegistry::with_builtin_providers()),
            TemplateEngine::empty(),
            Arc::new(Settings::default()),
            Arc::new(LoggingDoneCallback),
        );

        // The worker task was spawned but the current task hasn't yielded
        // yet, so nothing has drained the channel: filling its buffer (2)
        // deterministically surfaces QueueFull on the next try_put.
        assert!(queue.try_put(test_wrapper()).is_ok());
        assert!(queue.try_put(test_wrapper()).is_ok());
        assert!(matches!(queue.try_put(test_wrapper()), Err(NotifyError::QueueFull)));
        queue.drain().await;
    }
}
