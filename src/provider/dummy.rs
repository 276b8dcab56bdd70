// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! A provider that never touches the network; used by the test scenarios
//! in §8 and as a template for new providers.

use super::{Provider, ProviderContext, ProviderType, SendResult, SentCallback, SentReceipt};
use crate::error::NotifyError;
use crate::model::{Message, Recipient};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct DummyProvider {
    connected: Arc<AtomicUsize>,
    sent: Arc<AtomicUsize>,
    sent_callback: Option<SentCallback>,
}

impl DummyProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            connected: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(AtomicUsize::new(0)),
            sent_callback: ctx.sent_callback.clone(),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for DummyProvider {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Notify
    }

    async fn connect(&mut self) -> Result<(), NotifyError> {
        self.connected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }

    fn sent_callback(&self) -> Option<&SentCallback> {
        self.sent_callback.as_ref()
    }

    async fn send_one(
        &self,
        to: &Recipient,
        _message: &Message,
        _subject: Option<&str>,
        rendered: &str,
    ) -> SendResult {
        self.sent.fetch_add(1, Ordering::SeqCst);
        log::info!("dummy: sent {:?} to {}", rendered, to.display_name());
        Ok(SentReceipt::new(to.display_name(), rendered.to_string()))
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new(&ProviderContext {
            kwargs: serde_json::json!({}),
            template_engine: crate::template::TemplateEngine::empty(),
            settings: Arc::new(crate::settings::Settings::default()),
            sent_callback: None,
        })
    }
}
