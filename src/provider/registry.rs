// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Compile-time provider registry, replacing the source's
//! import-by-name dynamic loading (§9 Design Notes).

use super::{
    dummy::DummyProvider, email::EmailProvider, onesignal::OneSignalProvider,
    slack::SlackProvider, teams::TeamsProvider, telegram::TelegramProvider,
    twilio::TwilioProvider, Provider, ProviderContext,
};
use crate::error::NotifyError;
use std::collections::HashMap;

type Constructor = fn(&ProviderContext) -> Result<Box<dyn Provider>, NotifyError>;

/// A name -> constructor map, populated at startup. `resolve` fails fast
/// with `NotifyError::ProviderLoad` for unknown names.
#[derive(Clone)]
pub struct ProviderRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl ProviderRegistry {
    /// The registry shipped by default: one entry per bundled provider.
    pub fn with_builtin_providers() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register("dummy", |ctx| Ok(Box::new(DummyProvider::new(ctx))));
        registry.register("email", |ctx| Ok(Box::new(EmailProvider::new(ctx)?)));
        registry.register("slack", |ctx| Ok(Box::new(SlackProvider::new(ctx)?)));
        registry.register("telegram", |ctx| Ok(Box::new(TelegramProvider::new(ctx)?)));
        registry.register("twilio", |ctx| Ok(Box::new(TwilioProvider::new(ctx)?)));
        registry.register("teams", |ctx| Ok(Box::new(TeamsProvider::new(ctx)?)));
        registry.register("onesignal", |ctx| Ok(Box::new(OneSignalProvider::new(ctx)?)));
        registry
    }

    pub fn register(&mut self, name: &'static str, constructor: Constructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn build(&self, name: &str, ctx: &ProviderContext) -> Result<Box<dyn Provider>, NotifyError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| NotifyError::ProviderLoad(name.to_string()))?;
        constructor(ctx)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin_providers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateEngine;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> ProviderContext {
        ProviderContext {
            kwargs: json!({}),
            template_engine: TemplateEngine::empty(),
            settings: Arc::new(crate::settings::Settings::default()),
            sent_callback: None,
        }
    }

    #[test]
    fn resolves_builtin_dummy_provider() {
        let registry = ProviderRegistry::with_builtin_providers();
        let provider = registry.build("dummy", &ctx()).unwrap();
        assert_eq!(provider.name(), "dummy");
    }

    #[test]
    fn unknown_provider_fails_fast() {
        let registry = ProviderRegistry::with_builtin_providers();
        match registry.build("not-a-provider", &ctx()) {
            Err(NotifyError::ProviderLoad(name)) => assert_eq!(name, "not-a-provider"),
            Err(other) => panic!("expected ProviderLoad, got {other:?}"),
            Ok(_) => panic!("expected provider resolution to fail"),
        }
    }
}
