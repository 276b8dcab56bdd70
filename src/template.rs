// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Thin adapter around a file-backed `tera` loader, rooted at a configured
//! directory. Grounded on the teacher's `create_template_engine`, stripped
//! of the event-invite-specific raw templates and i18n wiring: the teacher
//! registers one `add_raw_template` call per fixed name; here the
//! directory is walked and every matching file is registered under its
//! filename, since the provider set (and their templates) is now
//! open-ended rather than a handful of compile-time-known invite emails.

use crate::error::{NotifyError, TemplateError};
use crate::model::{Message, Recipient};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::{Context, Tera};

/// Renders named templates against a standard context. Shared (`Arc`)
/// across providers and ingress tasks; read-only after construction.
#[derive(Clone)]
pub struct TemplateEngine {
    tera: Arc<Tera>,
    root: PathBuf,
}

impl TemplateEngine {
    /// Loads every `*.txt`, `*.html` and `*.tera` file under `root` into a
    /// compiled `Tera` instance, registered by filename. Compilation
    /// happens once, here, rather than lazily per-render.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, NotifyError> {
        let root = root.into();
        let mut tera = Tera::default();

        if root.is_dir() {
            for entry in std::fs::read_dir(&root).map_err(NotifyError::from)? {
                let entry = entry.map_err(NotifyError::from)?;
                let path = entry.path();
                let is_template = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| matches!(ext, "txt" | "html" | "tera"));
                if !path.is_file() || !is_template {
                    continue;
                }

                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string();
                let content = std::fs::read_to_string(&path).map_err(NotifyError::from)?;
                tera.add_raw_template(&name, &content).map_err(|source| {
                    NotifyError::Template(TemplateError::Render { name, source })
                })?;
            }
        }

        Ok(Self {
            tera: Arc::new(tera),
            root,
        })
    }

    /// An engine with no templates loaded, useful for tests and for
    /// providers that never render through a named template.
    pub fn empty() -> Self {
        Self {
            tera: Arc::new(Tera::default()),
            root: PathBuf::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_template(&self, name: &str) -> Result<(), NotifyError> {
        if self.tera.get_template(name).is_ok() {
            Ok(())
        } else {
            Err(NotifyError::Template(TemplateError::NotFound(
                name.to_string(),
            )))
        }
    }

    /// The standard rendering context: `{recipient, username, message,
    /// subject, ...extra}`. Always injected, per the rendering laws in §8.
    pub fn standard_context(
        recipient: &Recipient,
        message: &Message,
        subject: Option<&str>,
        extra: &Value,
    ) -> Context {
        let mut ctx = Context::new();
        ctx.insert("recipient", recipient);
        ctx.insert("username", &recipient.display_name());
        ctx.insert("message", &message.as_text());
        ctx.insert("subject", &subject.unwrap_or_default());
        if let Value::Object(map) = extra {
            for (key, value) in map {
                ctx.insert(key, value);
            }
        }
        ctx
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String, NotifyError> {
        self.tera
            .render(name, context)
            .map_err(|source| NotifyError::Template(TemplateError::Render {
                name: name.to_string(),
                source,
            }))
    }

    /// Renders on a blocking thread pool since `Tera::render` is
    /// synchronous and CPU-bound; keeps the async worker loop responsive
    /// for large templates.
    pub async fn render_async(&self, name: &str, context: Context) -> Result<String, NotifyError> {
        let engine = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || engine.render(&name, &context))
            .await
            .map_err(|join_err| NotifyError::Provider(join_err.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, Actor};

    fn sample_recipient() -> Recipient {
        Recipient::Actor(Actor::new(
            "A",
            Account {
                provider: "dummy".into(),
                enabled: true,
                address: vec!["a@x.test".into()],
                number: vec![],
                userid: String::new(),
                attributes: Default::default(),
            },
        ))
    }

    #[test]
    fn renders_template_with_standard_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "Hello {{ recipient.name }}!").unwrap();
        let engine = TemplateEngine::load(dir.path()).unwrap();

        let recipient = sample_recipient();
        let message = Message::text("hi");
        let ctx = TemplateEngine::standard_context(&recipient, &message, None, &Value::Null);
        let rendered = engine.render("hello.txt", &ctx).unwrap();
        assert_eq!(rendered, "Hello A!");
    }

    #[test]
    fn missing_template_is_a_distinct_error() {
        let engine = TemplateEngine::empty();
        match engine.has_template("missing.txt") {
            Err(NotifyError::Template(TemplateError::NotFound(name))) => {
                assert_eq!(name, "missing.txt")
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn render_async_matches_sync_render() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "plain {{ message }}").unwrap();
        let engine = TemplateEngine::load(dir.path()).unwrap();

        let recipient = sample_recipient();
        let message = Message::text("world");
        let ctx = TemplateEngine::standard_context(&recipient, &message, None, &Value::Null);
        let rendered = engine.render_async("a.txt", ctx).await.unwrap();
        assert_eq!(rendered, "plain world");
    }
}
