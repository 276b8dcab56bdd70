// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Error taxonomy shared by every subsystem.
//!
//! Each variant corresponds to one of the abstract error kinds from the
//! design: ingress parsing, queueing, provider resolution/execution, and
//! template rendering all surface through this one enum so callers can
//! match on `kind` without caring which subsystem raised it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Ingress payload could not be decoded as JSON.
    #[error("could not parse message: {0}")]
    Parse(#[from] serde_path_to_error::Error<serde_json::Error>),

    /// Payload decoded but is missing required keys (e.g. no provider name).
    #[error("invalid message: {0}")]
    Validation(String),

    /// The bounded work queue has no room left.
    #[error("queue is full, discarding task")]
    QueueFull,

    /// The named provider is not registered.
    #[error("no provider registered under the name {0:?}")]
    ProviderLoad(String),

    /// Downstream rejected our credentials.
    #[error("authentication rejected by provider: {0}")]
    Auth(String),

    /// Downstream rejected the message itself as malformed.
    #[error("message rejected by provider: {0}")]
    Message(String),

    /// Generic provider runtime failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// Broker/TCP/HTTP transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A per-recipient send did not complete before the fan-out's batch timeout.
    #[error("send timed out")]
    Timeout,

    /// Template not found, or failed to render.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0:?} not found")]
    NotFound(String),

    #[error("failed to render template {name:?}: {source}")]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
}

pub type Result<T> = std::result::Result<T, NotifyError>;

impl From<tera::Error> for NotifyError {
    fn from(err: tera::Error) -> Self {
        NotifyError::Template(TemplateError::Render {
            name: String::new(),
            source: err,
        })
    }
}

impl From<redis::RedisError> for NotifyError {
    fn from(err: redis::RedisError) -> Self {
        NotifyError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for NotifyError {
    fn from(err: std::io::Error) -> Self {
        NotifyError::Transport(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else if err.is_permanent() || err.is_client() {
            NotifyError::Message(err.to_string())
        } else {
            NotifyError::Transport(err.to_string())
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else if err.is_status() {
            NotifyError::Message(err.to_string())
        } else {
            NotifyError::Transport(err.to_string())
        }
    }
}
