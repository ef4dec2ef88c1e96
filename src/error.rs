//! Error types and HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the template integration.
///
/// Every rendering or configuration failure is a permanent condition for the
/// current request and converts to a server error response; there are no
/// retries at this layer. The absence of a session is deliberately *not* an
/// error anywhere in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Rendering was attempted before a [`TemplateLayer`](crate::TemplateLayer)
    /// made the engine available to the request.
    #[error("Template engine has not been initialized")]
    EngineUninitialized,

    /// The named template is not present in the environment's loader.
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    /// The template engine failed while parsing or evaluating a template.
    #[error("Template rendering failed: {0}")]
    Render(Box<minijinja::Error>),

    /// A handler returned a context value that does not serialize to a
    /// mapping.
    #[error("Template context must be a mapping, not {0}")]
    ContextNotMapping(String),

    /// Session record access failed.
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration extraction error.
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration was loaded but failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (blocking-task failures and other unexpected states).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::EngineUninitialized => {
                tracing::error!("render attempted without an initialized template engine");
            }
            Error::TemplateNotFound(name) => {
                tracing::error!(template = %name, "template not found");
            }
            Error::Render(err) => {
                tracing::error!("template rendering error: {err}");
            }
            Error::ContextNotMapping(kind) => {
                tracing::error!(kind = %kind, "handler returned a non-mapping template context");
            }
            Error::Session(msg) => {
                tracing::error!("session error: {msg}");
            }
            Error::Config(err) => {
                tracing::error!("configuration error: {err}");
            }
            Error::InvalidConfig(msg) => {
                tracing::error!("invalid configuration: {msg}");
            }
            Error::Internal(msg) => {
                tracing::error!("internal error: {msg}");
            }
        }

        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Error::Render(Box::new(err))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
