//! # vellum
//!
//! MiniJinja template integration for axum: request-aware rendering, flash
//! messages, and session-backed template context.
//!
//! ## Features
//!
//! - **Shared environment**: templates compiled and cached once, served
//!   read-only across requests
//! - **Context injection**: `request`, `session`, `get_flashed_messages`, and
//!   translation functions filled into every render without overwriting
//!   caller-supplied values
//! - **Flash messages**: category-tagged one-time notifications stored in the
//!   session, drained exactly once at read time
//! - **Handler adapter**: return a context mapping from a handler and get a
//!   rendered HTML response
//! - **Translation seam**: plug a locale-aware [`Translator`]; templates use
//!   `{{ _("...") }}` either way
//!
//! ## Example
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use tower_sessions::SessionManagerLayer;
//! use tower_sessions_memory_store::MemoryStore;
//! use vellum::{templated, ContextMap, RenderContext, TemplateEngine, TemplateLayer};
//!
//! async fn index(ctx: RenderContext) -> ContextMap {
//!     ctx.flash().success("Welcome back");
//!     ContextMap::new().with("greetings", "Hello")
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = TemplateEngine::builder()
//!         .directory("templates")
//!         .build();
//!
//!     let app: Router = Router::new()
//!         .route("/", get(templated("index.html", index)))
//!         .layer(TemplateLayer::new(engine))
//!         .layer(SessionManagerLayer::new(MemoryStore::default()));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! Everything non-trivial is delegated: axum owns routing and transport,
//! minijinja owns template compilation and evaluation, tower-sessions owns
//! session persistence. This crate contributes the request-lifecycle glue
//! between them.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod i18n;
pub mod layer;
pub mod render;
pub mod session;
pub mod view;

pub use config::TemplatesConfig;
pub use context::{ContextMap, RenderContext, RequestInfo};
pub use engine::{TemplateEngine, TemplateEngineBuilder};
pub use error::{Error, Result};
pub use i18n::Translator;
pub use layer::TemplateLayer;
pub use session::{Flash, FlashMessage, SessionMap};
pub use view::{templated, IntoViewResult, Templated, ViewResult};

/// Convenience re-exports for application code.
pub mod prelude {
    pub use crate::config::TemplatesConfig;
    pub use crate::context::{ContextMap, RenderContext, RequestInfo};
    pub use crate::engine::{TemplateEngine, TemplateEngineBuilder};
    pub use crate::error::{Error, Result};
    pub use crate::i18n::Translator;
    pub use crate::layer::TemplateLayer;
    pub use crate::session::{Flash, FlashMessage, SessionMap, DEFAULT_CATEGORY};
    pub use crate::view::{templated, IntoViewResult, Templated, ViewResult};

    pub use axum::response::Html;
    pub use tower_sessions::Session;
}
