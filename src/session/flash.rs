//! Flash message support.
//!
//! Flash messages are one-time notifications stored in the session and
//! consumed when read, typically across a post-redirect-get boundary. They
//! live under the reserved `_flashes` key of the template session namespace as
//! an ordered sequence of category/message pairs.
//!
//! Appending without a session attached is a silent no-op: flash messages are
//! best-effort UI state, not core functionality. Reading drains the whole
//! sequence in a single operation; a mailbox nobody reads persists in the
//! session until the next read.
//!
//! # Example
//!
//! ```rust,ignore
//! use vellum::session::Flash;
//!
//! async fn save(flash: Flash, form: Form<Settings>) -> impl IntoResponse {
//!     // ... persist settings ...
//!     flash.success("Settings saved");
//!     Redirect::to("/settings")
//! }
//! ```
//!
//! Templates read the mailbox through the bound accessor:
//!
//! ```html
//! {% for category, message in get_flashed_messages(with_categories=true) %}
//!   <div class="flash-{{ category }}">{{ message }}</div>
//! {% endfor %}
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use minijinja::value::{Kwargs, Value};
use serde::{Deserialize, Serialize};

use super::SessionMap;

pub(crate) const FLASH_KEY: &str = "_flashes";

/// Category assigned to flash messages pushed without an explicit one.
pub const DEFAULT_CATEGORY: &str = "message";

/// A single flash message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    /// Free-form category label, e.g. `"success"` or `"error"`.
    pub category: String,
    /// The message content.
    pub message: String,
}

impl FlashMessage {
    /// Create a new flash message with an explicit category.
    #[must_use]
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }

    /// Create a flash message with the default category.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(DEFAULT_CATEGORY, message)
    }

    /// Create a success flash message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new("success", message)
    }

    /// Create an info flash message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new("info", message)
    }

    /// Create a warning flash message.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new("warning", message)
    }

    /// Create an error flash message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", message)
    }

    /// CSS class name derived from the category.
    #[must_use]
    pub fn css_class(&self) -> String {
        format!("flash-{}", self.category)
    }
}

fn read(session: &SessionMap) -> Vec<FlashMessage> {
    session
        .get(FLASH_KEY)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

/// Append a message to the session's flash mailbox, creating it if absent.
pub(crate) fn push(session: &SessionMap, message: FlashMessage) {
    let mut flashes = read(session);
    flashes.push(message);
    match serde_json::to_value(&flashes) {
        Ok(value) => session.insert_value(FLASH_KEY, value),
        Err(err) => tracing::error!("Failed to serialize flash messages: {err}"),
    }
}

/// Drain the flash mailbox in a single operation, retaining only entries
/// whose category is in `category_filter` (all entries when the filter is
/// empty). Entries removed by the filter are discarded with the pop.
pub(crate) fn take(session: &SessionMap, category_filter: &[&str]) -> Vec<FlashMessage> {
    let Some(value) = session.remove(FLASH_KEY) else {
        return Vec::new();
    };
    let flashes: Vec<FlashMessage> = serde_json::from_value(value).unwrap_or_default();
    if category_filter.is_empty() {
        flashes
    } else {
        flashes
            .into_iter()
            .filter(|flash| category_filter.contains(&flash.category.as_str()))
            .collect()
    }
}

/// The `get_flashed_messages` function bound into template contexts.
///
/// Drains lazily, at template evaluation time, so a render that never calls
/// it leaves the mailbox intact. Accepts `with_categories` (bool) and
/// `category_filter` (sequence of strings) keyword arguments.
pub(crate) fn accessor_value(session: Option<SessionMap>) -> Value {
    Value::from_function(
        move |kwargs: Kwargs| -> Result<Value, minijinja::Error> {
            let with_categories = kwargs.get::<Option<bool>>("with_categories")?.unwrap_or(false);
            let category_filter = kwargs
                .get::<Option<Vec<String>>>("category_filter")?
                .unwrap_or_default();
            kwargs.assert_all_used()?;

            let Some(session) = &session else {
                return Ok(Value::from_serialize(Vec::<String>::new()));
            };
            let filter: Vec<&str> = category_filter.iter().map(String::as_str).collect();
            let flashes = take(session, &filter);
            if with_categories {
                let pairs: Vec<(String, String)> = flashes
                    .into_iter()
                    .map(|flash| (flash.category, flash.message))
                    .collect();
                Ok(Value::from_serialize(pairs))
            } else {
                let messages: Vec<String> =
                    flashes.into_iter().map(|flash| flash.message).collect();
                Ok(Value::from_serialize(messages))
            }
        },
    )
}

/// Flash mailbox handle for handlers.
///
/// Extraction never fails: without a session layer the handle is simply
/// detached and appends become no-ops.
///
/// # Example
///
/// ```rust,ignore
/// async fn delete(flash: Flash) -> impl IntoResponse {
///     flash.error("Item could not be deleted");
///     Redirect::to("/items")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Flash {
    session: Option<SessionMap>,
}

impl Flash {
    pub(crate) fn new(session: Option<SessionMap>) -> Self {
        Self { session }
    }

    /// Whether a session is attached to the current request.
    #[must_use]
    pub fn attached(&self) -> bool {
        self.session.is_some()
    }

    /// Append a flash message. Silent no-op without a session.
    pub fn push(&self, message: FlashMessage) {
        match &self.session {
            Some(session) => push(session, message),
            None => tracing::debug!("flash message dropped: no session attached"),
        }
    }

    /// Append a message with the default category.
    pub fn message(&self, message: impl Into<String>) {
        self.push(FlashMessage::message(message));
    }

    /// Append a success message.
    pub fn success(&self, message: impl Into<String>) {
        self.push(FlashMessage::success(message));
    }

    /// Append an info message.
    pub fn info(&self, message: impl Into<String>) {
        self.push(FlashMessage::info(message));
    }

    /// Append a warning message.
    pub fn warning(&self, message: impl Into<String>) {
        self.push(FlashMessage::warning(message));
    }

    /// Append an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.push(FlashMessage::error(message));
    }

    /// Drain the mailbox, keeping category labels.
    ///
    /// Returns an empty sequence without a session. A second drain within the
    /// same request yields nothing.
    #[must_use]
    pub fn take_with_categories(&self, category_filter: &[&str]) -> Vec<FlashMessage> {
        match &self.session {
            Some(session) => take(session, category_filter),
            None => Vec::new(),
        }
    }

    /// Drain the mailbox, returning only the message strings.
    ///
    /// Equal in order and length to the message component of
    /// [`take_with_categories`](Self::take_with_categories) for the same
    /// mailbox state.
    #[must_use]
    pub fn take_messages(&self, category_filter: &[&str]) -> Vec<String> {
        self.take_with_categories(category_filter)
            .into_iter()
            .map(|flash| flash.message)
            .collect()
    }
}

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new(parts.extensions.get::<SessionMap>().cloned()))
    }
}
