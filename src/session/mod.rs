//! Session-backed template context.
//!
//! The session store itself (cookies, persistence, expiry) belongs to
//! [`tower-sessions`](https://docs.rs/tower-sessions); this module owns the
//! request-scoped *view* of it that templates and flash messages operate on.
//!
//! [`TemplateLayer`](crate::TemplateLayer) loads one configured key of the
//! session record into a [`SessionMap`] before the handler runs and writes it
//! back afterwards when it changed. Handlers and templates read and mutate the
//! map synchronously; all session I/O stays at the layer boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use vellum::session::SessionMap;
//!
//! async fn profile(session: SessionMap) -> impl IntoResponse {
//!     session.insert("user", "ferris")?;
//!     Redirect::to("/")
//! }
//! ```

mod flash;

pub use flash::{Flash, FlashMessage, DEFAULT_CATEGORY};

pub(crate) use flash::accessor_value;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::Error;

/// Mapping-like view of the template session namespace.
///
/// Cloning is cheap and clones share the same underlying map, so the layer,
/// extractors, and template-bound accessors all observe the same state within
/// a request. The map is never shared across requests.
#[derive(Debug, Clone, Default)]
pub struct SessionMap {
    inner: Arc<SessionMapInner>,
}

#[derive(Debug, Default)]
struct SessionMapInner {
    values: DashMap<String, JsonValue>,
    dirty: AtomicBool,
}

impl SessionMap {
    /// Create a new, empty session view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a view over values loaded from the session record.
    ///
    /// The view starts clean; only subsequent mutations make it eligible for
    /// write-back.
    #[must_use]
    pub fn from_values(values: serde_json::Map<String, JsonValue>) -> Self {
        let map = Self::new();
        for (key, value) in values {
            map.inner.values.insert(key, value);
        }
        map
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.inner.values.get(key).map(|entry| entry.value().clone())
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.values.contains_key(key)
    }

    /// Insert a value, serializing it to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn insert(&self, key: impl Into<String>, value: impl Serialize) -> crate::Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::Session(format!("Failed to serialize session value: {e}")))?;
        self.insert_value(key, value);
        Ok(())
    }

    /// Insert an already-serialized value.
    pub fn insert_value(&self, key: impl Into<String>, value: JsonValue) {
        self.inner.values.insert(key.into(), value);
        self.inner.dirty.store(true, Ordering::Release);
    }

    /// Remove a value by key, returning it.
    ///
    /// Removing an absent key does not mark the view dirty.
    pub fn remove(&self, key: &str) -> Option<JsonValue> {
        let removed = self.inner.values.remove(key).map(|(_, value)| value);
        if removed.is_some() {
            self.inner.dirty.store(true, Ordering::Release);
        }
        removed
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    /// Check whether the view holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }

    /// Whether the view was mutated since it was loaded.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    /// Point-in-time copy of the stored values, with stable key order.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Map<String, JsonValue> {
        let sorted: std::collections::BTreeMap<String, JsonValue> = self
            .inner
            .values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        sorted.into_iter().collect()
    }
}

impl<S> FromRequestParts<S> for SessionMap
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionMap>().cloned().ok_or_else(|| {
            Error::Session(
                "Session context not found in request extensions; \
                 is TemplateLayer installed inside a session layer?"
                    .to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loaded_view_starts_clean() {
        let mut values = serde_json::Map::new();
        values.insert("user".to_string(), json!("ferris"));
        let map = SessionMap::from_values(values);
        assert!(!map.is_dirty());
        assert_eq!(map.get("user"), Some(json!("ferris")));
    }

    #[test]
    fn test_insert_and_remove_mark_dirty() {
        let map = SessionMap::new();
        map.insert("theme", "dark").unwrap();
        assert!(map.is_dirty());
        assert!(map.contains_key("theme"));

        let map = SessionMap::new();
        assert_eq!(map.remove("missing"), None);
        assert!(!map.is_dirty());
        map.insert_value("k", json!(1));
        assert_eq!(map.remove("k"), Some(json!(1)));
        assert!(map.is_dirty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let map = SessionMap::new();
        let view = map.clone();
        view.insert("user", "ferris").unwrap();
        assert_eq!(map.get("user"), Some(json!("ferris")));
        assert!(map.is_dirty());
    }

    #[test]
    fn test_snapshot_has_stable_order() {
        let map = SessionMap::new();
        map.insert("b", 2).unwrap();
        map.insert("a", 1).unwrap();
        let keys: Vec<_> = map.snapshot().keys().cloned().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
