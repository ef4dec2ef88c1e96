//! Per-request template context assembly.
//!
//! Every render call goes through [`RenderContext::apply_defaults`], which
//! fills in the reserved template variables (`_`, `gettext`, `ngettext`,
//! `request`, `session`, and `get_flashed_messages`) strictly where the
//! caller-supplied context left them absent. A key the handler already set is
//! never overwritten.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use minijinja::value::{Value, ValueKind};
use serde::Serialize;

use crate::engine::TemplateEngine;
use crate::error::{Error, Result};
use crate::i18n;
use crate::session::{self, Flash, SessionMap};

/// The mapping of named values handed to the template engine.
///
/// Values are stored as engine values, so callables bound during assembly
/// survive into rendering unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ContextMap {
    values: BTreeMap<String, Value>,
}

impl ContextMap {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from any value that serializes to a mapping.
    ///
    /// Unit and none values yield an empty context.
    ///
    /// # Errors
    ///
    /// Returns an error naming the value kind when the value is not a
    /// mapping.
    pub fn from_serialize(data: impl Serialize) -> Result<Self> {
        Self::from_value(Value::from_serialize(data))
    }

    pub(crate) fn from_value(value: Value) -> Result<Self> {
        match value.kind() {
            ValueKind::Undefined | ValueKind::None => Ok(Self::new()),
            ValueKind::Map => {
                let mut context = Self::new();
                for key in value.try_iter().map_err(Error::from)? {
                    let item = value.get_item(&key).map_err(Error::from)?;
                    let key = key
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| key.to_string());
                    context.values.insert(key, item);
                }
                Ok(context)
            }
            kind => Err(Error::ContextNotMapping(kind.to_string())),
        }
    }

    /// Insert a value, replacing any existing entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.values.insert(key.into(), Value::from_serialize(value));
    }

    /// Insert an engine value, replacing any existing entry.
    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value only if the key is absent.
    pub fn set_default(&mut self, key: impl Into<String>, value: Value) {
        self.values.entry(key.into()).or_insert(value);
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the context holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Serialize> FromIterator<(K, V)> for ContextMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}

/// Serializable snapshot of the inbound request, exposed to templates as
/// `request`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: String,
    /// Full request URI.
    pub uri: String,
    /// URI path component.
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// Preferred locale from `Accept-Language`, if any.
    pub locale: Option<String>,
}

impl RequestInfo {
    pub(crate) fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            locale: i18n::preferred_locale(&parts.headers),
        }
    }
}

/// Per-request rendering handle.
///
/// Bundles the shared engine, a snapshot of the inbound request, and the
/// session view when one is attached. Extract it in handlers that render
/// templates, or receive it as the first parameter of a
/// [`templated`](crate::view::templated) handler.
///
/// Extraction fails with a server error when no
/// [`TemplateLayer`](crate::TemplateLayer) made the engine available.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub(crate) engine: TemplateEngine,
    pub(crate) info: Option<Arc<RequestInfo>>,
    pub(crate) session: Option<SessionMap>,
}

impl RenderContext {
    pub(crate) fn new(
        engine: TemplateEngine,
        info: Option<Arc<RequestInfo>>,
        session: Option<SessionMap>,
    ) -> Self {
        Self {
            engine,
            info,
            session,
        }
    }

    /// A rendering handle not bound to any request.
    ///
    /// Renders with the caller's context alone; no reserved keys are
    /// injected. Useful for rendering outside the request cycle.
    #[must_use]
    pub fn detached(engine: TemplateEngine) -> Self {
        Self::new(engine, None, None)
    }

    /// The shared template engine.
    #[must_use]
    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// The request snapshot, absent on detached handles.
    #[must_use]
    pub fn request(&self) -> Option<&RequestInfo> {
        self.info.as_deref()
    }

    /// The session view, if a session is attached.
    #[must_use]
    pub fn session(&self) -> Option<&SessionMap> {
        self.session.as_ref()
    }

    /// A flash handle bound to this request's session.
    #[must_use]
    pub fn flash(&self) -> Flash {
        Flash::new(self.session.clone())
    }

    /// Fill in the reserved template variables where absent.
    ///
    /// Idempotent with respect to pre-existing keys: a key the caller already
    /// set keeps its value. Detached handles inject nothing.
    pub fn apply_defaults(&self, context: &mut ContextMap) {
        let Some(info) = &self.info else {
            return;
        };

        for processor in self.engine.context_processors() {
            let extra = processor(info);
            for (key, value) in extra.values {
                context.set_default(key, value);
            }
        }

        if let Some(translator) = self.engine.translator() {
            context.set_default(
                "gettext",
                i18n::gettext_value(Arc::clone(translator), info.locale.clone()),
            );
            context.set_default(
                "ngettext",
                i18n::ngettext_value(Arc::clone(translator), info.locale.clone()),
            );
            // The locale-bound translator must win over the identity stub.
            if let Some(gettext) = context.get("gettext").cloned() {
                context.set_default("_", gettext);
            }
        }

        context.set_default("_", i18n::passthrough_value());
        context.set_default("request", Value::from_serialize(info.as_ref()));
        if let Some(session) = &self.session {
            context.set_default("session", Value::from_serialize(session.snapshot()));
        }
        context.set_default(
            "get_flashed_messages",
            session::accessor_value(self.session.clone()),
        );
    }
}

impl<S> FromRequestParts<S> for RenderContext
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let engine = parts
            .extensions
            .get::<TemplateEngine>()
            .cloned()
            .ok_or(Error::EngineUninitialized)?;
        let session = parts.extensions.get::<SessionMap>().cloned();
        let info = Arc::new(RequestInfo::from_parts(parts));
        Ok(Self::new(engine, Some(info), session))
    }
}
