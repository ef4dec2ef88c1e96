//! Translation support for template rendering.
//!
//! Rendering binds `gettext`-style functions into every template context. When
//! the application registers a [`Translator`] on the engine builder, the bound
//! functions are scoped to the current request's preferred locale; otherwise an
//! identity passthrough stands in so templates can use `{{ _("...") }}`
//! unconditionally.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use minijinja::value::Value;

/// Locale-aware message lookup.
///
/// Implementations own the catalog format and the fallback rules; the crate
/// only routes the request's preferred locale and the message through.
///
/// # Example
///
/// ```rust,ignore
/// struct Catalog(HashMap<(String, String), String>);
///
/// impl Translator for Catalog {
///     fn translate(&self, locale: Option<&str>, message: &str) -> String {
///         let Some(locale) = locale else {
///             return message.to_string();
///         };
///         self.0
///             .get(&(locale.to_string(), message.to_string()))
///             .cloned()
///             .unwrap_or_else(|| message.to_string())
///     }
/// }
/// ```
pub trait Translator: Send + Sync + 'static {
    /// Translate a single message for the given locale.
    fn translate(&self, locale: Option<&str>, message: &str) -> String;

    /// Translate a countable message for the given locale.
    ///
    /// The default implementation picks the singular form for a count of one
    /// and translates the chosen form through [`translate`](Self::translate).
    fn translate_plural(
        &self,
        locale: Option<&str>,
        singular: &str,
        plural: &str,
        count: i64,
    ) -> String {
        if count == 1 {
            self.translate(locale, singular)
        } else {
            self.translate(locale, plural)
        }
    }
}

/// The identity translation function bound as `_` when no translator is
/// registered.
pub(crate) fn passthrough_value() -> Value {
    Value::from_function(|message: String| message)
}

/// Bind a translator's single-message lookup to a request locale.
pub(crate) fn gettext_value(translator: Arc<dyn Translator>, locale: Option<String>) -> Value {
    Value::from_function(move |message: String| translator.translate(locale.as_deref(), &message))
}

/// Bind a translator's plural lookup to a request locale.
pub(crate) fn ngettext_value(translator: Arc<dyn Translator>, locale: Option<String>) -> Value {
    Value::from_function(move |singular: String, plural: String, count: i64| {
        translator.translate_plural(locale.as_deref(), &singular, &plural, count)
    })
}

/// Extract the preferred locale from the `Accept-Language` header.
///
/// Only the first language range is consulted; quality weights and wildcards
/// yield `None`.
pub(crate) fn preferred_locale(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::ACCEPT_LANGUAGE)?.to_str().ok()?;
    let first = value.split(',').next()?;
    let tag = first.split(';').next()?.trim();
    if tag.is_empty() || tag == "*" {
        return None;
    }
    Some(tag.to_string())
}
