//! Template environment setup and rendering.
//!
//! The environment has a strict two-phase lifecycle: [`TemplateEngineBuilder`]
//! is the single-threaded setup phase where loaders, templates, globals,
//! filters, a translator, and context processors may be registered;
//! [`TemplateEngineBuilder::build`] produces a [`TemplateEngine`], a cheaply
//! cloneable handle whose environment is immutable and safe to share across
//! concurrently handled requests without synchronization.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vellum::TemplateEngine;
//!
//! let engine = TemplateEngine::builder()
//!     .directory("templates")
//!     .global("site_name", "Acme")
//!     .build();
//!
//! let app = Router::new()
//!     .route("/", get(index))
//!     .layer(TemplateLayer::new(engine));
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use minijinja::value::Value;
use minijinja::{path_loader, Environment, UndefinedBehavior};
use serde::Serialize;

use crate::config::TemplatesConfig;
use crate::context::{ContextMap, RequestInfo};
use crate::error::{Error, Result};
use crate::i18n::Translator;

pub(crate) type ContextProcessor = dyn Fn(&RequestInfo) -> ContextMap + Send + Sync;

/// Builder for the template environment (the setup phase).
pub struct TemplateEngineBuilder {
    env: Environment<'static>,
    async_rendering: bool,
    translator: Option<Arc<dyn Translator>>,
    processors: Vec<Arc<ContextProcessor>>,
}

impl TemplateEngineBuilder {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_filter("truncate", filters::truncate);
        env.add_filter("pluralize", filters::pluralize);
        Self {
            env,
            async_rendering: false,
            translator: None,
            processors: Vec::new(),
        }
    }

    /// Load templates by name from a filesystem directory.
    #[must_use]
    pub fn directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.env.set_loader(path_loader(dir.as_ref()));
        self
    }

    /// Register a template from inline source under a name.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to parse.
    pub fn template(mut self, name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        self.env.add_template_owned(name.into(), source.into())?;
        Ok(self)
    }

    /// Register a value available to every template.
    #[must_use]
    pub fn global(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        self.env.add_global(name.into(), Value::from_serialize(value));
        self
    }

    /// Register the translator bound into request contexts as
    /// `gettext`/`ngettext`/`_`.
    #[must_use]
    pub fn translator(mut self, translator: impl Translator) -> Self {
        self.translator = Some(Arc::new(translator));
        self
    }

    /// Register a context processor.
    ///
    /// Processors run during per-request context assembly; each returned key
    /// is applied only where the caller-supplied context left it absent.
    #[must_use]
    pub fn context_processor(
        mut self,
        processor: impl Fn(&RequestInfo) -> ContextMap + Send + Sync + 'static,
    ) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Offload template evaluation to a blocking task in the async render
    /// variants.
    #[must_use]
    pub fn async_rendering(mut self, enabled: bool) -> Self {
        self.async_rendering = enabled;
        self
    }

    /// Treat undefined template variables as rendering errors.
    #[must_use]
    pub fn strict_undefined(mut self, enabled: bool) -> Self {
        self.env.set_undefined_behavior(if enabled {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Lenient
        });
        self
    }

    /// Preserve the trailing newline of template files in rendered output.
    #[must_use]
    pub fn keep_trailing_newline(mut self, enabled: bool) -> Self {
        self.env.set_keep_trailing_newline(enabled);
        self
    }

    /// Direct access to the underlying environment for registrations this
    /// builder does not model (custom filters, tests, syntax options).
    pub fn env_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    /// Finish setup and produce the shared engine handle.
    #[must_use]
    pub fn build(self) -> TemplateEngine {
        TemplateEngine {
            inner: Arc::new(EngineInner {
                env: self.env,
                async_rendering: self.async_rendering,
                translator: self.translator,
                processors: self.processors,
            }),
        }
    }
}

impl Default for TemplateEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct EngineInner {
    env: Environment<'static>,
    async_rendering: bool,
    translator: Option<Arc<dyn Translator>>,
    processors: Vec<Arc<ContextProcessor>>,
}

/// Shared handle to the built template environment (the serving phase).
#[derive(Clone)]
pub struct TemplateEngine {
    inner: Arc<EngineInner>,
}

impl TemplateEngine {
    /// Start the setup phase.
    #[must_use]
    pub fn builder() -> TemplateEngineBuilder {
        TemplateEngineBuilder::new()
    }

    /// Build an engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn from_config(config: &TemplatesConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Self::builder()
            .async_rendering(config.async_rendering)
            .strict_undefined(config.strict_undefined)
            .keep_trailing_newline(config.keep_trailing_newline);
        if let Some(dir) = &config.dir {
            builder = builder.directory(dir);
        }
        Ok(builder.build())
    }

    /// Check whether a named template can be loaded.
    #[must_use]
    pub fn has_template(&self, name: &str) -> bool {
        self.inner.env.get_template(name).is_ok()
    }

    /// Whether the async render variants offload evaluation to a blocking
    /// task.
    #[must_use]
    pub fn async_rendering(&self) -> bool {
        self.inner.async_rendering
    }

    pub(crate) fn translator(&self) -> Option<&Arc<dyn Translator>> {
        self.inner.translator.as_ref()
    }

    pub(crate) fn context_processors(&self) -> &[Arc<ContextProcessor>] {
        &self.inner.processors
    }

    /// Render a named template with an already-assembled context.
    pub(crate) fn render_named(&self, name: &str, context: &ContextMap) -> Result<String> {
        let template = self.inner.env.get_template(name).map_err(|err| {
            match err.kind() {
                minijinja::ErrorKind::TemplateNotFound => {
                    Error::TemplateNotFound(name.to_string())
                }
                _ => Error::Render(Box::new(err)),
            }
        })?;
        template.render(context).map_err(Error::from)
    }

    /// Render inline template source with an already-assembled context.
    pub(crate) fn render_inline(&self, source: &str, context: &ContextMap) -> Result<String> {
        self.inner.env.render_str(source, context).map_err(Error::from)
    }

    /// Render a named template, offloading evaluation to a blocking task when
    /// the engine was built with [`async_rendering`](TemplateEngineBuilder::async_rendering).
    pub(crate) async fn render_named_offloaded(
        &self,
        name: &str,
        context: ContextMap,
    ) -> Result<String> {
        if !self.inner.async_rendering {
            return self.render_named(name, &context);
        }
        let engine = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || engine.render_named(&name, &context))
            .await
            .map_err(|err| Error::Internal(format!("blocking render task failed: {err}")))?
    }
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("async_rendering", &self.inner.async_rendering)
            .field("translator", &self.inner.translator.is_some())
            .field("context_processors", &self.inner.processors.len())
            .finish_non_exhaustive()
    }
}

mod filters {
    /// Truncate text with an ellipsis.
    pub(super) fn truncate(value: String, max_len: usize) -> String {
        if value.len() <= max_len {
            value
        } else {
            format!("{}...", &value[..max_len.saturating_sub(3)])
        }
    }

    /// Pick a singular or plural word based on a count.
    pub(super) fn pluralize(count: i64, singular: String, plural: String) -> String {
        if count == 1 {
            singular
        } else {
            plural
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(name: &str, source: &str) -> TemplateEngine {
        TemplateEngine::builder()
            .template(name, source)
            .unwrap()
            .build()
    }

    #[test]
    fn test_render_named_template() {
        let engine = engine_with("hello.html", "Hello, {{ name }}!");
        let mut context = ContextMap::new();
        context.insert("name", "World");
        assert_eq!(
            engine.render_named("hello.html", &context).unwrap(),
            "Hello, World!"
        );
    }

    #[test]
    fn test_missing_template_carries_name() {
        let engine = TemplateEngine::builder().build();
        let err = engine
            .render_named("missing.html", &ContextMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(name) if name == "missing.html"));
    }

    #[test]
    fn test_has_template() {
        let engine = engine_with("a.html", "a");
        assert!(engine.has_template("a.html"));
        assert!(!engine.has_template("b.html"));
    }

    #[test]
    fn test_global_is_visible() {
        let engine = TemplateEngine::builder()
            .global("site_name", "Acme")
            .template("t.html", "{{ site_name }}")
            .unwrap()
            .build();
        assert_eq!(
            engine.render_named("t.html", &ContextMap::new()).unwrap(),
            "Acme"
        );
    }

    #[test]
    fn test_builtin_filters() {
        let engine = engine_with(
            "t.html",
            "{{ title | truncate(5) }} {{ 2 | pluralize('item', 'items') }}",
        );
        let mut context = ContextMap::new();
        context.insert("title", "Hello, World!");
        assert_eq!(
            engine.render_named("t.html", &context).unwrap(),
            "He... items"
        );
    }

    #[test]
    fn test_render_inline() {
        let engine = TemplateEngine::builder().build();
        let mut context = ContextMap::new();
        context.insert("n", 3);
        assert_eq!(engine.render_inline("n={{ n }}", &context).unwrap(), "n=3");
    }

    #[test]
    fn test_strict_undefined_errors() {
        let engine = TemplateEngine::builder()
            .strict_undefined(true)
            .template("t.html", "{{ nope }}")
            .unwrap()
            .build();
        assert!(engine.render_named("t.html", &ContextMap::new()).is_err());

        let lenient = engine_with("t.html", "{{ nope }}");
        assert_eq!(lenient.render_named("t.html", &ContextMap::new()).unwrap(), "");
    }

    #[test]
    fn test_from_config_validates() {
        let config = TemplatesConfig {
            dir: Some("/definitely/not/a/real/template/dir".into()),
            ..TemplatesConfig::default()
        };
        assert!(TemplateEngine::from_config(&config).is_err());
        assert!(TemplateEngine::from_config(&TemplatesConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_offloaded_render_matches_inline_path() {
        let engine = TemplateEngine::builder()
            .async_rendering(true)
            .template("t.html", "{{ n }}")
            .unwrap()
            .build();
        let mut context = ContextMap::new();
        context.insert("n", 7);
        assert_eq!(
            engine
                .render_named_offloaded("t.html", context.clone())
                .await
                .unwrap(),
            "7"
        );

        let sync_engine = engine_with("t.html", "{{ n }}");
        assert_eq!(
            sync_engine.render_named_offloaded("t.html", context).await.unwrap(),
            "7"
        );
    }
}
