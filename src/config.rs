//! Template configuration.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (prefix: `VELLUM_`)
//! 2. Current working directory: `./templates.toml`
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Template engine configuration.
///
/// # Example
///
/// ```toml
/// # templates.toml
/// dir = "templates"
/// session_key = "_template_session"
/// async_rendering = false
/// strict_undefined = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory searched for templates by name.
    ///
    /// When unset, only templates registered inline on the builder are
    /// available.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Session record key holding the template session namespace.
    ///
    /// The key is an explicit configuration value and is validated to be
    /// non-empty; it is never inferred from the session store's own
    /// configuration.
    ///
    /// Default: `"_template_session"`
    #[serde(default = "default_session_key")]
    pub session_key: String,

    /// Offload template evaluation to a blocking task in the async render
    /// variants.
    ///
    /// When `false`, the async variants behave identically to the synchronous
    /// ones.
    ///
    /// Default: `false`
    #[serde(default)]
    pub async_rendering: bool,

    /// Treat undefined template variables as errors.
    ///
    /// Default: `false` (undefined values render as empty, matching the
    /// engine's lenient mode)
    #[serde(default)]
    pub strict_undefined: bool,

    /// Preserve the trailing newline of template files in rendered output.
    ///
    /// Default: `false`
    #[serde(default)]
    pub keep_trailing_newline: bool,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: None,
            session_key: default_session_key(),
            async_rendering: false,
            strict_undefined: false,
            keep_trailing_newline: false,
        }
    }
}

impl TemplatesConfig {
    /// Load configuration from `templates.toml` and `VELLUM_*` environment
    /// variables on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn load() -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("templates.toml"))
            .merge(Env::prefixed("VELLUM_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the session key is empty or the template directory
    /// is set but does not exist.
    pub fn validate(&self) -> Result<()> {
        if self.session_key.is_empty() {
            return Err(Error::InvalidConfig(
                "session_key must not be empty".to_string(),
            ));
        }
        if let Some(dir) = &self.dir {
            if !dir.is_dir() {
                return Err(Error::InvalidConfig(format!(
                    "template directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn default_session_key() -> String {
    "_template_session".to_string()
}
