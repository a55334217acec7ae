//! Configuration types for seisquery.
//!
//! [`Config::load`] layers an optional TOML file over the built-in defaults.
//! [`Config::defaults`] returns the same defaults without touching the
//! filesystem (useful in tests).

use crate::event_type::parse_policy_types;
use crate::filter::OutputFormat;
use crate::query::EventPolicy;
use crate::types::EvaluationMode;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[service]
max_objects          = 100000
hide_author          = false
hide_comments        = false
event_type_whitelist = []
event_type_blacklist = []
formats              = ["json", "text"]

[server]
listen = "127.0.0.1:8080"

[catalog]
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// `[service]` section: per-request policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Object ceiling per request; 0 disables it.
    #[serde(default = "default_max_objects")]
    pub max_objects: usize,
    #[serde(default)]
    pub hide_author: bool,
    #[serde(default)]
    pub hide_comments: bool,
    /// Only return events whose preferred origin has this mode.
    #[serde(default)]
    pub evaluation_mode: Option<String>,
    #[serde(default)]
    pub event_type_whitelist: Vec<String>,
    #[serde(default)]
    pub event_type_blacklist: Vec<String>,
    /// Output formats offered to clients.
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
}

fn default_max_objects() -> usize { 100_000 }
fn default_formats() -> Vec<String> { vec!["json".to_string(), "text".to_string()] }

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_objects: default_max_objects(),
            hide_author: false,
            hide_comments: false,
            evaluation_mode: None,
            event_type_whitelist: Vec::new(),
            event_type_blacklist: Vec::new(),
            formats: default_formats(),
        }
    }
}

impl ServiceConfig {
    pub fn ceiling(&self) -> Option<usize> {
        (self.max_objects > 0).then_some(self.max_objects)
    }

    pub fn offers(&self, format: OutputFormat) -> bool {
        self.formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format.as_str()))
    }

    /// Resolve the configured type lists and evaluation mode.
    pub fn policy(&self) -> anyhow::Result<EventPolicy> {
        let types = |names: &[String], key: &str| -> anyhow::Result<_> {
            if names.is_empty() {
                return Ok(None);
            }
            parse_policy_types(names)
                .map(Some)
                .map_err(|bad| anyhow::anyhow!("service.{key}: unknown event type '{bad}'"))
        };
        let evaluation_mode = self
            .evaluation_mode
            .as_deref()
            .map(str::parse::<EvaluationMode>)
            .transpose()
            .map_err(|e| anyhow::anyhow!("service.evaluation_mode: {e}"))?;

        Ok(EventPolicy {
            whitelist: types(&self.event_type_whitelist, "event_type_whitelist")?,
            blacklist: types(&self.event_type_blacklist, "event_type_blacklist")?,
            evaluation_mode,
        })
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

fn default_listen() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 8080)) }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

/// `[catalog]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// JSON catalog dump loaded at startup.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load `path` layered on top of the built-in defaults. Without a path
    /// only the defaults apply. `SEISQUERY_SECTION__KEY` environment variables
    /// override both.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let cfg: Config = builder
            .add_source(
                config::Environment::with_prefix("SEISQUERY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        // fail at startup rather than per request
        cfg.service.policy()?;
        Ok(cfg)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
