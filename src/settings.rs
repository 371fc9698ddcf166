//! Configuration and logging setup.
//!
//! Settings are read from an optional file and then overridden by environment
//! variables prefixed with `SC_PATTERN_` (for example `SC_PATTERN_LOG_FILTER=debug`
//! or `SC_PATTERN_MAX_SEARCH_ROWS=100`); `__` separates nested keys.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::Result;

pub const ENV_PREFIX: &str = "SC_PATTERN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directives for the tracing `EnvFilter`.
    pub log_filter: String,
    /// System identifiers resolved as constant nodes when a memory is created.
    pub keynodes: Vec<String>,
    /// Upper bound on rows returned by the protocol's search action.
    pub max_search_rows: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self { log_filter: String::from("info"), keynodes: Vec::new(), max_search_rows: None }
    }
}

impl Settings {
    /// Loads settings from `path` (when given and present) layered under the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        let settings = builder
            .add_source(environment)
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }
}

/// Installs a formatting subscriber filtered by `settings.log_filter`, unless
/// `RUST_LOG` is set. Calling it again after a subscriber is installed is a no-op.
pub fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
