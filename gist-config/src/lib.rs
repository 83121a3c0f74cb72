//! Loader for pagegist configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//! 1. built-in defaults (every field has one, so an empty config is valid)
//! 2. YAML files and inline snippets, in the order they were attached
//! 3. `PAGEGIST__SECTION__KEY` environment variables
//!
//! String values may reference other environment variables as `${VAR}`;
//! those are expanded recursively after merging.
//!
//! ```yaml
//! service:
//!   endpoint: "http://127.0.0.1:5000/"
//!   timeout_secs: 60
//! surface:
//!   extraction_timeout_ms: 2000
//!   mailbox: 256
//! cache:
//!   backend: sqlite        # or "memory"
//!   path: "~/.local/share/pagegist/cache.db"
//! logging:
//!   format: text           # or "json"
//!   stderr: false
//!   filter: info
//! ```
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
pub const ENV_PREFIX: &str = "PAGEGIST";
pub const DEFAULT_SERVICE_ENDPOINT: &str = "http://127.0.0.1:5000/";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GistConfig {
    pub version: Option<String>,
    pub service: ServiceConfig,
    pub surface: SurfaceConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Where the summarization service lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    /// Total request timeout; unset keeps the transport default.
    pub timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_service_endpoint(),
            timeout_secs: None,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// How long the control surface waits for the page context to answer `getHTML`.
    pub extraction_timeout_ms: u64,
    /// Mailbox capacity of each actor.
    pub mailbox: usize,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            extraction_timeout_ms: 2000,
            mailbox: 256,
        }
    }
}

impl SurfaceConfig {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// SQLite file; `~/` is expanded. Defaults to the platform data dir.
    pub path: Option<String>,
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => PathBuf::from(shellexpand::tilde(p).into_owned()),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pagegist")
                .join("cache.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
    pub stderr: bool,
    pub filter: String,
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".into(),
            stderr: false,
            filter: "info".into(),
            dir: None,
        }
    }
}

fn default_service_endpoint() -> String {
    DEFAULT_SERVICE_ENDPOINT.into()
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct GistConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for GistConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GistConfigLoader {
    /// Start from defaults; environment overrides are applied at [`load`](Self::load).
    ///
    /// ```
    /// use gist_config::{CacheBackend, GistConfigLoader};
    ///
    /// let config = GistConfigLoader::new()
    ///     .with_yaml_str("version: '1'\ncache:\n  backend: sqlite")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.cache.backend, CacheBackend::Sqlite);
    /// assert_eq!(config.service.endpoint, "http://127.0.0.1:5000/");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; the format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when absent, so env-only setups work.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge everything, expand `${VAR}` placeholders and validate.
    ///
    /// ```
    /// use gist_config::GistConfigLoader;
    ///
    /// unsafe { std::env::set_var("GIST_DOCTEST_HOST", "summarizer.internal"); }
    ///
    /// let config = GistConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// service:
    ///   endpoint: "http://${GIST_DOCTEST_HOST}:5000/"
    ///   timeout_secs: 30
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.service.endpoint, "http://summarizer.internal:5000/");
    /// assert_eq!(config.service.timeout().unwrap().as_secs(), 30);
    ///
    /// unsafe { std::env::remove_var("GIST_DOCTEST_HOST"); }
    /// ```
    pub fn load(self) -> Result<GistConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: GistConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;
        Ok(typed)
    }
}

impl GistConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.service.endpoint.trim().is_empty() {
            return Err(ConfigError::Message("service.endpoint is empty".into()));
        }
        if self.surface.extraction_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "surface.extraction_timeout_ms must be positive".into(),
            ));
        }
        if self.surface.mailbox == 0 {
            return Err(ConfigError::Message("surface.mailbox must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!([
                "hello-$CITY",
                { "loc": "${CITY}-${STATE}" },
                42,
                true,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Winston", { "loc": "Winston-NC" }, 42, true, null])
            );
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }

    #[test]
    fn explicit_cache_path_expands_home() {
        temp_env::with_var("HOME", Some("/home/gist"), || {
            let cfg = CacheConfig {
                backend: CacheBackend::Sqlite,
                path: Some("~/cache.db".into()),
            };
            assert_eq!(cfg.resolved_path(), PathBuf::from("/home/gist/cache.db"));
        });
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = GistConfigLoader::new()
            .with_yaml_str("surface:\n  extraction_timeout_ms: 0")
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("extraction_timeout_ms"));
    }
}
