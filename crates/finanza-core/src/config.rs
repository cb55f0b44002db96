//! Application configuration
//!
//! Layered: built-in defaults, then `config.toml` in the data directory, then
//! environment variables. Backend credentials (`GEMINI_API_KEY`, `OLLAMA_HOST`,
//! ...) are read by the AI backends themselves.
//!
//! ```toml
//! [storage]
//! database = "/var/lib/finanza/finanza.db"
//! seed_demo_data = true
//!
//! [ai]
//! backend = "gemini"
//! timeout_secs = 30
//!
//! [auth]
//! session_ttl_days = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::ai::AIClient;
use crate::error::{Error, Result};
use crate::identity::DEFAULT_SESSION_TTL_DAYS;
use crate::insights::DEFAULT_INSIGHT_TIMEOUT;

/// Config file name inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

pub const ENV_DATA_DIR: &str = "FINANZA_DATA_DIR";
pub const ENV_DATABASE: &str = "FINANZA_DB";
pub const ENV_AI_BACKEND: &str = "AI_BACKEND";
pub const ENV_INSIGHT_TIMEOUT: &str = "FINANZA_INSIGHT_TIMEOUT_SECS";

/// Default data directory: `$FINANZA_DATA_DIR`, else the platform data dir
pub fn default_data_dir() -> PathBuf {
    std::env::var(ENV_DATA_DIR)
        .ok()
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::data_local_dir().map(|d| d.join("finanza")))
        .unwrap_or_else(|| PathBuf::from(".finanza"))
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Relational database; `None` selects local mode
    pub database: Option<PathBuf>,
    pub seed_demo_data: bool,
    pub ai_backend: String,
    pub insight_timeout: Duration,
    pub session_ttl_days: i64,
}

impl AppConfig {
    /// Defaults for a given data directory
    pub fn defaults(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            database: None,
            seed_demo_data: true,
            ai_backend: "gemini".to_string(),
            insight_timeout: DEFAULT_INSIGHT_TIMEOUT,
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
        }
    }

    /// Load from the default data directory and the process environment
    pub fn load() -> Result<Self> {
        Self::load_from(default_data_dir())
    }

    /// Load from `data_dir/config.toml` (if present) and the process environment
    pub fn load_from(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let path = data_dir.join(CONFIG_FILE);
        let content = if path.exists() {
            debug!(path = %path.display(), "Reading config file");
            Some(fs::read_to_string(&path)?)
        } else {
            None
        };
        Self::from_sources(data_dir, content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from explicit sources
    pub fn from_sources<F>(data_dir: PathBuf, toml_content: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::defaults(data_dir);

        if let Some(content) = toml_content {
            let raw: RawConfig = toml::from_str(content)?;
            if let Some(storage) = raw.storage {
                if let Some(db) = storage.database {
                    config.database = Some(config.resolve_path(&db));
                }
                if let Some(seed) = storage.seed_demo_data {
                    config.seed_demo_data = seed;
                }
            }
            if let Some(ai) = raw.ai {
                if let Some(backend) = ai.backend {
                    config.ai_backend = backend;
                }
                if let Some(secs) = ai.timeout_secs {
                    config.insight_timeout = Duration::from_secs(secs);
                }
            }
            if let Some(ttl) = raw.auth.and_then(|a| a.session_ttl_days) {
                config.session_ttl_days = ttl;
            }
        }

        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        if let Some(db) = lookup(ENV_DATABASE) {
            config.database = Some(config.resolve_path(Path::new(&db)));
        }
        if let Some(backend) = lookup(ENV_AI_BACKEND) {
            config.ai_backend = backend;
        }
        if let Some(secs) = lookup(ENV_INSIGHT_TIMEOUT) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Validation(format!("{} must be a number of seconds", ENV_INSIGHT_TIMEOUT))
            })?;
            config.insight_timeout = Duration::from_secs(secs);
        }

        if config.insight_timeout.is_zero() {
            return Err(Error::Validation(
                "AI timeout must be at least one second".to_string(),
            ));
        }
        if config.session_ttl_days <= 0 {
            return Err(Error::Validation(
                "session_ttl_days must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    /// Relative paths are taken relative to the data directory
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn is_local_mode(&self) -> bool {
        self.database.is_none()
    }

    /// Build the configured AI client, if its credentials are present
    pub fn ai_client(&self) -> Option<AIClient> {
        AIClient::from_backend_name(&self.ai_backend)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    storage: Option<RawStorage>,
    ai: Option<RawAi>,
    auth: Option<RawAuth>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    database: Option<PathBuf>,
    seed_demo_data: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawAi {
    backend: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawAuth {
    session_ttl_days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_local_mode() {
        let config = AppConfig::from_sources("/data".into(), None, env_of(&[])).unwrap();
        assert!(config.is_local_mode());
        assert!(config.seed_demo_data);
        assert_eq!(config.ai_backend, "gemini");
        assert_eq!(config.insight_timeout, Duration::from_secs(30));
        assert_eq!(config.session_ttl_days, 30);
    }

    #[test]
    fn test_toml_then_env() {
        let toml = r#"
            [storage]
            database = "finanza.db"
            seed_demo_data = false

            [ai]
            backend = "ollama"
            timeout_secs = 10

            [auth]
            session_ttl_days = 7
        "#;

        let config = AppConfig::from_sources("/data".into(), Some(toml), env_of(&[])).unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/data/finanza.db")));
        assert!(!config.seed_demo_data);
        assert_eq!(config.ai_backend, "ollama");
        assert_eq!(config.insight_timeout, Duration::from_secs(10));
        assert_eq!(config.session_ttl_days, 7);

        let config = AppConfig::from_sources(
            "/data".into(),
            Some(toml),
            env_of(&[
                (ENV_DATABASE, "/srv/other.db"),
                (ENV_AI_BACKEND, "mock"),
                (ENV_INSIGHT_TIMEOUT, "5"),
            ]),
        )
        .unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/srv/other.db")));
        assert_eq!(config.ai_backend, "mock");
        assert_eq!(config.insight_timeout, Duration::from_secs(5));
        assert!(config.ai_client().is_some());
    }

    #[test]
    fn test_invalid_sources() {
        assert!(matches!(
            AppConfig::from_sources("/data".into(), Some("[storage"), env_of(&[])),
            Err(Error::Toml(_))
        ));
        assert!(AppConfig::from_sources(
            "/data".into(),
            None,
            env_of(&[(ENV_INSIGHT_TIMEOUT, "soon")])
        )
        .is_err());
        assert!(AppConfig::from_sources(
            "/data".into(),
            Some("[auth]\nsession_ttl_days = 0"),
            env_of(&[])
        )
        .is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            AppConfig::from_sources("/data".into(), Some("[ai]\ntimeout_secs = 0"), env_of(&[])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            AppConfig::from_sources("/data".into(), None, env_of(&[(ENV_INSIGHT_TIMEOUT, "0")])),
            Err(Error::Validation(_))
        ));
        // The environment can still repair a bad file value
        let config = AppConfig::from_sources(
            "/data".into(),
            Some("[ai]\ntimeout_secs = 0"),
            env_of(&[(ENV_INSIGHT_TIMEOUT, "5")]),
        )
        .unwrap();
        assert_eq!(config.insight_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_reads_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[ai]\nbackend = \"mock\"\n").unwrap();
        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.data_dir, dir.path());
    }
}
