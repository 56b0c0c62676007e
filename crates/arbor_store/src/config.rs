use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use arbor_core::{ArborError, ArborResult};

const DEFAULT_CONFIG_NAME: &str = "arbor.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
}

impl StoreConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> ArborResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| ArborError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| ArborError::storage(format!("read config: {err}")))?;
            let config: StoreConfig =
                serde_json::from_str(&raw).map_err(|err| ArborError::invalid(err.to_string()))?;
            return Ok(config);
        }
        let default = StoreConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| ArborError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| ArborError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> ArborResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| "arbor.sqlite".to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(ArborError::invalid("config is not sqlite backend")),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
            DatabaseConfig::Mysql { .. } => "mysql",
        }
    }

    pub fn connection_url(&self) -> Option<&str> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => None,
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } => Some(url.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StoreConfig;
    use tempfile::tempdir;

    #[test]
    fn load_or_init_writes_a_default_config() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path();
        let config = StoreConfig::load_or_init(base, &base.join("arbor.sqlite")).expect("config");
        assert_eq!(config.backend_name(), "sqlite");
        assert!(base.join("arbor.json").exists());
        let reloaded = StoreConfig::load_or_init(base, &base.join("other.sqlite")).expect("reload");
        assert_eq!(
            reloaded.sqlite_path(base).expect("path"),
            base.join("arbor.sqlite")
        );
    }

    #[test]
    fn non_sqlite_configs_have_no_sqlite_path() {
        let config = StoreConfig {
            database: super::DatabaseConfig::Postgres {
                url: "postgres://localhost/arbor".into(),
            },
            pool: None,
        };
        assert_eq!(config.backend_name(), "postgres");
        assert!(config.sqlite_path(std::path::Path::new("/tmp")).is_err());
        assert_eq!(
            config.connection_url(),
            Some("postgres://localhost/arbor")
        );
    }
}
