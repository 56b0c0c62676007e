use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, TransactionTrait,
};

use arbor_core::{ArborResult, CodecRegistry};

use crate::schema::SchemaRegistry;
use crate::{DatabaseConfig, StoreConfig};

const DEFAULT_DB_NAME: &str = "arbor.sqlite";

/// Connection plus the shared read-mostly registries. The datastore owns the
/// pool; units of work are demarcated by the caller through [`Datastore::begin`],
/// and repositories borrow whichever handle the caller passes them.
pub struct Datastore {
    conn: DatabaseConnection,
    schemas: Arc<SchemaRegistry>,
    codecs: Arc<CodecRegistry>,
}

impl Datastore {
    pub async fn connect(
        config: &StoreConfig,
        base_dir: &Path,
        codecs: Arc<CodecRegistry>,
    ) -> ArborResult<Self> {
        let url = build_connection_url(config, base_dir)?;
        let mut options = ConnectOptions::new(url);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        let conn = Database::connect(options).await?;
        Ok(Self {
            conn,
            schemas: Arc::new(SchemaRegistry::new()),
            codecs,
        })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    /// Open a unit of work. The caller commits or rolls back; repositories
    /// never do.
    pub async fn begin(&self) -> ArborResult<DatabaseTransaction> {
        Ok(self.conn.begin().await?)
    }
}

fn build_connection_url(config: &StoreConfig, base_dir: &Path) -> ArborResult<String> {
    match &config.database {
        DatabaseConfig::Sqlite { .. } => {
            let path = config.sqlite_path(base_dir)?;
            Ok(format!("sqlite://{}?mode=rwc", path.display()))
        }
        DatabaseConfig::Postgres { url } => Ok(url.clone()),
        DatabaseConfig::Mysql { url } => Ok(url.clone()),
    }
}

pub fn load_or_init_config(base: &Path) -> ArborResult<StoreConfig> {
    let default_sqlite = base.join(DEFAULT_DB_NAME);
    StoreConfig::load_or_init(base, &default_sqlite)
}

pub async fn open_datastore(base: &Path, codecs: Arc<CodecRegistry>) -> ArborResult<Datastore> {
    let config = load_or_init_config(base)?;
    Datastore::connect(&config, base, codecs).await
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}
