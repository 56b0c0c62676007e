pub mod config;
pub mod datastore;
mod db;
mod filter;
pub mod journal;
pub mod repo;
pub mod schema;

pub use arbor_core::*;
pub use config::{DatabaseConfig, PoolConfig, StoreConfig};
pub use datastore::{Datastore, default_sqlite_path, load_or_init_config, open_datastore};
pub use journal::JournaledEvent;
pub use repo::{
    BranchRepository, ErrorHooks, LeafRepository, RecordRepository, RootRepository,
    StubRepository, TrunkRepository,
};
pub use schema::{RecordTableSpec, SchemaRegistry, TableSpec};
