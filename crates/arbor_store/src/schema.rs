use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use sea_orm::ConnectionTrait;
use sea_orm::sea_query::{
    ColumnDef, ForeignKey, Index, IndexCreateStatement, Table, TableCreateStatement,
};
use tracing::debug;

use arbor_core::{
    ArborResult, COL_ARCHIVED, COL_ARCHIVED_TIME, COL_CREATED_TIME, COL_KEY,
    COL_LAST_MODIFIED_TIME, COL_PREFIX, COL_REF_ID, COL_VERSION, ColumnKind, ColumnSpec,
    EntitySchema, RecordSchema,
};

use crate::db::{col, exec_schema};

pub const COL_EVENT_KIND: &str = "kind";
pub const COL_EVENT_TIMESTAMP: &str = "timestamp";
pub const COL_EVENT_PAYLOAD: &str = "payload";

/// Synthesized table definition for one entity: the DDL for its primary
/// table, its sibling event table, and any secondary indexes.
pub struct TableSpec {
    pub schema: EntitySchema,
    create_table: TableCreateStatement,
    create_event_table: TableCreateStatement,
    create_indexes: Vec<IndexCreateStatement>,
}

impl TableSpec {
    fn synthesize(schema: &EntitySchema) -> Self {
        let table = col(&schema.table_name);
        let mut create = Table::create();
        create
            .table(table.clone())
            .if_not_exists()
            .col(
                ColumnDef::new(col(COL_REF_ID))
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(col(COL_VERSION)).big_integer().not_null())
            .col(ColumnDef::new(col(COL_ARCHIVED)).boolean().not_null())
            .col(
                ColumnDef::new(col(COL_CREATED_TIME))
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(col(COL_LAST_MODIFIED_TIME))
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(col(COL_ARCHIVED_TIME)).timestamp_with_time_zone());

        let mut create_indexes = Vec::new();
        for column in &schema.columns {
            create.col(&mut column_def(column));
            if column.unique {
                create_indexes.push(
                    Index::create()
                        .name(format!("idx_{}_{}", schema.table_name, column.name))
                        .table(table.clone())
                        .col(col(&column.name))
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                );
            }
        }
        if let Some(parent) = &schema.parent {
            create.foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{}_{}", schema.table_name, parent.column))
                    .from(table.clone(), col(&parent.column))
                    .to(col(&parent.parent_table), col(COL_REF_ID)),
            );
        }

        let event_table = col(&schema.event_table_name);
        let mut create_event = Table::create();
        create_event
            .table(event_table.clone())
            .if_not_exists()
            .col(ColumnDef::new(col(COL_REF_ID)).big_integer().not_null())
            .col(ColumnDef::new(col(COL_VERSION)).big_integer().not_null())
            .col(ColumnDef::new(col(COL_EVENT_KIND)).text().not_null())
            .col(
                ColumnDef::new(col(COL_EVENT_TIMESTAMP))
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(col(COL_EVENT_PAYLOAD)).text().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{}_ref_id", schema.event_table_name))
                    .from(event_table.clone(), col(COL_REF_ID))
                    .to(table, col(COL_REF_ID)),
            );
        create_indexes.push(
            Index::create()
                .name(format!("idx_{}_ref_id", schema.event_table_name))
                .table(event_table)
                .col(col(COL_REF_ID))
                .if_not_exists()
                .to_owned(),
        );

        Self {
            schema: schema.clone(),
            create_table: create.to_owned(),
            create_event_table: create_event.to_owned(),
            create_indexes,
        }
    }

    pub(crate) fn statements(&self) -> (&TableCreateStatement, &TableCreateStatement) {
        (&self.create_table, &self.create_event_table)
    }

    pub(crate) fn indexes(&self) -> &[IndexCreateStatement] {
        &self.create_indexes
    }
}

/// Synthesized table definition for a record table: composite natural key
/// `(prefix, key)`, no auto id, no event sibling.
pub struct RecordTableSpec {
    pub schema: RecordSchema,
    create_table: TableCreateStatement,
}

impl RecordTableSpec {
    fn synthesize(schema: &RecordSchema) -> Self {
        let table = col(&schema.table_name);
        let mut create = Table::create();
        create
            .table(table)
            .if_not_exists()
            .col(ColumnDef::new(col(COL_PREFIX)).big_integer().not_null())
            .col(&mut key_column_def(schema.key_kind))
            .col(
                ColumnDef::new(col(COL_CREATED_TIME))
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(col(COL_LAST_MODIFIED_TIME))
                    .timestamp_with_time_zone()
                    .not_null(),
            );
        for column in &schema.columns {
            create.col(&mut column_def(column));
        }
        create.primary_key(
            Index::create()
                .name(format!("pk_{}", schema.table_name))
                .col(col(COL_PREFIX))
                .col(col(COL_KEY)),
        );
        Self {
            schema: schema.clone(),
            create_table: create.to_owned(),
        }
    }

    pub(crate) fn statement(&self) -> &TableCreateStatement {
        &self.create_table
    }
}

fn column_def(column: &ColumnSpec) -> ColumnDef {
    let mut def = ColumnDef::new(col(&column.name));
    apply_kind(&mut def, column.kind);
    if !column.nullable {
        def.not_null();
    }
    def
}

fn key_column_def(kind: ColumnKind) -> ColumnDef {
    let mut def = ColumnDef::new(col(COL_KEY));
    apply_kind(&mut def, kind);
    def.not_null();
    def
}

fn apply_kind(def: &mut ColumnDef, kind: ColumnKind) {
    match kind {
        ColumnKind::Boolean => def.boolean(),
        ColumnKind::Integer | ColumnKind::EntityId | ColumnKind::ParentLink => def.big_integer(),
        ColumnKind::Float => def.double(),
        ColumnKind::Text | ColumnKind::Json => def.text(),
        ColumnKind::EntityName => def.string_len(100),
        ColumnKind::Date => def.date(),
        ColumnKind::DateTime => def.timestamp_with_time_zone(),
    };
}

/// Shared schema metadata. Registration is idempotent — the same entity maps
/// to the same `Arc<TableSpec>` — and each table's DDL runs at most once per
/// process, on first repository instantiation.
#[derive(Default)]
pub struct SchemaRegistry {
    tables: Mutex<HashMap<String, Arc<TableSpec>>>,
    record_tables: Mutex<HashMap<String, Arc<RecordTableSpec>>>,
    created: Mutex<HashSet<String>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity(&self, schema: &EntitySchema) -> ArborResult<Arc<TableSpec>> {
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = tables.get(&schema.table_name) {
            return Ok(existing.clone());
        }
        let spec = Arc::new(TableSpec::synthesize(schema));
        tables.insert(schema.table_name.clone(), spec.clone());
        Ok(spec)
    }

    pub fn register_record(&self, schema: &RecordSchema) -> ArborResult<Arc<RecordTableSpec>> {
        let mut tables = self
            .record_tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = tables.get(&schema.table_name) {
            return Ok(existing.clone());
        }
        let spec = Arc::new(RecordTableSpec::synthesize(schema));
        tables.insert(schema.table_name.clone(), spec.clone());
        Ok(spec)
    }

    pub async fn ensure_entity_tables<C: ConnectionTrait>(
        &self,
        conn: &C,
        spec: &TableSpec,
    ) -> ArborResult<()> {
        if self.already_created(&spec.schema.table_name) {
            return Ok(());
        }
        let (create_table, create_event_table) = spec.statements();
        exec_schema(conn, create_table).await?;
        exec_schema(conn, create_event_table).await?;
        for index in spec.indexes() {
            exec_schema(conn, index).await?;
        }
        self.mark_created(&spec.schema.table_name);
        debug!(table = %spec.schema.table_name, "synthesized entity tables");
        Ok(())
    }

    pub async fn ensure_record_table<C: ConnectionTrait>(
        &self,
        conn: &C,
        spec: &RecordTableSpec,
    ) -> ArborResult<()> {
        if self.already_created(&spec.schema.table_name) {
            return Ok(());
        }
        exec_schema(conn, spec.statement()).await?;
        self.mark_created(&spec.schema.table_name);
        debug!(table = %spec.schema.table_name, "synthesized record table");
        Ok(())
    }

    fn already_created(&self, table_name: &str) -> bool {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(table_name)
    }

    fn mark_created(&self, table_name: &str) {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table_name.to_owned());
    }
}
