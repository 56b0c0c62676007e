#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use arbor_store::{
    ArborResult, AtomicValue, BranchRepository, CodecRegistry, ColumnKind, CompositeValue,
    Datastore, Entity, EntityHeader, EntitySchema, EnumValue, Realm, Record, RecordSchema, RefId,
    Row, Shape, Timestamp, TrunkRepository, RootRepository, row_value,
};

pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> Timestamp {
    Timestamp::from_datetime(
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .expect("valid time"),
    )
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArchivalReason {
    Superseded,
    Manual,
}

impl EnumValue for ArchivalReason {
    fn as_str(&self) -> &'static str {
        match self {
            ArchivalReason::Superseded => "superseded",
            ArchivalReason::Manual => "manual",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "superseded" => Some(ArchivalReason::Superseded),
            "manual" => Some(ArchivalReason::Manual),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChoreStatus {
    Open,
    Done,
}

impl EnumValue for ChoreStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ChoreStatus::Open => "open",
            ChoreStatus::Done => "done",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "open" => Some(ChoreStatus::Open),
            "done" => Some(ChoreStatus::Done),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Difficulty(pub i64);

impl AtomicValue for Difficulty {
    type Base = i64;

    fn to_base(&self) -> i64 {
        self.0
    }

    fn from_base(base: i64) -> ArborResult<Self> {
        Ok(Difficulty(base))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChoreNotes {
    pub summary: String,
    pub tags: Vec<String>,
}

impl CompositeValue for ChoreNotes {}

pub fn codecs() -> Arc<CodecRegistry> {
    let mut registry = CodecRegistry::with_defaults();
    registry.register_enum::<ArchivalReason>(Realm::Database);
    registry.register_enum::<ChoreStatus>(Realm::Database);
    registry.register_atomic::<Difficulty>(Realm::Database);
    registry.register_composite::<ChoreNotes>(Realm::Database);
    Arc::new(registry)
}

pub async fn open_store(base: &Path) -> Datastore {
    arbor_store::open_datastore(base, codecs())
        .await
        .expect("open datastore")
}

#[derive(Clone, Debug, PartialEq)]
pub struct Workspace {
    pub header: EntityHeader,
    pub name: String,
    pub description: Option<String>,
    pub archival_reason: Option<ArchivalReason>,
}

static WORKSPACE_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("Workspace", Shape::Root)
        .unique_field("name", ColumnKind::EntityName)
        .nullable_field("description", ColumnKind::Text)
        .archival_reason()
        .build()
        .expect("workspace schema")
});

impl Workspace {
    pub fn new(name: &str, now: Timestamp) -> Self {
        Self {
            header: EntityHeader::new(now),
            name: name.to_owned(),
            description: None,
            archival_reason: None,
        }
    }
}

impl Entity for Workspace {
    fn schema() -> &'static EntitySchema {
        &WORKSPACE_SCHEMA
    }

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn encode_fields(&self, codecs: &CodecRegistry) -> ArborResult<Row> {
        let mut row = Row::new();
        row.insert("name".into(), codecs.encode(Realm::Database, &self.name)?);
        row.insert(
            "description".into(),
            codecs.encode_opt(Realm::Database, self.description.as_ref())?,
        );
        row.insert(
            "archival_reason".into(),
            codecs.encode_opt(Realm::Database, self.archival_reason.as_ref())?,
        );
        Ok(row)
    }

    fn decode_fields(header: EntityHeader, row: &Row, codecs: &CodecRegistry) -> ArborResult<Self> {
        Ok(Self {
            header,
            name: codecs.decode(Realm::Database, row_value(row, "name")?)?,
            description: codecs.decode_opt(Realm::Database, row_value(row, "description")?)?,
            archival_reason: codecs
                .decode_opt(Realm::Database, row_value(row, "archival_reason")?)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChoreLog {
    pub header: EntityHeader,
    pub workspace_ref_id: RefId,
    pub retention_days: i64,
}

static CHORE_LOG_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("ChoreLog", Shape::Trunk)
        .parent_link("workspace")
        .field("retention_days", ColumnKind::Integer)
        .build()
        .expect("chore log schema")
});

impl ChoreLog {
    pub fn new(workspace: RefId, now: Timestamp) -> Self {
        Self {
            header: EntityHeader::new(now),
            workspace_ref_id: workspace,
            retention_days: 90,
        }
    }
}

impl Entity for ChoreLog {
    fn schema() -> &'static EntitySchema {
        &CHORE_LOG_SCHEMA
    }

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn encode_fields(&self, codecs: &CodecRegistry) -> ArborResult<Row> {
        let mut row = Row::new();
        row.insert(
            "workspace_ref_id".into(),
            codecs.encode(Realm::Database, &self.workspace_ref_id)?,
        );
        row.insert(
            "retention_days".into(),
            codecs.encode(Realm::Database, &self.retention_days)?,
        );
        Ok(row)
    }

    fn decode_fields(header: EntityHeader, row: &Row, codecs: &CodecRegistry) -> ArborResult<Self> {
        Ok(Self {
            header,
            workspace_ref_id: codecs
                .decode(Realm::Database, row_value(row, "workspace_ref_id")?)?,
            retention_days: codecs.decode(Realm::Database, row_value(row, "retention_days")?)?,
        })
    }
}

/// Minimal one-per-parent bookkeeping row hanging off the chore log.
#[derive(Clone, Debug, PartialEq)]
pub struct ChoreLogMarker {
    pub header: EntityHeader,
    pub chore_log_ref_id: RefId,
    pub position: i64,
}

static CHORE_LOG_MARKER_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("ChoreLogMarker", Shape::Stub)
        .parent_link("chore_log")
        .field("position", ColumnKind::Integer)
        .build()
        .expect("chore log marker schema")
});

impl ChoreLogMarker {
    pub fn new(chore_log: RefId, now: Timestamp) -> Self {
        Self {
            header: EntityHeader::new(now),
            chore_log_ref_id: chore_log,
            position: 0,
        }
    }
}

impl Entity for ChoreLogMarker {
    fn schema() -> &'static EntitySchema {
        &CHORE_LOG_MARKER_SCHEMA
    }

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn encode_fields(&self, codecs: &CodecRegistry) -> ArborResult<Row> {
        let mut row = Row::new();
        row.insert(
            "chore_log_ref_id".into(),
            codecs.encode(Realm::Database, &self.chore_log_ref_id)?,
        );
        row.insert(
            "position".into(),
            codecs.encode(Realm::Database, &self.position)?,
        );
        Ok(row)
    }

    fn decode_fields(header: EntityHeader, row: &Row, codecs: &CodecRegistry) -> ArborResult<Self> {
        Ok(Self {
            header,
            chore_log_ref_id: codecs
                .decode(Realm::Database, row_value(row, "chore_log_ref_id")?)?,
            position: codecs.decode(Realm::Database, row_value(row, "position")?)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChoreList {
    pub header: EntityHeader,
    pub chore_log_ref_id: RefId,
    pub name: String,
}

static CHORE_LIST_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("ChoreList", Shape::Branch)
        .parent_link("chore_log")
        .field("name", ColumnKind::EntityName)
        .build()
        .expect("chore list schema")
});

impl ChoreList {
    pub fn new(chore_log: RefId, name: &str, now: Timestamp) -> Self {
        Self {
            header: EntityHeader::new(now),
            chore_log_ref_id: chore_log,
            name: name.to_owned(),
        }
    }
}

impl Entity for ChoreList {
    fn schema() -> &'static EntitySchema {
        &CHORE_LIST_SCHEMA
    }

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn encode_fields(&self, codecs: &CodecRegistry) -> ArborResult<Row> {
        let mut row = Row::new();
        row.insert(
            "chore_log_ref_id".into(),
            codecs.encode(Realm::Database, &self.chore_log_ref_id)?,
        );
        row.insert("name".into(), codecs.encode(Realm::Database, &self.name)?);
        Ok(row)
    }

    fn decode_fields(header: EntityHeader, row: &Row, codecs: &CodecRegistry) -> ArborResult<Self> {
        Ok(Self {
            header,
            chore_log_ref_id: codecs
                .decode(Realm::Database, row_value(row, "chore_log_ref_id")?)?,
            name: codecs.decode(Realm::Database, row_value(row, "name")?)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Chore {
    pub header: EntityHeader,
    pub chore_list_ref_id: RefId,
    pub name: String,
    pub status: ChoreStatus,
    pub difficulty: Difficulty,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<ChoreNotes>,
    pub archival_reason: Option<ArchivalReason>,
}

static CHORE_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("Chore", Shape::Leaf)
        .parent_link("chore_list")
        .field("name", ColumnKind::EntityName)
        .field("status", ColumnKind::Text)
        .field("difficulty", ColumnKind::Integer)
        .nullable_field("due_date", ColumnKind::Date)
        .nullable_field("notes", ColumnKind::Json)
        .archival_reason()
        .build()
        .expect("chore schema")
});

impl Chore {
    pub fn new(chore_list: RefId, name: &str, now: Timestamp) -> Self {
        Self {
            header: EntityHeader::new(now),
            chore_list_ref_id: chore_list,
            name: name.to_owned(),
            status: ChoreStatus::Open,
            difficulty: Difficulty(1),
            due_date: None,
            notes: None,
            archival_reason: None,
        }
    }
}

impl Entity for Chore {
    fn schema() -> &'static EntitySchema {
        &CHORE_SCHEMA
    }

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn encode_fields(&self, codecs: &CodecRegistry) -> ArborResult<Row> {
        let mut row = Row::new();
        row.insert(
            "chore_list_ref_id".into(),
            codecs.encode(Realm::Database, &self.chore_list_ref_id)?,
        );
        row.insert("name".into(), codecs.encode(Realm::Database, &self.name)?);
        row.insert(
            "status".into(),
            codecs.encode(Realm::Database, &self.status)?,
        );
        row.insert(
            "difficulty".into(),
            codecs.encode(Realm::Database, &self.difficulty)?,
        );
        row.insert(
            "due_date".into(),
            codecs.encode_opt(Realm::Database, self.due_date.as_ref())?,
        );
        row.insert(
            "notes".into(),
            codecs.encode_opt(Realm::Database, self.notes.as_ref())?,
        );
        row.insert(
            "archival_reason".into(),
            codecs.encode_opt(Realm::Database, self.archival_reason.as_ref())?,
        );
        Ok(row)
    }

    fn decode_fields(header: EntityHeader, row: &Row, codecs: &CodecRegistry) -> ArborResult<Self> {
        Ok(Self {
            header,
            chore_list_ref_id: codecs
                .decode(Realm::Database, row_value(row, "chore_list_ref_id")?)?,
            name: codecs.decode(Realm::Database, row_value(row, "name")?)?,
            status: codecs.decode(Realm::Database, row_value(row, "status")?)?,
            difficulty: codecs.decode(Realm::Database, row_value(row, "difficulty")?)?,
            due_date: codecs.decode_opt(Realm::Database, row_value(row, "due_date")?)?,
            notes: codecs.decode_opt(Realm::Database, row_value(row, "notes")?)?,
            archival_reason: codecs
                .decode_opt(Realm::Database, row_value(row, "archival_reason")?)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricEntry {
    pub prefix: RefId,
    pub key: String,
    pub created_time: Timestamp,
    pub last_modified_time: Timestamp,
    pub value: f64,
    pub unit: Option<String>,
}

static METRIC_ENTRY_SCHEMA: LazyLock<RecordSchema> = LazyLock::new(|| {
    RecordSchema::builder("MetricEntry")
        .field("value", ColumnKind::Float)
        .nullable_field("unit", ColumnKind::Text)
        .build()
        .expect("metric entry schema")
});

impl MetricEntry {
    pub fn new(prefix: RefId, key: &str, value: f64, now: Timestamp) -> Self {
        Self {
            prefix,
            key: key.to_owned(),
            created_time: now,
            last_modified_time: now,
            value,
            unit: None,
        }
    }
}

impl Record for MetricEntry {
    fn schema() -> &'static RecordSchema {
        &METRIC_ENTRY_SCHEMA
    }

    fn encode(&self, codecs: &CodecRegistry) -> ArborResult<Row> {
        let mut row = Row::new();
        row.insert(
            "prefix".into(),
            codecs.encode(Realm::Database, &self.prefix)?,
        );
        row.insert("key".into(), codecs.encode(Realm::Database, &self.key)?);
        row.insert(
            "created_time".into(),
            codecs.encode(Realm::Database, &self.created_time)?,
        );
        row.insert(
            "last_modified_time".into(),
            codecs.encode(Realm::Database, &self.last_modified_time)?,
        );
        row.insert("value".into(), codecs.encode(Realm::Database, &self.value)?);
        row.insert(
            "unit".into(),
            codecs.encode_opt(Realm::Database, self.unit.as_ref())?,
        );
        Ok(row)
    }

    fn decode(row: &Row, codecs: &CodecRegistry) -> ArborResult<Self> {
        Ok(Self {
            prefix: codecs.decode(Realm::Database, row_value(row, "prefix")?)?,
            key: codecs.decode(Realm::Database, row_value(row, "key")?)?,
            created_time: codecs.decode(Realm::Database, row_value(row, "created_time")?)?,
            last_modified_time: codecs
                .decode(Realm::Database, row_value(row, "last_modified_time")?)?,
            value: codecs.decode(Realm::Database, row_value(row, "value")?)?,
            unit: codecs.decode_opt(Realm::Database, row_value(row, "unit")?)?,
        })
    }
}

/// Seed a workspace, its chore log, and one chore list; returns their ids.
pub async fn seed_tree(store: &Datastore) -> (RefId, RefId, RefId) {
    let conn = store.connection();
    let workspaces = RootRepository::new(conn, store.schemas(), store.codecs().clone())
        .await
        .expect("workspace repo");
    let workspace = workspaces
        .create(Workspace::new("Home", ts(2025, 1, 1, 9)), &[])
        .await
        .expect("create workspace");
    let logs = TrunkRepository::new(conn, store.schemas(), store.codecs().clone())
        .await
        .expect("chore log repo");
    let log = logs
        .create(
            ChoreLog::new(workspace.header.ref_id, ts(2025, 1, 1, 9)),
            &[],
        )
        .await
        .expect("create chore log");
    let lists = BranchRepository::new(conn, store.schemas(), store.codecs().clone())
        .await
        .expect("chore list repo");
    let list = lists
        .create(
            ChoreList::new(log.header.ref_id, "Weekly", ts(2025, 1, 1, 9)),
            &[],
        )
        .await
        .expect("create chore list");
    (
        workspace.header.ref_id,
        log.header.ref_id,
        list.header.ref_id,
    )
}
