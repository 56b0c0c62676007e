use serde::{Deserialize, Serialize};

use crate::{ArborError, ArborResult, ColumnKind};

pub const COL_REF_ID: &str = "ref_id";
pub const COL_VERSION: &str = "version";
pub const COL_ARCHIVED: &str = "archived";
pub const COL_CREATED_TIME: &str = "created_time";
pub const COL_LAST_MODIFIED_TIME: &str = "last_modified_time";
pub const COL_ARCHIVED_TIME: &str = "archived_time";
pub const COL_ARCHIVAL_REASON: &str = "archival_reason";
pub const COL_PREFIX: &str = "prefix";
pub const COL_KEY: &str = "key";

/// Header columns plus the transient `events` field: reserved, injected by
/// the synthesizer, and skipped if a domain declares them.
const RESERVED_FIELDS: &[&str] = &[
    COL_REF_ID,
    COL_VERSION,
    COL_ARCHIVED,
    COL_CREATED_TIME,
    COL_LAST_MODIFIED_TIME,
    COL_ARCHIVED_TIME,
    "events",
];

/// Entity shape: decides parenthood and cardinality rules.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Root,
    Trunk,
    Stub,
    Branch,
    Leaf,
}

impl Shape {
    pub fn requires_parent(self) -> bool {
        !matches!(self, Shape::Root)
    }

    /// Trunks and stubs admit at most one row per parent.
    pub fn single_per_parent(self) -> bool {
        matches!(self, Shape::Trunk | Shape::Stub)
    }

    /// Branches and leaves: the shapes that appear in listings.
    pub fn is_crown(self) -> bool {
        matches!(self, Shape::Branch | Shape::Leaf)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParentSpec {
    /// Declared field name, e.g. `chore_list`.
    pub field: String,
    /// Synthesized column name, `<field>_ref_id`.
    pub column: String,
    /// Table the foreign key points at: `<field>.ref_id`.
    pub parent_table: String,
}

/// Declared schema of one entity class. Built through [`EntitySchema::builder`];
/// the store synthesizes the actual table definition from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_name: String,
    pub table_name: String,
    pub event_table_name: String,
    pub shape: Shape,
    pub parent: Option<ParentSpec>,
    /// Declared (non-header) columns, the parent link included.
    pub columns: Vec<ColumnSpec>,
}

impl EntitySchema {
    pub fn builder(entity_name: impl Into<String>, shape: Shape) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            entity_name: entity_name.into(),
            table_name: None,
            shape,
            parent: None,
            extra_parents: false,
            columns: Vec::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_kind(name).is_some()
    }

    /// Kind and nullability of a column, header columns included.
    pub fn column_kind(&self, name: &str) -> Option<(ColumnKind, bool)> {
        match name {
            COL_REF_ID => Some((ColumnKind::EntityId, false)),
            COL_VERSION => Some((ColumnKind::Integer, false)),
            COL_ARCHIVED => Some((ColumnKind::Boolean, false)),
            COL_CREATED_TIME | COL_LAST_MODIFIED_TIME => Some((ColumnKind::DateTime, false)),
            COL_ARCHIVED_TIME => Some((ColumnKind::DateTime, true)),
            _ => self
                .columns
                .iter()
                .find(|column| column.name == name)
                .map(|column| (column.kind, column.nullable)),
        }
    }

    /// Every column of the synthesized table in declaration order, header
    /// first.
    pub fn all_columns(&self) -> Vec<(String, ColumnKind, bool)> {
        let mut all = vec![
            (COL_REF_ID.to_owned(), ColumnKind::EntityId, false),
            (COL_VERSION.to_owned(), ColumnKind::Integer, false),
            (COL_ARCHIVED.to_owned(), ColumnKind::Boolean, false),
            (COL_CREATED_TIME.to_owned(), ColumnKind::DateTime, false),
            (COL_LAST_MODIFIED_TIME.to_owned(), ColumnKind::DateTime, false),
            (COL_ARCHIVED_TIME.to_owned(), ColumnKind::DateTime, true),
        ];
        for column in &self.columns {
            all.push((column.name.clone(), column.kind, column.nullable));
        }
        all
    }

    pub fn has_archival_reason(&self) -> bool {
        self.columns
            .iter()
            .any(|column| column.name == COL_ARCHIVAL_REASON)
    }

    pub fn has_name(&self) -> bool {
        self.columns.iter().any(|column| column.name == "name")
    }
}

pub struct EntitySchemaBuilder {
    entity_name: String,
    table_name: Option<String>,
    shape: Shape,
    parent: Option<String>,
    extra_parents: bool,
    columns: Vec<ColumnSpec>,
}

impl EntitySchemaBuilder {
    /// Override the default `snake_case(entity_name)` table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Declare the link to the owning parent. The column becomes
    /// `<field>_ref_id` with a foreign key to `<field>.ref_id`.
    pub fn parent_link(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if self.parent.is_some() {
            self.extra_parents = true;
        } else {
            self.parent = Some(field);
        }
        self
    }

    pub fn field(self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.push_column(name.into(), kind, false, false)
    }

    pub fn nullable_field(self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.push_column(name.into(), kind, true, false)
    }

    pub fn unique_field(self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.push_column(name.into(), kind, false, true)
    }

    /// Declare the optional `archival_reason` column; it participates in
    /// archive-scope filtering.
    pub fn archival_reason(self) -> Self {
        self.push_column(COL_ARCHIVAL_REASON.to_owned(), ColumnKind::Text, true, false)
    }

    fn push_column(mut self, name: String, kind: ColumnKind, nullable: bool, unique: bool) -> Self {
        // Header fields came from the header step or are transient.
        if RESERVED_FIELDS.contains(&name.as_str()) {
            return self;
        }
        self.columns.push(ColumnSpec {
            name,
            kind,
            nullable,
            unique,
        });
        self
    }

    pub fn build(self) -> ArborResult<EntitySchema> {
        if self.extra_parents {
            return Err(ArborError::invalid(format!(
                "entity `{}` declares more than one parent link",
                self.entity_name
            )));
        }
        if self.shape.requires_parent() && self.parent.is_none() {
            return Err(ArborError::invalid(format!(
                "entity `{}` is a {:?} and requires a parent link",
                self.entity_name, self.shape
            )));
        }
        if !self.shape.requires_parent() && self.parent.is_some() {
            return Err(ArborError::invalid(format!(
                "entity `{}` is a root and cannot declare a parent link",
                self.entity_name
            )));
        }
        let mut columns = self.columns;
        for column in &columns {
            if column.kind == ColumnKind::ParentLink {
                return Err(ArborError::invalid(format!(
                    "column `{}` on `{}`: declare parent links through `parent_link`",
                    column.name, self.entity_name
                )));
            }
        }
        let parent = self.parent.map(|field| ParentSpec {
            column: format!("{field}_ref_id"),
            parent_table: field.clone(),
            field,
        });
        if let Some(parent) = &parent {
            columns.insert(
                0,
                ColumnSpec {
                    name: parent.column.clone(),
                    kind: ColumnKind::ParentLink,
                    nullable: false,
                    unique: self.shape.single_per_parent(),
                },
            );
        }
        let mut seen = Vec::new();
        for column in &columns {
            if seen.contains(&column.name.as_str()) {
                return Err(ArborError::invalid(format!(
                    "entity `{}` declares column `{}` twice",
                    self.entity_name, column.name
                )));
            }
            seen.push(column.name.as_str());
        }
        let table_name = self
            .table_name
            .unwrap_or_else(|| snake_case(&self.entity_name));
        let event_table_name = format!("{table_name}_event");
        Ok(EntitySchema {
            entity_name: self.entity_name,
            table_name,
            event_table_name,
            shape: self.shape,
            parent,
            columns,
        })
    }
}

/// Declared schema of a record: a tuple identified by the natural key
/// `(prefix, key)` with no auto-assigned identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordSchema {
    pub record_name: String,
    pub table_name: String,
    pub key_kind: ColumnKind,
    /// Declared value columns.
    pub columns: Vec<ColumnSpec>,
}

impl RecordSchema {
    pub fn builder(record_name: impl Into<String>) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            record_name: record_name.into(),
            table_name: None,
            key_kind: ColumnKind::Text,
            columns: Vec::new(),
        }
    }

    pub fn column_kind(&self, name: &str) -> Option<(ColumnKind, bool)> {
        match name {
            COL_PREFIX => Some((ColumnKind::EntityId, false)),
            COL_KEY => Some((self.key_kind, false)),
            COL_CREATED_TIME | COL_LAST_MODIFIED_TIME => Some((ColumnKind::DateTime, false)),
            _ => self
                .columns
                .iter()
                .find(|column| column.name == name)
                .map(|column| (column.kind, column.nullable)),
        }
    }

    pub fn all_columns(&self) -> Vec<(String, ColumnKind, bool)> {
        let mut all = vec![
            (COL_PREFIX.to_owned(), ColumnKind::EntityId, false),
            (COL_KEY.to_owned(), self.key_kind, false),
            (COL_CREATED_TIME.to_owned(), ColumnKind::DateTime, false),
            (COL_LAST_MODIFIED_TIME.to_owned(), ColumnKind::DateTime, false),
        ];
        for column in &self.columns {
            all.push((column.name.clone(), column.kind, column.nullable));
        }
        all
    }
}

pub struct RecordSchemaBuilder {
    record_name: String,
    table_name: Option<String>,
    key_kind: ColumnKind,
    columns: Vec<ColumnSpec>,
}

impl RecordSchemaBuilder {
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn key_kind(mut self, kind: ColumnKind) -> Self {
        self.key_kind = kind;
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            kind,
            nullable: false,
            unique: false,
        });
        self
    }

    pub fn nullable_field(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            kind,
            nullable: true,
            unique: false,
        });
        self
    }

    pub fn build(self) -> ArborResult<RecordSchema> {
        let reserved = [COL_PREFIX, COL_KEY, COL_CREATED_TIME, COL_LAST_MODIFIED_TIME];
        let mut seen = Vec::new();
        for column in &self.columns {
            if reserved.contains(&column.name.as_str()) {
                return Err(ArborError::invalid(format!(
                    "record `{}` re-declares reserved column `{}`",
                    self.record_name, column.name
                )));
            }
            if seen.contains(&column.name.as_str()) {
                return Err(ArborError::invalid(format!(
                    "record `{}` declares column `{}` twice",
                    self.record_name, column.name
                )));
            }
            seen.push(column.name.as_str());
        }
        let table_name = self
            .table_name
            .unwrap_or_else(|| snake_case(&self.record_name));
        Ok(RecordSchema {
            record_name: self.record_name,
            table_name,
            key_kind: self.key_kind,
            columns: self.columns,
        })
    }
}

pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_lowercase();
            let next_lower = i + 1 < chars.len() && chars[i + 1].is_lowercase();
            if i > 0 && (prev_lower || next_lower) {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(*ch);
        }
    }
    out
}
