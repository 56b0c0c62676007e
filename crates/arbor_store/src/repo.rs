use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use sea_orm::sea_query::{Condition, Expr, ExprTrait, Order, Query, SelectStatement, SimpleExpr};
use sea_orm::{ConnectionTrait, QueryResult};
use tracing::debug;

use arbor_core::{
    ArborError, ArborResult, ArchiveScope, COL_ARCHIVAL_REASON, COL_KEY, COL_PREFIX, COL_REF_ID,
    CodecRegistry, Entity, EntityEvent, FieldValue, FilterSpec, Record, RefId, Row, Shape,
    header_from_row, header_to_row,
};

use crate::db::{col, exec, query_all, query_one, read_field_value, value_to_sea};
use crate::filter::{archive_condition, compile_filters, ensure_scope_supported};
use crate::journal::{self, JournaledEvent};
use crate::schema::{RecordTableSpec, SchemaRegistry, TableSpec};

type ErrorCtor = Arc<dyn Fn(String) -> ArborError + Send + Sync>;

/// Domain-specific error constructors, passed at repository construction.
/// The defaults yield the plain not-found / already-exists forms; a concrete
/// repository can wrap them in domain-flavored messages while preserving the
/// taxonomy.
#[derive(Clone)]
pub struct ErrorHooks {
    not_found: ErrorCtor,
    already_exists: ErrorCtor,
}

impl ErrorHooks {
    pub fn new(
        not_found: impl Fn(String) -> ArborError + Send + Sync + 'static,
        already_exists: impl Fn(String) -> ArborError + Send + Sync + 'static,
    ) -> Self {
        Self {
            not_found: Arc::new(not_found),
            already_exists: Arc::new(already_exists),
        }
    }

    fn not_found(&self, message: impl Into<String>) -> ArborError {
        (self.not_found)(message.into())
    }

    fn already_exists(&self, message: impl Into<String>) -> ArborError {
        (self.already_exists)(message.into())
    }
}

impl Default for ErrorHooks {
    fn default() -> Self {
        Self::new(ArborError::not_found, ArborError::already_exists)
    }
}

/// The generic persistence engine behind every shape repository. Holds the
/// caller's connection handle for the duration of one unit of work; it never
/// commits and never retries.
pub struct EntityRepository<'a, C, E> {
    conn: &'a C,
    spec: Arc<TableSpec>,
    codecs: Arc<CodecRegistry>,
    hooks: ErrorHooks,
    _entity: PhantomData<E>,
}

impl<'a, C: ConnectionTrait, E: Entity> EntityRepository<'a, C, E> {
    async fn open(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
        expected: Shape,
        hooks: ErrorHooks,
    ) -> ArborResult<Self> {
        let schema = E::schema();
        if schema.shape != expected {
            return Err(ArborError::invalid(format!(
                "entity `{}` is declared as {:?}, not {:?}",
                schema.entity_name, schema.shape, expected
            )));
        }
        let spec = schemas.register_entity(schema)?;
        schemas.ensure_entity_tables(conn, &spec).await?;
        Ok(Self {
            conn,
            spec,
            codecs,
            hooks,
            _entity: PhantomData,
        })
    }

    fn schema(&self) -> &arbor_core::EntitySchema {
        &self.spec.schema
    }

    fn encode_entity(&self, entity: &E) -> ArborResult<Row> {
        let schema = self.schema();
        let mut row = entity.encode_fields(&self.codecs)?;
        row.extend(header_to_row(entity.header())?);
        for (name, value) in &row {
            if name == COL_REF_ID {
                continue;
            }
            let (kind, nullable) = schema.column_kind(name).ok_or_else(|| {
                ArborError::invalid(format!(
                    "entity `{}` encoded unknown column `{name}`",
                    schema.entity_name
                ))
            })?;
            if !kind.accepts(value) {
                return Err(ArborError::invalid(format!(
                    "column `{name}` on `{}`: value {value:?} does not match {kind:?}",
                    schema.entity_name
                )));
            }
            if value.is_null() && !nullable {
                return Err(ArborError::invalid(format!(
                    "column `{name}` on `{}` is not nullable",
                    schema.entity_name
                )));
            }
        }
        for column in &schema.columns {
            if !row.contains_key(&column.name) {
                if column.nullable {
                    row.insert(column.name.clone(), FieldValue::Null);
                } else {
                    return Err(ArborError::invalid(format!(
                        "encoded row for `{}` is missing column `{}`",
                        schema.entity_name, column.name
                    )));
                }
            }
        }
        Ok(row)
    }

    fn name_hint(&self, row: &Row) -> Option<String> {
        if !self.schema().has_name() {
            return None;
        }
        row.get("name")
            .and_then(FieldValue::as_str)
            .map(str::to_owned)
    }

    /// Translate backend integrity violations into the already-exists form
    /// at the repository boundary; everything else passes through untouched.
    fn map_write_err(&self, err: ArborError, name_hint: Option<&str>) -> ArborError {
        let ArborError::Storage { message } = &err else {
            return err;
        };
        let lowered = message.to_lowercase();
        if lowered.contains("unique")
            || lowered.contains("duplicate")
            || lowered.contains("foreign key")
        {
            let schema = self.schema();
            let message = match name_hint {
                Some(name) => format!("{} named \"{name}\"", schema.entity_name),
                None => schema.entity_name.clone(),
            };
            self.hooks.already_exists(message)
        } else {
            err
        }
    }

    async fn insert_row(&self, row: &Row, name_hint: Option<&str>) -> ArborResult<RefId> {
        let schema = self.schema();
        let mut columns = Vec::with_capacity(row.len());
        let mut values: Vec<SimpleExpr> = Vec::with_capacity(row.len());
        for (name, value) in row {
            if name == COL_REF_ID {
                continue;
            }
            let (kind, _) = schema.column_kind(name).ok_or_else(|| {
                ArborError::invalid(format!("unknown column `{name}`"))
            })?;
            columns.push(col(name));
            values.push(value_to_sea(kind, value)?.into());
        }
        let insert = Query::insert()
            .into_table(col(&schema.table_name))
            .columns(columns)
            .values_panic(values)
            .to_owned();
        let result = exec(self.conn, &insert)
            .await
            .map_err(|err| self.map_write_err(err, name_hint))?;
        let assigned = i64::try_from(result.last_insert_id())
            .map_err(|_| ArborError::storage("inserted primary key exceeds i64"))?;
        Ok(RefId::new(assigned))
    }

    pub(crate) async fn create(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        assert!(
            entity.header().ref_id.is_unset(),
            "create requires an unset ref_id"
        );
        let mut entity = entity;
        let row = self.encode_entity(&entity)?;
        let name_hint = self.name_hint(&row);
        let ref_id = self.insert_row(&row, name_hint.as_deref()).await?;
        entity.header_mut().ref_id = ref_id;
        journal::append_events(self.conn, &self.spec, ref_id, entity.header().version, events)
            .await?;
        debug!(
            table = %self.schema().table_name,
            ref_id = ref_id.as_i64(),
            "created entity"
        );
        Ok(entity)
    }

    pub(crate) async fn save(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        let ref_id = entity.header().ref_id;
        assert!(!ref_id.is_unset(), "save requires a persisted ref_id");
        let schema = self.schema();
        let row = self.encode_entity(&entity)?;
        let name_hint = self.name_hint(&row);
        let mut values = Vec::with_capacity(row.len());
        for (name, value) in &row {
            if name == COL_REF_ID {
                continue;
            }
            let (kind, _) = schema.column_kind(name).ok_or_else(|| {
                ArborError::invalid(format!("unknown column `{name}`"))
            })?;
            values.push((col(name), value_to_sea(kind, value)?.into()));
        }
        let update = Query::update()
            .table(col(&schema.table_name))
            .values(values)
            .and_where(Expr::col(col(COL_REF_ID)).eq(ref_id.as_i64()))
            .to_owned();
        let result = exec(self.conn, &update)
            .await
            .map_err(|err| self.map_write_err(err, name_hint.as_deref()))?;
        if result.rows_affected() == 0 {
            return Err(self
                .hooks
                .not_found(format!("{} {ref_id}", schema.entity_name)));
        }
        journal::append_events(self.conn, &self.spec, ref_id, entity.header().version, events)
            .await?;
        debug!(
            table = %schema.table_name,
            ref_id = ref_id.as_i64(),
            "saved entity"
        );
        Ok(entity)
    }

    pub(crate) async fn remove(&self, ref_id: RefId) -> ArborResult<E> {
        let schema = self.schema();
        let row = self.fetch_by_id(ref_id).await?.ok_or_else(|| {
            self.hooks
                .not_found(format!("{} {ref_id}", schema.entity_name))
        })?;
        let entity = self.decode_row(&row)?;
        journal::purge_events(self.conn, &self.spec, ref_id).await?;
        let delete = Query::delete()
            .from_table(col(&schema.table_name))
            .and_where(Expr::col(col(COL_REF_ID)).eq(ref_id.as_i64()))
            .to_owned();
        exec(self.conn, &delete).await?;
        debug!(
            table = %schema.table_name,
            ref_id = ref_id.as_i64(),
            "removed entity"
        );
        Ok(entity)
    }

    fn base_select(&self) -> SelectStatement {
        let mut select = Query::select();
        select.from(col(&self.schema().table_name));
        for (name, _, _) in self.schema().all_columns() {
            select.column(col(&name));
        }
        select
    }

    async fn fetch_by_id(&self, ref_id: RefId) -> ArborResult<Option<QueryResult>> {
        let select = self
            .base_select()
            .and_where(Expr::col(col(COL_REF_ID)).eq(ref_id.as_i64()))
            .limit(1)
            .to_owned();
        query_one(self.conn, &select).await
    }

    fn read_row(&self, row: &QueryResult) -> ArborResult<Row> {
        let mut data = Row::new();
        for (name, kind, nullable) in self.schema().all_columns() {
            let value = read_field_value(row, &name, kind, nullable)?;
            data.insert(name, value);
        }
        Ok(data)
    }

    fn decode_row(&self, row: &QueryResult) -> ArborResult<E> {
        let data = self.read_row(row)?;
        let header = header_from_row(&data)?;
        E::decode_fields(header, &data, &self.codecs)
    }

    pub(crate) async fn load_by_id(&self, ref_id: RefId, scope: &ArchiveScope) -> ArborResult<E> {
        let schema = self.schema();
        ensure_scope_supported(schema, scope)?;
        let row = self.fetch_by_id(ref_id).await?.ok_or_else(|| {
            self.hooks
                .not_found(format!("{} {ref_id}", schema.entity_name))
        })?;
        let data = self.read_row(&row)?;
        let header = header_from_row(&data)?;
        let reason = data.get(COL_ARCHIVAL_REASON).and_then(FieldValue::as_str);
        if !scope.admits(header.archived, reason) {
            return Err(self
                .hooks
                .not_found(format!("{} {ref_id} is archived", schema.entity_name)));
        }
        E::decode_fields(header, &data, &self.codecs)
    }

    pub(crate) async fn load_optional(&self, ref_id: RefId) -> ArborResult<Option<E>> {
        match self.fetch_by_id(ref_id).await? {
            Some(row) => Ok(Some(self.decode_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_where(
        &self,
        parent: Option<RefId>,
        scope: &ArchiveScope,
        filter_ref_ids: Option<&[RefId]>,
        extra: Option<Condition>,
    ) -> ArborResult<Vec<E>> {
        let schema = self.schema();
        let mut condition = Condition::all();
        if let Some(archive) = archive_condition(schema, scope)? {
            condition = condition.add(archive);
        }
        if let Some(parent_id) = parent {
            let parent_spec = schema.parent.as_ref().ok_or_else(|| {
                ArborError::invalid(format!(
                    "entity `{}` has no parent link",
                    schema.entity_name
                ))
            })?;
            condition = condition
                .add(Expr::col(col(&parent_spec.column)).eq(parent_id.as_i64()));
        }
        if let Some(ids) = filter_ref_ids {
            condition = condition.add(
                Expr::col(col(COL_REF_ID)).is_in(ids.iter().map(|ref_id| ref_id.as_i64())),
            );
        }
        if let Some(extra) = extra {
            condition = condition.add(extra);
        }
        let select = self
            .base_select()
            .cond_where(condition)
            .order_by(col(COL_REF_ID), Order::Asc)
            .to_owned();
        let rows = query_all(self.conn, &select).await?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            entities.push(self.decode_row(row)?);
        }
        Ok(entities)
    }

    pub(crate) async fn find_all(
        &self,
        parent: Option<RefId>,
        scope: &ArchiveScope,
        filter_ref_ids: Option<&[RefId]>,
    ) -> ArborResult<Vec<E>> {
        self.find_where(parent, scope, filter_ref_ids, None).await
    }

    pub(crate) async fn find_all_generic(
        &self,
        parent: Option<RefId>,
        scope: &ArchiveScope,
        filters: &BTreeMap<String, FilterSpec>,
    ) -> ArborResult<Vec<E>> {
        let condition = compile_filters(self.schema(), filters)?;
        self.find_where(parent, scope, None, Some(condition)).await
    }

    pub(crate) async fn load_by_parent(&self, parent_id: RefId) -> ArborResult<E> {
        let schema = self.schema();
        let parent_spec = schema.parent.as_ref().ok_or_else(|| {
            ArborError::invalid(format!(
                "entity `{}` has no parent link",
                schema.entity_name
            ))
        })?;
        let select = self
            .base_select()
            .and_where(Expr::col(col(&parent_spec.column)).eq(parent_id.as_i64()))
            .limit(1)
            .to_owned();
        let row = query_one(self.conn, &select).await?.ok_or_else(|| {
            self.hooks.not_found(format!(
                "{} for parent {parent_id}",
                schema.entity_name
            ))
        })?;
        self.decode_row(&row)
    }

    pub(crate) async fn remove_by_parent(&self, parent_id: RefId) -> ArborResult<E> {
        let entity = self.load_by_parent(parent_id).await?;
        self.remove(entity.header().ref_id).await
    }

    pub(crate) async fn load_history(&self, ref_id: RefId) -> ArborResult<Vec<JournaledEvent>> {
        journal::load_history(self.conn, &self.spec, ref_id).await
    }

    pub(crate) async fn count_events(&self, ref_id: RefId) -> ArborResult<u64> {
        journal::count_events(self.conn, &self.spec, ref_id).await
    }
}

/// Repository for root entities: no parent, looked up by id.
pub struct RootRepository<'a, C, E> {
    inner: EntityRepository<'a, C, E>,
}

impl<'a, C: ConnectionTrait, E: Entity> RootRepository<'a, C, E> {
    pub async fn new(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
    ) -> ArborResult<Self> {
        Self::with_hooks(conn, schemas, codecs, ErrorHooks::default()).await
    }

    pub async fn with_hooks(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
        hooks: ErrorHooks,
    ) -> ArborResult<Self> {
        Ok(Self {
            inner: EntityRepository::open(conn, schemas, codecs, Shape::Root, hooks).await?,
        })
    }

    pub async fn create(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.create(entity, events).await
    }

    pub async fn save(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.save(entity, events).await
    }

    pub async fn remove(&self, ref_id: RefId) -> ArborResult<E> {
        self.inner.remove(ref_id).await
    }

    pub async fn load_by_id(&self, ref_id: RefId, scope: &ArchiveScope) -> ArborResult<E> {
        self.inner.load_by_id(ref_id, scope).await
    }

    pub async fn load_optional(&self, ref_id: RefId) -> ArborResult<Option<E>> {
        self.inner.load_optional(ref_id).await
    }

    pub async fn find_all(
        &self,
        scope: &ArchiveScope,
        filter_ref_ids: Option<&[RefId]>,
    ) -> ArborResult<Vec<E>> {
        self.inner.find_all(None, scope, filter_ref_ids).await
    }

    pub async fn load_history(&self, ref_id: RefId) -> ArborResult<Vec<JournaledEvent>> {
        self.inner.load_history(ref_id).await
    }

    pub async fn count_events(&self, ref_id: RefId) -> ArborResult<u64> {
        self.inner.count_events(ref_id).await
    }
}

/// Repository for trunk entities: exactly one row per parent.
pub struct TrunkRepository<'a, C, E> {
    inner: EntityRepository<'a, C, E>,
}

impl<'a, C: ConnectionTrait, E: Entity> TrunkRepository<'a, C, E> {
    pub async fn new(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
    ) -> ArborResult<Self> {
        Self::with_hooks(conn, schemas, codecs, ErrorHooks::default()).await
    }

    pub async fn with_hooks(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
        hooks: ErrorHooks,
    ) -> ArborResult<Self> {
        Ok(Self {
            inner: EntityRepository::open(conn, schemas, codecs, Shape::Trunk, hooks).await?,
        })
    }

    pub async fn create(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.create(entity, events).await
    }

    pub async fn save(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.save(entity, events).await
    }

    pub async fn remove(&self, ref_id: RefId) -> ArborResult<E> {
        self.inner.remove(ref_id).await
    }

    pub async fn load_by_id(&self, ref_id: RefId, scope: &ArchiveScope) -> ArborResult<E> {
        self.inner.load_by_id(ref_id, scope).await
    }

    pub async fn load_by_parent(&self, parent_id: RefId) -> ArborResult<E> {
        self.inner.load_by_parent(parent_id).await
    }

    pub async fn remove_by_parent(&self, parent_id: RefId) -> ArborResult<E> {
        self.inner.remove_by_parent(parent_id).await
    }

    pub async fn load_history(&self, ref_id: RefId) -> ArborResult<Vec<JournaledEvent>> {
        self.inner.load_history(ref_id).await
    }
}

/// Repository for stub entities: one minimal row per parent, addressed only
/// through the parent.
pub struct StubRepository<'a, C, E> {
    inner: EntityRepository<'a, C, E>,
}

impl<'a, C: ConnectionTrait, E: Entity> StubRepository<'a, C, E> {
    pub async fn new(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
    ) -> ArborResult<Self> {
        Self::with_hooks(conn, schemas, codecs, ErrorHooks::default()).await
    }

    pub async fn with_hooks(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
        hooks: ErrorHooks,
    ) -> ArborResult<Self> {
        Ok(Self {
            inner: EntityRepository::open(conn, schemas, codecs, Shape::Stub, hooks).await?,
        })
    }

    pub async fn create(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.create(entity, events).await
    }

    pub async fn save(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.save(entity, events).await
    }

    pub async fn remove(&self, ref_id: RefId) -> ArborResult<E> {
        self.inner.remove(ref_id).await
    }

    pub async fn load_by_parent(&self, parent_id: RefId) -> ArborResult<E> {
        self.inner.load_by_parent(parent_id).await
    }

    pub async fn remove_by_parent(&self, parent_id: RefId) -> ArborResult<E> {
        self.inner.remove_by_parent(parent_id).await
    }
}

/// Repository for branch entities: many per trunk, listed under the parent.
pub struct BranchRepository<'a, C, E> {
    inner: EntityRepository<'a, C, E>,
}

impl<'a, C: ConnectionTrait, E: Entity> BranchRepository<'a, C, E> {
    pub async fn new(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
    ) -> ArborResult<Self> {
        Self::with_hooks(conn, schemas, codecs, ErrorHooks::default()).await
    }

    pub async fn with_hooks(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
        hooks: ErrorHooks,
    ) -> ArborResult<Self> {
        Ok(Self {
            inner: EntityRepository::open(conn, schemas, codecs, Shape::Branch, hooks).await?,
        })
    }

    pub async fn create(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.create(entity, events).await
    }

    pub async fn save(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.save(entity, events).await
    }

    pub async fn remove(&self, ref_id: RefId) -> ArborResult<E> {
        self.inner.remove(ref_id).await
    }

    pub async fn load_by_id(&self, ref_id: RefId, scope: &ArchiveScope) -> ArborResult<E> {
        self.inner.load_by_id(ref_id, scope).await
    }

    pub async fn find_all(
        &self,
        parent_id: RefId,
        scope: &ArchiveScope,
        filter_ref_ids: Option<&[RefId]>,
    ) -> ArborResult<Vec<E>> {
        self.inner
            .find_all(Some(parent_id), scope, filter_ref_ids)
            .await
    }

    pub async fn find_all_generic(
        &self,
        parent_id: Option<RefId>,
        scope: &ArchiveScope,
        filters: &BTreeMap<String, FilterSpec>,
    ) -> ArborResult<Vec<E>> {
        self.inner.find_all_generic(parent_id, scope, filters).await
    }

    pub async fn load_history(&self, ref_id: RefId) -> ArborResult<Vec<JournaledEvent>> {
        self.inner.load_history(ref_id).await
    }

    pub async fn count_events(&self, ref_id: RefId) -> ArborResult<u64> {
        self.inner.count_events(ref_id).await
    }
}

/// Repository for leaf entities: many per trunk or branch.
pub struct LeafRepository<'a, C, E> {
    inner: EntityRepository<'a, C, E>,
}

impl<'a, C: ConnectionTrait, E: Entity> LeafRepository<'a, C, E> {
    pub async fn new(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
    ) -> ArborResult<Self> {
        Self::with_hooks(conn, schemas, codecs, ErrorHooks::default()).await
    }

    pub async fn with_hooks(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
        hooks: ErrorHooks,
    ) -> ArborResult<Self> {
        Ok(Self {
            inner: EntityRepository::open(conn, schemas, codecs, Shape::Leaf, hooks).await?,
        })
    }

    pub async fn create(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.create(entity, events).await
    }

    pub async fn save(&self, entity: E, events: &[EntityEvent]) -> ArborResult<E> {
        self.inner.save(entity, events).await
    }

    pub async fn remove(&self, ref_id: RefId) -> ArborResult<E> {
        self.inner.remove(ref_id).await
    }

    pub async fn load_by_id(&self, ref_id: RefId, scope: &ArchiveScope) -> ArborResult<E> {
        self.inner.load_by_id(ref_id, scope).await
    }

    pub async fn find_all(
        &self,
        parent_id: RefId,
        scope: &ArchiveScope,
        filter_ref_ids: Option<&[RefId]>,
    ) -> ArborResult<Vec<E>> {
        self.inner
            .find_all(Some(parent_id), scope, filter_ref_ids)
            .await
    }

    pub async fn find_all_generic(
        &self,
        parent_id: Option<RefId>,
        scope: &ArchiveScope,
        filters: &BTreeMap<String, FilterSpec>,
    ) -> ArborResult<Vec<E>> {
        self.inner.find_all_generic(parent_id, scope, filters).await
    }

    pub async fn load_history(&self, ref_id: RefId) -> ArborResult<Vec<JournaledEvent>> {
        self.inner.load_history(ref_id).await
    }

    pub async fn count_events(&self, ref_id: RefId) -> ArborResult<u64> {
        self.inner.count_events(ref_id).await
    }
}

/// Repository for record tuples addressed by the natural key
/// `(prefix, key)`.
pub struct RecordRepository<'a, C, R> {
    conn: &'a C,
    spec: Arc<RecordTableSpec>,
    codecs: Arc<CodecRegistry>,
    hooks: ErrorHooks,
    _record: PhantomData<R>,
}

impl<'a, C: ConnectionTrait, R: Record> RecordRepository<'a, C, R> {
    pub async fn new(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
    ) -> ArborResult<Self> {
        Self::with_hooks(conn, schemas, codecs, ErrorHooks::default()).await
    }

    pub async fn with_hooks(
        conn: &'a C,
        schemas: &SchemaRegistry,
        codecs: Arc<CodecRegistry>,
        hooks: ErrorHooks,
    ) -> ArborResult<Self> {
        let spec = schemas.register_record(R::schema())?;
        schemas.ensure_record_table(conn, &spec).await?;
        Ok(Self {
            conn,
            spec,
            codecs,
            hooks,
            _record: PhantomData,
        })
    }

    fn schema(&self) -> &arbor_core::RecordSchema {
        &self.spec.schema
    }

    fn encode_record(&self, record: &R) -> ArborResult<Row> {
        let schema = self.schema();
        let mut row = record.encode(&self.codecs)?;
        for (name, value) in &row {
            let (kind, nullable) = schema.column_kind(name).ok_or_else(|| {
                ArborError::invalid(format!(
                    "record `{}` encoded unknown column `{name}`",
                    schema.record_name
                ))
            })?;
            if !kind.accepts(value) {
                return Err(ArborError::invalid(format!(
                    "column `{name}` on `{}`: value {value:?} does not match {kind:?}",
                    schema.record_name
                )));
            }
            if value.is_null() && !nullable {
                return Err(ArborError::invalid(format!(
                    "column `{name}` on `{}` is not nullable",
                    schema.record_name
                )));
            }
        }
        for (name, _, nullable) in schema.all_columns() {
            if !row.contains_key(&name) {
                if nullable {
                    row.insert(name, FieldValue::Null);
                } else {
                    return Err(ArborError::invalid(format!(
                        "encoded row for `{}` is missing column `{name}`",
                        schema.record_name
                    )));
                }
            }
        }
        Ok(row)
    }

    fn key_binding(&self, key: &FieldValue) -> ArborResult<sea_orm::sea_query::Value> {
        let kind = self.schema().key_kind;
        if key.is_null() || !kind.accepts(key) {
            return Err(ArborError::invalid(format!(
                "record `{}` key {key:?} does not match {kind:?}",
                self.schema().record_name
            )));
        }
        value_to_sea(kind, key)
    }

    fn key_hint(row: &Row) -> String {
        match row.get(COL_KEY) {
            Some(FieldValue::Str(value)) => value.clone(),
            Some(FieldValue::I64(value)) => value.to_string(),
            Some(FieldValue::Ref(value)) => value.to_string(),
            Some(FieldValue::Date(value)) => value.to_string(),
            Some(other) => format!("{other:?}"),
            None => String::new(),
        }
    }

    fn map_write_err(&self, err: ArborError, key_hint: &str) -> ArborError {
        let ArborError::Storage { message } = &err else {
            return err;
        };
        let lowered = message.to_lowercase();
        if lowered.contains("unique")
            || lowered.contains("duplicate")
            || lowered.contains("foreign key")
        {
            self.hooks.already_exists(format!(
                "{} keyed \"{key_hint}\"",
                self.schema().record_name
            ))
        } else {
            err
        }
    }

    pub async fn create(&self, record: R) -> ArborResult<R> {
        let schema = self.schema();
        let row = self.encode_record(&record)?;
        let key_hint = Self::key_hint(&row);
        let mut columns = Vec::with_capacity(row.len());
        let mut values: Vec<SimpleExpr> = Vec::with_capacity(row.len());
        for (name, value) in &row {
            let (kind, _) = schema.column_kind(name).ok_or_else(|| {
                ArborError::invalid(format!("unknown column `{name}`"))
            })?;
            columns.push(col(name));
            values.push(value_to_sea(kind, value)?.into());
        }
        let insert = Query::insert()
            .into_table(col(&schema.table_name))
            .columns(columns)
            .values_panic(values)
            .to_owned();
        exec(self.conn, &insert)
            .await
            .map_err(|err| self.map_write_err(err, &key_hint))?;
        debug!(table = %schema.table_name, key = %key_hint, "created record");
        Ok(record)
    }

    pub async fn save(&self, record: R) -> ArborResult<R> {
        let schema = self.schema();
        let row = self.encode_record(&record)?;
        let key_hint = Self::key_hint(&row);
        let prefix = row
            .get(COL_PREFIX)
            .and_then(FieldValue::as_ref_id)
            .ok_or_else(|| ArborError::invalid("encoded record is missing its prefix"))?;
        let key = row
            .get(COL_KEY)
            .cloned()
            .ok_or_else(|| ArborError::invalid("encoded record is missing its key"))?;
        let mut values = Vec::with_capacity(row.len());
        for (name, value) in &row {
            if name == COL_PREFIX || name == COL_KEY {
                continue;
            }
            let (kind, _) = schema.column_kind(name).ok_or_else(|| {
                ArborError::invalid(format!("unknown column `{name}`"))
            })?;
            values.push((col(name), value_to_sea(kind, value)?.into()));
        }
        let update = Query::update()
            .table(col(&schema.table_name))
            .values(values)
            .and_where(Expr::col(col(COL_PREFIX)).eq(prefix.as_i64()))
            .and_where(Expr::col(col(COL_KEY)).eq(self.key_binding(&key)?))
            .to_owned();
        let result = exec(self.conn, &update)
            .await
            .map_err(|err| self.map_write_err(err, &key_hint))?;
        if result.rows_affected() == 0 {
            return Err(self.hooks.not_found(format!(
                "{} keyed \"{key_hint}\"",
                schema.record_name
            )));
        }
        Ok(record)
    }

    fn base_select(&self) -> SelectStatement {
        let mut select = Query::select();
        select.from(col(&self.schema().table_name));
        for (name, _, _) in self.schema().all_columns() {
            select.column(col(&name));
        }
        select
    }

    fn decode_row(&self, row: &QueryResult) -> ArborResult<R> {
        let mut data = Row::new();
        for (name, kind, nullable) in self.schema().all_columns() {
            let value = read_field_value(row, &name, kind, nullable)?;
            data.insert(name, value);
        }
        R::decode(&data, &self.codecs)
    }

    pub async fn load_by_key(&self, prefix: RefId, key: &FieldValue) -> ArborResult<R> {
        let schema = self.schema();
        let select = self
            .base_select()
            .and_where(Expr::col(col(COL_PREFIX)).eq(prefix.as_i64()))
            .and_where(Expr::col(col(COL_KEY)).eq(self.key_binding(key)?))
            .limit(1)
            .to_owned();
        let row = query_one(self.conn, &select).await?.ok_or_else(|| {
            self.hooks.not_found(format!(
                "{} for prefix {prefix} and key {key:?}",
                schema.record_name
            ))
        })?;
        self.decode_row(&row)
    }

    pub async fn find_all(&self, prefix: RefId) -> ArborResult<Vec<R>> {
        let select = self
            .base_select()
            .and_where(Expr::col(col(COL_PREFIX)).eq(prefix.as_i64()))
            .order_by(col(COL_KEY), Order::Asc)
            .to_owned();
        let rows = query_all(self.conn, &select).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(self.decode_row(row)?);
        }
        Ok(records)
    }

    pub async fn remove_by_key(&self, prefix: RefId, key: &FieldValue) -> ArborResult<R> {
        let record = self.load_by_key(prefix, key).await?;
        let delete = Query::delete()
            .from_table(col(&self.schema().table_name))
            .and_where(Expr::col(col(COL_PREFIX)).eq(prefix.as_i64()))
            .and_where(Expr::col(col(COL_KEY)).eq(self.key_binding(key)?))
            .to_owned();
        exec(self.conn, &delete).await?;
        Ok(record)
    }
}
