use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{
    Alias, MysqlQueryBuilder, PostgresQueryBuilder, QueryStatementWriter,
    SchemaStatementBuilder, SqliteQueryBuilder, Value as SeaValue,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, ExecResult, QueryResult, Statement};

use arbor_core::{ArborError, ArborResult, ColumnKind, FieldValue, RefId, Timestamp};

pub(crate) fn col(name: &str) -> Alias {
    Alias::new(name)
}

pub(crate) fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

pub(crate) fn build_schema_stmt<S: SchemaStatementBuilder>(
    backend: DatabaseBackend,
    stmt: &S,
) -> String {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> ArborResult<ExecResult>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let result = conn
        .execute(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(result)
}

pub(crate) async fn exec_schema<C, S>(conn: &C, stmt: &S) -> ArborResult<()>
where
    C: ConnectionTrait,
    S: SchemaStatementBuilder,
{
    let backend = conn.get_database_backend();
    let sql = build_schema_stmt(backend, stmt);
    conn.execute_unprepared(&sql).await?;
    Ok(())
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> ArborResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let rows = conn
        .query_all(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(rows)
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> ArborResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let row = conn
        .query_one(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(row)
}

fn null_value(kind: ColumnKind) -> SeaValue {
    match kind {
        ColumnKind::Boolean => SeaValue::Bool(None),
        ColumnKind::Integer | ColumnKind::EntityId | ColumnKind::ParentLink => {
            SeaValue::BigInt(None)
        }
        ColumnKind::Float => SeaValue::Double(None),
        ColumnKind::Text | ColumnKind::EntityName | ColumnKind::Json => SeaValue::String(None),
        ColumnKind::Date => SeaValue::ChronoDate(None),
        ColumnKind::DateTime => SeaValue::ChronoDateTimeUtc(None),
    }
}

/// Convert one row-shaped value into its backend binding, with the declared
/// column kind deciding the null representation and guarding mismatches.
pub(crate) fn value_to_sea(kind: ColumnKind, value: &FieldValue) -> ArborResult<SeaValue> {
    if value.is_null() {
        return Ok(null_value(kind));
    }
    match (kind, value) {
        (ColumnKind::Boolean, FieldValue::Bool(v)) => Ok((*v).into()),
        (ColumnKind::Integer, FieldValue::I64(v)) => Ok((*v).into()),
        (ColumnKind::Float, FieldValue::F64(v)) => Ok((*v).into()),
        (ColumnKind::Text | ColumnKind::EntityName, FieldValue::Str(v)) => Ok(v.clone().into()),
        (ColumnKind::Date, FieldValue::Date(v)) => Ok((*v).into()),
        (ColumnKind::DateTime, FieldValue::DateTime(v)) => Ok(v.as_datetime().into()),
        (ColumnKind::Json, FieldValue::Json(v)) => {
            let raw = serde_json::to_string(v)
                .map_err(|err| ArborError::storage(err.to_string()))?;
            Ok(raw.into())
        }
        (ColumnKind::EntityId | ColumnKind::ParentLink, FieldValue::Ref(v)) => {
            Ok(v.as_i64().into())
        }
        _ => Err(ArborError::invalid(format!(
            "value {value:?} does not match column kind {kind:?}"
        ))),
    }
}

/// Read one column out of a result row according to its declared kind.
pub(crate) fn read_field_value(
    row: &QueryResult,
    column: &str,
    kind: ColumnKind,
    nullable: bool,
) -> ArborResult<FieldValue> {
    macro_rules! fetch {
        ($ty:ty, $wrap:expr) => {
            if nullable {
                match row.try_get::<Option<$ty>>("", column)? {
                    Some(value) => ($wrap)(value),
                    None => FieldValue::Null,
                }
            } else {
                ($wrap)(row.try_get::<$ty>("", column)?)
            }
        };
    }
    Ok(match kind {
        ColumnKind::Boolean => fetch!(bool, FieldValue::Bool),
        ColumnKind::Integer => fetch!(i64, FieldValue::I64),
        ColumnKind::Float => fetch!(f64, FieldValue::F64),
        ColumnKind::Text | ColumnKind::EntityName => fetch!(String, FieldValue::Str),
        ColumnKind::Date => fetch!(NaiveDate, FieldValue::Date),
        ColumnKind::DateTime => {
            fetch!(DateTime<Utc>, |value: DateTime<Utc>| FieldValue::DateTime(
                Timestamp::from_datetime(value)
            ))
        }
        ColumnKind::Json => {
            let raw = if nullable {
                row.try_get::<Option<String>>("", column)?
            } else {
                Some(row.try_get::<String>("", column)?)
            };
            match raw {
                Some(raw) => FieldValue::Json(
                    serde_json::from_str(&raw)
                        .map_err(|err| ArborError::storage(err.to_string()))?,
                ),
                None => FieldValue::Null,
            }
        }
        ColumnKind::EntityId | ColumnKind::ParentLink => {
            fetch!(i64, |value: i64| FieldValue::Ref(RefId::new(value)))
        }
    })
}
