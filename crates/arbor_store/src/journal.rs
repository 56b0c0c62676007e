use sea_orm::ConnectionTrait;
use sea_orm::sea_query::{Expr, ExprTrait, Order, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use arbor_core::{
    ArborError, ArborResult, COL_REF_ID, COL_VERSION, ColumnKind, EntityEvent, RefId, Timestamp,
};

use crate::db::{col, exec, query_all, read_field_value};
use crate::schema::{COL_EVENT_KIND, COL_EVENT_PAYLOAD, COL_EVENT_TIMESTAMP, TableSpec};

/// One row of an entity's journaled history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournaledEvent {
    pub ref_id: RefId,
    pub version: u32,
    pub kind: String,
    pub timestamp: Timestamp,
    pub payload: JsonValue,
}

pub(crate) async fn append_events<C: ConnectionTrait>(
    conn: &C,
    spec: &TableSpec,
    ref_id: RefId,
    version: u32,
    events: &[EntityEvent],
) -> ArborResult<()> {
    for event in events {
        let payload = serde_json::to_string(&event.payload)
            .map_err(|err| ArborError::storage(err.to_string()))?;
        let insert = Query::insert()
            .into_table(col(&spec.schema.event_table_name))
            .columns([
                col(COL_REF_ID),
                col(COL_VERSION),
                col(COL_EVENT_KIND),
                col(COL_EVENT_TIMESTAMP),
                col(COL_EVENT_PAYLOAD),
            ])
            .values_panic([
                ref_id.as_i64().into(),
                i64::from(version).into(),
                event.kind.clone().into(),
                event.timestamp.as_datetime().into(),
                payload.into(),
            ])
            .to_owned();
        exec(conn, &insert).await?;
    }
    if !events.is_empty() {
        debug!(
            table = %spec.schema.event_table_name,
            ref_id = ref_id.as_i64(),
            count = events.len(),
            "journaled events"
        );
    }
    Ok(())
}

pub(crate) async fn purge_events<C: ConnectionTrait>(
    conn: &C,
    spec: &TableSpec,
    ref_id: RefId,
) -> ArborResult<u64> {
    let delete = Query::delete()
        .from_table(col(&spec.schema.event_table_name))
        .and_where(Expr::col(col(COL_REF_ID)).eq(ref_id.as_i64()))
        .to_owned();
    let result = exec(conn, &delete).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn load_history<C: ConnectionTrait>(
    conn: &C,
    spec: &TableSpec,
    ref_id: RefId,
) -> ArborResult<Vec<JournaledEvent>> {
    let select = Query::select()
        .from(col(&spec.schema.event_table_name))
        .columns([
            col(COL_REF_ID),
            col(COL_VERSION),
            col(COL_EVENT_KIND),
            col(COL_EVENT_TIMESTAMP),
            col(COL_EVENT_PAYLOAD),
        ])
        .and_where(Expr::col(col(COL_REF_ID)).eq(ref_id.as_i64()))
        .order_by(col(COL_VERSION), Order::Asc)
        .order_by(col(COL_EVENT_TIMESTAMP), Order::Asc)
        .to_owned();
    let rows = query_all(conn, &select).await?;
    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let version = read_field_value(&row, COL_VERSION, ColumnKind::Integer, false)?
            .as_i64()
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| ArborError::storage("event version is not a positive integer"))?;
        let kind = read_field_value(&row, COL_EVENT_KIND, ColumnKind::Text, false)?
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ArborError::storage("event kind is not a string"))?;
        let timestamp =
            read_field_value(&row, COL_EVENT_TIMESTAMP, ColumnKind::DateTime, false)?
                .as_datetime()
                .ok_or_else(|| ArborError::storage("event timestamp is not a timestamp"))?;
        let payload = read_field_value(&row, COL_EVENT_PAYLOAD, ColumnKind::Json, false)?
            .as_json()
            .cloned()
            .ok_or_else(|| ArborError::storage("event payload is not json"))?;
        events.push(JournaledEvent {
            ref_id,
            version,
            kind,
            timestamp,
            payload,
        });
    }
    Ok(events)
}

pub(crate) async fn count_events<C: ConnectionTrait>(
    conn: &C,
    spec: &TableSpec,
    ref_id: RefId,
) -> ArborResult<u64> {
    let select = Query::select()
        .from(col(&spec.schema.event_table_name))
        .column(col(COL_REF_ID))
        .and_where(Expr::col(col(COL_REF_ID)).eq(ref_id.as_i64()))
        .to_owned();
    let rows = query_all(conn, &select).await?;
    Ok(rows.len() as u64)
}
