use std::collections::BTreeMap;

use crate::{
    ArborError, ArborResult, CodecRegistry, COL_ARCHIVED, COL_ARCHIVED_TIME, COL_CREATED_TIME,
    COL_LAST_MODIFIED_TIME, COL_REF_ID, COL_VERSION, EntitySchema, FieldValue, RecordSchema,
    RefId, Timestamp,
};

/// A row-shaped dictionary keyed by column name: what codecs produce on
/// encode and consume on decode.
pub type Row = BTreeMap<String, FieldValue>;

pub fn row_value<'r>(row: &'r Row, column: &str) -> ArborResult<&'r FieldValue> {
    row.get(column)
        .ok_or_else(|| ArborError::invalid(format!("row is missing column `{column}`")))
}

/// Identity/versioning/soft-archive header shared by every entity shape.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityHeader {
    pub ref_id: RefId,
    pub version: u32,
    pub archived: bool,
    pub created_time: Timestamp,
    pub last_modified_time: Timestamp,
    pub archived_time: Option<Timestamp>,
}

impl EntityHeader {
    /// Header of a freshly constructed, not-yet-persisted entity.
    pub fn new(created_time: Timestamp) -> Self {
        Self {
            ref_id: RefId::UNSET,
            version: 1,
            archived: false,
            created_time,
            last_modified_time: created_time,
            archived_time: None,
        }
    }
}

/// A persistable entity. The schema is an explicit static declaration, and
/// field encode/decode routes every field through its registered codec; the
/// header is handled by [`header_to_row`] / [`header_from_row`].
pub trait Entity: Clone + Send + Sync + 'static {
    fn schema() -> &'static EntitySchema;
    fn header(&self) -> &EntityHeader;
    fn header_mut(&mut self) -> &mut EntityHeader;
    fn encode_fields(&self, codecs: &CodecRegistry) -> ArborResult<Row>;
    fn decode_fields(header: EntityHeader, row: &Row, codecs: &CodecRegistry) -> ArborResult<Self>;
}

/// A persisted tuple identified by the natural key `(prefix, key)`. The
/// encoded row carries every column, the key and timestamps included.
pub trait Record: Clone + Send + Sync + 'static {
    fn schema() -> &'static RecordSchema;
    fn encode(&self, codecs: &CodecRegistry) -> ArborResult<Row>;
    fn decode(row: &Row, codecs: &CodecRegistry) -> ArborResult<Self>;
}

/// Write-side header encoding. `ref_id` is intentionally absent: the store
/// assigns it on insert and addresses it in predicates on update.
pub fn header_to_row(header: &EntityHeader) -> ArborResult<Row> {
    if header.archived != header.archived_time.is_some() {
        return Err(ArborError::invalid(
            "archived flag and archived_time disagree",
        ));
    }
    let mut row = Row::new();
    row.insert(
        COL_VERSION.to_owned(),
        FieldValue::I64(i64::from(header.version)),
    );
    row.insert(COL_ARCHIVED.to_owned(), FieldValue::Bool(header.archived));
    row.insert(
        COL_CREATED_TIME.to_owned(),
        FieldValue::DateTime(header.created_time),
    );
    row.insert(
        COL_LAST_MODIFIED_TIME.to_owned(),
        FieldValue::DateTime(header.last_modified_time),
    );
    row.insert(
        COL_ARCHIVED_TIME.to_owned(),
        match header.archived_time {
            Some(time) => FieldValue::DateTime(time),
            None => FieldValue::Null,
        },
    );
    Ok(row)
}

pub fn header_from_row(row: &Row) -> ArborResult<EntityHeader> {
    let ref_id = row_value(row, COL_REF_ID)?
        .as_ref_id()
        .ok_or_else(|| ArborError::invalid("header ref_id is not an id"))?;
    let version = row_value(row, COL_VERSION)?
        .as_i64()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| ArborError::invalid("header version is not a positive integer"))?;
    let archived = row_value(row, COL_ARCHIVED)?
        .as_bool()
        .ok_or_else(|| ArborError::invalid("header archived is not a boolean"))?;
    let created_time = row_value(row, COL_CREATED_TIME)?
        .as_datetime()
        .ok_or_else(|| ArborError::invalid("header created_time is not a timestamp"))?;
    let last_modified_time = row_value(row, COL_LAST_MODIFIED_TIME)?
        .as_datetime()
        .ok_or_else(|| ArborError::invalid("header last_modified_time is not a timestamp"))?;
    let archived_time = match row_value(row, COL_ARCHIVED_TIME)? {
        FieldValue::Null => None,
        value => Some(
            value
                .as_datetime()
                .ok_or_else(|| ArborError::invalid("header archived_time is not a timestamp"))?,
        ),
    };
    Ok(EntityHeader {
        ref_id,
        version,
        archived,
        created_time,
        last_modified_time,
        archived_time,
    })
}

#[cfg(test)]
mod tests {
    use super::{EntityHeader, Row, header_from_row, header_to_row};
    use crate::{ArborError, FieldValue, RefId, Timestamp};
    use chrono::{TimeZone, Utc};

    fn fixed_time() -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
    }

    #[test]
    fn header_roundtrips_through_a_row() {
        let header = EntityHeader::new(fixed_time());
        let mut row: Row = header_to_row(&header).expect("encode");
        row.insert("ref_id".to_owned(), FieldValue::Ref(RefId::new(7)));
        let decoded = header_from_row(&row).expect("decode");
        assert_eq!(decoded.ref_id, RefId::new(7));
        assert_eq!(decoded.version, 1);
        assert!(!decoded.archived);
        assert_eq!(decoded.created_time, header.created_time);
        assert_eq!(decoded.archived_time, None);
    }

    #[test]
    fn archive_flag_and_time_must_agree() {
        let mut header = EntityHeader::new(fixed_time());
        header.archived = true;
        let err = header_to_row(&header).expect_err("no archived_time");
        assert!(matches!(err, ArborError::Validation { .. }));
        header.archived_time = Some(fixed_time());
        header_to_row(&header).expect("consistent header");
    }
}
