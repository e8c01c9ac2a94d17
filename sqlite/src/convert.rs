//! Conversion between records and SQLite rows.
//!
//! Booleans are stored as `0`/`1` integers and restored using the declared
//! attribute type. Integers read back into a `Double` attribute are widened.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use store_ladder_core::{AttributeType, EntityDescription, Record, StoreMetadata, Value};

use crate::error::{Result, SqliteError};
use crate::schema::{METADATA_TABLE, quote};

/// Converts a record value into an SQL value.
pub(crate) fn value_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Double(d) => SqlValue::Real(*d),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Converts a stored SQL value back into a record value of `attribute_type`.
pub(crate) fn value_from_sql(value: ValueRef<'_>, attribute_type: AttributeType) -> Result<Value> {
    let converted = match (value, attribute_type) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), AttributeType::Boolean) => Value::Boolean(i != 0),
        (ValueRef::Integer(i), AttributeType::Integer) => Value::Integer(i),
        (ValueRef::Integer(i), AttributeType::Double) => Value::Double(i as f64),
        (ValueRef::Real(d), AttributeType::Double) => Value::Double(d),
        (ValueRef::Text(bytes), AttributeType::Text) => Value::Text(
            String::from_utf8(bytes.to_vec())
                .map_err(|e| SqliteError::ConversionError(format!("invalid UTF-8 text: {e}")))?,
        ),
        (ValueRef::Blob(bytes), AttributeType::Blob) => Value::Blob(bytes.to_vec()),
        (other, expected) => {
            return Err(SqliteError::ConversionError(format!(
                "stored {:?} value cannot be read as {expected}",
                other.data_type()
            )));
        }
    };
    Ok(converted)
}

/// Inserts one record into the entity's table.
///
/// Attributes missing from the record are stored as `NULL`.
pub fn insert_record(
    conn: &Connection,
    entity: &EntityDescription,
    record: &Record,
) -> Result<i64> {
    if entity.attributes.is_empty() {
        conn.execute(&format!("INSERT INTO {} DEFAULT VALUES", quote(&entity.name)), [])?;
        return Ok(conn.last_insert_rowid());
    }

    let columns: Vec<String> = entity.attributes.iter().map(|a| quote(&a.name)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let values: Vec<SqlValue> = entity
        .attributes
        .iter()
        .map(|a| record.get(&a.name).map(value_to_sql).unwrap_or(SqlValue::Null))
        .collect();

    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&entity.name),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params_from_iter(values),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Reads every record of the entity's table in insertion order.
pub fn fetch_records(conn: &Connection, entity: &EntityDescription) -> Result<Vec<Record>> {
    let mut columns = vec![quote(store_ladder_core::RESERVED_PRIMARY_KEY)];
    columns.extend(entity.attributes.iter().map(|a| quote(&a.name)));

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY {}",
        columns.join(", "),
        quote(&entity.name),
        columns[0]
    ))?;
    let mut rows = stmt.query([])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (index, attribute) in entity.attributes.iter().enumerate() {
            let value = value_from_sql(row.get_ref(index + 1)?, attribute.attribute_type)?;
            record.insert(attribute.name.clone(), value);
        }
        records.push(record);
    }
    Ok(records)
}

/// Replaces the stored metadata with `metadata`.
pub fn write_metadata(conn: &Connection, metadata: &StoreMetadata) -> Result<()> {
    conn.execute(&format!("DELETE FROM {METADATA_TABLE}"), [])?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {METADATA_TABLE} (key, value) VALUES (?1, ?2)"
    ))?;
    for (key, value) in metadata.iter() {
        stmt.execute(params![key, value])?;
    }
    Ok(())
}

/// Reads the stored metadata, or `None` if the metadata table is absent.
pub fn read_metadata(conn: &Connection) -> Result<Option<StoreMetadata>> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
            [METADATA_TABLE],
            |_| Ok(()),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }

    let mut stmt = conn.prepare(&format!("SELECT key, value FROM {METADATA_TABLE}"))?;
    let metadata = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<StoreMetadata, _>>()?;
    Ok(Some(metadata))
}
