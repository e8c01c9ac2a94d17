//! SQL generation for a schema model.
//!
//! Every entity becomes one table named after the entity, with a
//! `_pk INTEGER PRIMARY KEY` row identifier and one column per attribute.
//! Required attributes are `NOT NULL`. Store metadata lives in the
//! `ladder_metadata(key, value)` table.

use store_ladder_core::{
    AttributeType, EntityDescription, RESERVED_PRIMARY_KEY, SchemaModel, validate_model,
};

use crate::error::{Result, SqliteError};

/// Table holding [`StoreMetadata`](store_ladder_core::StoreMetadata) entries.
pub const METADATA_TABLE: &str = "ladder_metadata";

/// Quotes an identifier for use in SQL.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column type used to store an attribute type.
pub fn column_type(attribute_type: AttributeType) -> &'static str {
    match attribute_type {
        AttributeType::Integer | AttributeType::Boolean => "INTEGER",
        AttributeType::Double => "REAL",
        AttributeType::Text => "TEXT",
        AttributeType::Blob => "BLOB",
    }
}

/// Generates the `CREATE TABLE` statement for one entity.
pub fn generate_entity_sql(entity: &EntityDescription) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY", quote(RESERVED_PRIMARY_KEY))];
    for attribute in &entity.attributes {
        let mut column = format!(
            "{} {}",
            quote(&attribute.name),
            column_type(attribute.attribute_type)
        );
        if !attribute.optional {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        quote(&entity.name),
        columns.join(",\n    ")
    )
}

/// Generates the complete SQL schema for `model`, metadata table included.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidModel`] if the model fails validation.
pub fn generate_schema_sql(model: &SchemaModel) -> Result<String> {
    let errors = validate_model(model);
    if let Some(first) = errors.first() {
        return Err(SqliteError::InvalidModel(format!("{}: {first}", model.name)));
    }

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {METADATA_TABLE} (\n    \
         key TEXT PRIMARY KEY,\n    \
         value TEXT NOT NULL\n);\n"
    );
    for entity in &model.entities {
        sql.push_str(&generate_entity_sql(entity));
    }
    Ok(sql)
}
