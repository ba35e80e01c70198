//! Row models for the migration tracking table.

use super::schema::schema_versions;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Tracking row read from `schema_versions`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema_versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct SchemaVersionRow {
    pub version: i32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Tracking row written on apply.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema_versions)]
pub(super) struct NewSchemaVersionRow<'a> {
    pub version: i32,
    pub name: &'a str,
    pub applied_at: DateTime<Utc>,
}
