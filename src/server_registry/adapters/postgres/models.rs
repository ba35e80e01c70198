//! Diesel row models for server registry persistence.

use super::schema::mcp_servers;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for server records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = mcp_servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServerRow {
    /// Internal server identifier.
    pub id: uuid::Uuid,
    /// Server name.
    pub name: String,
    /// Connection payload.
    pub endpoint: Value,
    /// Owning organization.
    pub org_id: Option<uuid::Uuid>,
    /// Global visibility flag.
    pub is_global: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for server records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = mcp_servers)]
pub struct NewServerRow {
    /// Internal server identifier.
    pub id: uuid::Uuid,
    /// Server name.
    pub name: String,
    /// Connection payload.
    pub endpoint: Value,
    /// Owning organization.
    pub org_id: Option<uuid::Uuid>,
    /// Global visibility flag.
    pub is_global: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Mutable columns written by an update.
///
/// `org_id` is written even when `None` so that clearing ownership persists.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = mcp_servers)]
#[diesel(treat_none_as_null = true)]
pub struct ServerChangeset {
    /// Server name.
    pub name: String,
    /// Connection payload.
    pub endpoint: Value,
    /// Owning organization.
    pub org_id: Option<uuid::Uuid>,
    /// Global visibility flag.
    pub is_global: bool,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
