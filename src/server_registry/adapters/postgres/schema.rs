//! Diesel schema for server registry persistence.
//!
//! Mirrors the table shape installed by the built-in schema migrations.

diesel::table! {
    /// External server registrations.
    mcp_servers (id) {
        /// Internal server identifier.
        id -> Uuid,
        /// Server name, unique per namespace.
        #[max_length = 100]
        name -> Varchar,
        /// Connection payload as JSONB.
        endpoint -> Jsonb,
        /// Owning organization, if any.
        org_id -> Nullable<Uuid>,
        /// Whether the entry is visible to every tenant.
        is_global -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
