//! The ordered set of known migrations, including the built-in registry
//! history.

use super::{
    CheckConstraint, ColumnDefinition, ColumnType, IndexDefinition, Literal, Migration,
    MigrationVersion, RowPredicate, SchemaChange, SchemaMigrationDomainError, TableDefinition,
};

/// Server registry table.
pub const MCP_SERVERS_TABLE: &str = "mcp_servers";
/// Flat unique name index from before tenancy.
pub const FLAT_NAME_INDEX: &str = "idx_mcp_servers_name";
/// Unique name index over global registrations.
pub const GLOBAL_NAME_INDEX: &str = "idx_mcp_servers_global_name";
/// Unique `(name, org_id)` index over owned registrations.
pub const ORG_NAME_INDEX: &str = "idx_mcp_servers_org_name";
/// Scope lookup index.
pub const ORG_SCOPE_INDEX: &str = "idx_mcp_servers_org_scope";
/// Check that an unowned registration is global.
pub const SCOPE_CHECK: &str = "mcp_servers_scope_check";

const SERVER_NAME_LENGTH: u32 = 100;

/// Migrations ordered by version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCatalog {
    migrations: Vec<Migration>,
}

impl MigrationCatalog {
    /// Builds a catalogue, validating versions and prerequisites.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaMigrationDomainError`] when a version repeats, a name
    /// is empty, or a prerequisite is unknown or not earlier than its
    /// dependent.
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self, SchemaMigrationDomainError> {
        migrations.sort_by_key(Migration::version);

        for pair in migrations.windows(2) {
            if let [previous, current] = pair
                && previous.version() == current.version()
            {
                return Err(SchemaMigrationDomainError::DuplicateVersion(
                    current.version(),
                ));
            }
        }

        for migration in &migrations {
            if migration.name().trim().is_empty() {
                return Err(SchemaMigrationDomainError::EmptyName(migration.version()));
            }
            let Some(requires) = migration.prerequisite() else {
                continue;
            };
            if requires >= migration.version() {
                return Err(SchemaMigrationDomainError::ForwardPrerequisite {
                    version: migration.version(),
                    requires,
                });
            }
            if !migrations.iter().any(|known| known.version() == requires) {
                return Err(SchemaMigrationDomainError::UnknownPrerequisite {
                    version: migration.version(),
                    requires,
                });
            }
        }

        Ok(Self { migrations })
    }

    /// Returns the registry's built-in migration history.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            migrations: vec![create_mcp_servers(), hybrid_tenancy()],
        }
    }

    /// Finds a migration by version.
    #[must_use]
    pub fn get(&self, version: MigrationVersion) -> Option<&Migration> {
        self.migrations
            .iter()
            .find(|migration| migration.version() == version)
    }

    /// Iterates migrations in version order.
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    /// Returns the versions that directly require `version`.
    #[must_use]
    pub fn dependents_of(&self, version: MigrationVersion) -> Vec<MigrationVersion> {
        self.migrations
            .iter()
            .filter(|migration| migration.prerequisite() == Some(version))
            .map(Migration::version)
            .collect()
    }
}

fn name_column() -> ColumnDefinition {
    ColumnDefinition::required("name", ColumnType::Varchar(SERVER_NAME_LENGTH))
}

fn create_mcp_servers() -> Migration {
    let table = TableDefinition {
        name: MCP_SERVERS_TABLE.to_owned(),
        columns: vec![
            ColumnDefinition::required("id", ColumnType::Uuid),
            name_column(),
            ColumnDefinition::required("endpoint", ColumnType::Jsonb),
            ColumnDefinition::required("created_at", ColumnType::Timestamptz),
            ColumnDefinition::required("updated_at", ColumnType::Timestamptz),
        ],
        primary_key: vec![String::from("id")],
    };

    Migration::new(MigrationVersion::CREATE_MCP_SERVERS, "create_mcp_servers")
        .with_change(SchemaChange::CreateTable(table))
        .with_change(SchemaChange::CreateIndex(flat_name_index()))
}

fn flat_name_index() -> IndexDefinition {
    IndexDefinition {
        name: FLAT_NAME_INDEX.to_owned(),
        table: MCP_SERVERS_TABLE.to_owned(),
        columns: vec![String::from("name")],
        unique: true,
        predicate: None,
    }
}

fn hybrid_tenancy() -> Migration {
    let table = MCP_SERVERS_TABLE.to_owned();
    let org_id = String::from("org_id");
    let is_global = String::from("is_global");

    Migration::new(MigrationVersion::HYBRID_TENANCY, "hybrid_tenancy")
        .requires(MigrationVersion::CREATE_MCP_SERVERS)
        .with_change(SchemaChange::AddColumn {
            table: table.clone(),
            column: ColumnDefinition::optional(org_id.clone(), ColumnType::Uuid),
        })
        .with_change(SchemaChange::AddColumn {
            table: table.clone(),
            column: ColumnDefinition::required(is_global.clone(), ColumnType::Boolean)
                .with_default(Literal::Bool(true)),
        })
        .with_change(SchemaChange::Backfill {
            table: table.clone(),
            column: is_global.clone(),
            value: Literal::Bool(true),
            filter: Some(RowPredicate::IsNull(org_id.clone())),
        })
        .with_change(SchemaChange::AddCheck(CheckConstraint {
            name: SCOPE_CHECK.to_owned(),
            table: table.clone(),
            predicate: RowPredicate::Any(vec![
                RowPredicate::IsNotNull(org_id.clone()),
                RowPredicate::IsTrue(is_global.clone()),
            ]),
        }))
        .with_change(SchemaChange::DropIndex(flat_name_index()))
        .with_change(SchemaChange::CreateIndex(IndexDefinition {
            name: GLOBAL_NAME_INDEX.to_owned(),
            table: table.clone(),
            columns: vec![String::from("name")],
            unique: true,
            predicate: Some(RowPredicate::IsTrue(is_global.clone())),
        }))
        .with_change(SchemaChange::CreateIndex(IndexDefinition {
            name: ORG_NAME_INDEX.to_owned(),
            table: table.clone(),
            columns: vec![String::from("name"), org_id.clone()],
            unique: true,
            predicate: Some(RowPredicate::IsNotNull(org_id.clone())),
        }))
        .with_change(SchemaChange::CreateIndex(IndexDefinition {
            name: ORG_SCOPE_INDEX.to_owned(),
            table,
            columns: vec![org_id, is_global],
            unique: false,
            predicate: None,
        }))
}
