//! `PostgreSQL` repository implementation for scoped server registrations.

use super::{
    models::{NewServerRow, ServerChangeset, ServerRow},
    schema::mcp_servers,
};
use crate::server_registry::{
    domain::{
        Namespace, OrgId, PersistedServerData, RegistrationScope, ServerChanges, ServerEndpoint,
        ServerId, ServerName, ServerRegistration, resolve_candidate, sort_for_presentation,
    },
    ports::{ServerRegistryError, ServerRegistryRepository, ServerRegistryResult},
};
use crate::schema_migration::domain::{GLOBAL_NAME_INDEX, ORG_NAME_INDEX, SCOPE_CHECK};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type for server registry adapters.
pub type ServerPgPool = Pool<ConnectionManager<PgConnection>>;

/// Primary key constraint.
const PRIMARY_KEY: &str = "mcp_servers_pkey";

/// `PostgreSQL`-backed repository for server registrations.
///
/// Writes run in a transaction that checks each target namespace before
/// writing. Updates lock the stored row with `SELECT ... FOR UPDATE` and apply
/// the changes to it inside the same transaction. The partial unique indexes remain the final arbiter: a racing
/// writer that passes the check still loses at the index and is reported as
/// a namespace conflict.
#[derive(Debug, Clone)]
pub struct PostgresServerRegistry {
    pool: ServerPgPool,
}

impl PostgresServerRegistry {
    /// Creates a new repository from a `PostgreSQL` pool.
    #[must_use]
    pub const fn new(pool: ServerPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, operation: F) -> ServerRegistryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ServerRegistryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ServerRegistryError::persistence)?;
            operation(&mut connection)
        })
        .await
        .map_err(ServerRegistryError::persistence)?
    }
}

/// Failure inside a write transaction, classified after rollback.
enum TransactionFailure {
    Registry(ServerRegistryError),
    Database(DieselError),
}

impl From<DieselError> for TransactionFailure {
    fn from(err: DieselError) -> Self {
        Self::Database(err)
    }
}

impl From<ServerRegistryError> for TransactionFailure {
    fn from(err: ServerRegistryError) -> Self {
        Self::Registry(err)
    }
}

/// Identity of the row being written, used to classify constraint failures.
#[derive(Clone)]
struct WriteTarget {
    id: ServerId,
    name: ServerName,
    scope: RegistrationScope,
}

impl WriteTarget {
    fn of(server: &ServerRegistration) -> Self {
        Self {
            id: server.id(),
            name: server.name().clone(),
            scope: server.scope(),
        }
    }

    fn classify(&self, failure: TransactionFailure) -> ServerRegistryError {
        match failure {
            TransactionFailure::Registry(err) => err,
            TransactionFailure::Database(DieselError::DatabaseError(kind, info)) => {
                let classified = self.classify_database_error(&kind, info.as_ref());
                classified.unwrap_or_else(|| {
                    ServerRegistryError::persistence(DieselError::DatabaseError(kind, info))
                })
            }
            TransactionFailure::Database(err) => ServerRegistryError::persistence(err),
        }
    }

    fn classify_database_error(
        &self,
        kind: &DatabaseErrorKind,
        info: &(dyn DatabaseErrorInformation + Send + Sync),
    ) -> Option<ServerRegistryError> {
        let constraint = info.constraint_name()?;
        match (kind, constraint) {
            (DatabaseErrorKind::UniqueViolation, GLOBAL_NAME_INDEX) => {
                Some(ServerRegistryError::Conflict {
                    namespace: Namespace::Global,
                    name: self.name.clone(),
                })
            }
            (DatabaseErrorKind::UniqueViolation, ORG_NAME_INDEX) => {
                self.scope
                    .org_id()
                    .map(|org_id| ServerRegistryError::Conflict {
                        namespace: Namespace::Tenant(org_id),
                        name: self.name.clone(),
                    })
            }
            (DatabaseErrorKind::UniqueViolation, PRIMARY_KEY) => {
                Some(ServerRegistryError::DuplicateServer(self.id))
            }
            (DatabaseErrorKind::CheckViolation, SCOPE_CHECK) => {
                Some(ServerRegistryError::InvalidScope(self.name.clone()))
            }
            _ => None,
        }
    }

    /// Rejects the write when another row already holds the name in one of
    /// the target namespaces.
    fn ensure_namespaces_free(
        &self,
        connection: &mut PgConnection,
    ) -> Result<(), TransactionFailure> {
        for namespace in self.scope.namespaces() {
            let holders = mcp_servers::table
                .filter(mcp_servers::name.eq(self.name.as_str()))
                .filter(mcp_servers::id.ne(self.id.into_inner()))
                .into_boxed();
            let scoped = match namespace {
                Namespace::Global => holders.filter(mcp_servers::is_global.eq(true)),
                Namespace::Tenant(org_id) => {
                    holders.filter(mcp_servers::org_id.eq(org_id.into_inner()))
                }
            };
            let taken = scoped
                .select(mcp_servers::id)
                .first::<uuid::Uuid>(connection)
                .optional()?;
            if taken.is_some() {
                return Err(TransactionFailure::Registry(ServerRegistryError::Conflict {
                    namespace,
                    name: self.name.clone(),
                }));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ServerRegistryRepository for PostgresServerRegistry {
    async fn insert(&self, server: &ServerRegistration) -> ServerRegistryResult<()> {
        let target = WriteTarget::of(server);
        let new_row = to_new_row(server)?;

        self.run_blocking(move |connection| {
            connection
                .transaction::<_, TransactionFailure, _>(|tx| {
                    let id_taken = mcp_servers::table
                        .filter(mcp_servers::id.eq(target.id.into_inner()))
                        .select(mcp_servers::id)
                        .first::<uuid::Uuid>(tx)
                        .optional()?;
                    if id_taken.is_some() {
                        return Err(ServerRegistryError::DuplicateServer(target.id).into());
                    }
                    target.ensure_namespaces_free(tx)?;
                    diesel::insert_into(mcp_servers::table)
                        .values(&new_row)
                        .execute(tx)?;
                    Ok(())
                })
                .map_err(|failure| target.classify(failure))
        })
        .await
    }

    async fn update(
        &self,
        server_id: ServerId,
        changes: &ServerChanges,
        updated_at: DateTime<Utc>,
    ) -> ServerRegistryResult<ServerRegistration> {
        let requested = changes.clone();

        self.run_blocking(move |connection| {
            connection
                .transaction::<_, TransactionFailure, _>(|tx| {
                    let row = mcp_servers::table
                        .filter(mcp_servers::id.eq(server_id.into_inner()))
                        .select(ServerRow::as_select())
                        .for_update()
                        .get_result::<ServerRow>(tx)
                        .optional()?
                        .ok_or(ServerRegistryError::NotFound(server_id))?;
                    let mut server = row_to_server(row)?;
                    server
                        .apply_changes(&requested, updated_at)
                        .map_err(ServerRegistryError::Rejected)?;

                    let target = WriteTarget::of(&server);
                    target.ensure_namespaces_free(tx)?;
                    let changeset = to_changeset(&server)?;
                    diesel::update(
                        mcp_servers::table.filter(mcp_servers::id.eq(server_id.into_inner())),
                    )
                    .set(&changeset)
                    .execute(tx)
                    .map_err(|err| target.classify(TransactionFailure::Database(err)))?;
                    Ok(server)
                })
                .map_err(|failure| match failure {
                    TransactionFailure::Registry(err) => err,
                    TransactionFailure::Database(err) => ServerRegistryError::persistence(err),
                })
        })
        .await
    }

    async fn remove(&self, server_id: ServerId) -> ServerRegistryResult<()> {
        self.run_blocking(move |connection| {
            let deleted_count = diesel::delete(
                mcp_servers::table.filter(mcp_servers::id.eq(server_id.into_inner())),
            )
            .execute(connection)
            .map_err(ServerRegistryError::persistence)?;

            if deleted_count == 0 {
                return Err(ServerRegistryError::NotFound(server_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(
        &self,
        server_id: ServerId,
    ) -> ServerRegistryResult<Option<ServerRegistration>> {
        self.run_blocking(move |connection| {
            let row = mcp_servers::table
                .filter(mcp_servers::id.eq(server_id.into_inner()))
                .select(ServerRow::as_select())
                .first::<ServerRow>(connection)
                .optional()
                .map_err(ServerRegistryError::persistence)?;
            row.map(row_to_server).transpose()
        })
        .await
    }

    async fn resolve(
        &self,
        name: &ServerName,
        org_id: Option<OrgId>,
    ) -> ServerRegistryResult<Option<ServerRegistration>> {
        let requested = name.clone();
        self.run_blocking(move |connection| {
            let named = mcp_servers::table
                .filter(mcp_servers::name.eq(requested.as_str()))
                .into_boxed();
            let visible = match org_id {
                Some(org) => named.filter(
                    mcp_servers::is_global
                        .eq(true)
                        .or(mcp_servers::org_id.eq(org.into_inner())),
                ),
                None => named.filter(mcp_servers::is_global.eq(true)),
            };
            let rows = visible
                .select(ServerRow::as_select())
                .load::<ServerRow>(connection)
                .map_err(ServerRegistryError::persistence)?;
            let candidates = rows
                .into_iter()
                .map(row_to_server)
                .collect::<ServerRegistryResult<Vec<_>>>()?;
            Ok(resolve_candidate(candidates, &requested, org_id))
        })
        .await
    }

    async fn list_visible(
        &self,
        org_id: Option<OrgId>,
    ) -> ServerRegistryResult<Vec<ServerRegistration>> {
        self.run_blocking(move |connection| {
            let query = mcp_servers::table.into_boxed();
            let visible = match org_id {
                Some(org) => query.filter(
                    mcp_servers::is_global
                        .eq(true)
                        .or(mcp_servers::org_id.eq(org.into_inner())),
                ),
                None => query.filter(mcp_servers::is_global.eq(true)),
            };
            let rows = visible
                .order((mcp_servers::name.asc(), mcp_servers::id.asc()))
                .select(ServerRow::as_select())
                .load::<ServerRow>(connection)
                .map_err(ServerRegistryError::persistence)?;
            let mut servers = rows
                .into_iter()
                .map(row_to_server)
                .collect::<ServerRegistryResult<Vec<_>>>()?;
            sort_for_presentation(&mut servers, org_id);
            Ok(servers)
        })
        .await
    }

    async fn list_all(&self) -> ServerRegistryResult<Vec<ServerRegistration>> {
        self.run_blocking(move |connection| {
            let rows = mcp_servers::table
                .order((mcp_servers::name.asc(), mcp_servers::id.asc()))
                .select(ServerRow::as_select())
                .load::<ServerRow>(connection)
                .map_err(ServerRegistryError::persistence)?;
            rows.into_iter().map(row_to_server).collect()
        })
        .await
    }
}

fn to_new_row(server: &ServerRegistration) -> ServerRegistryResult<NewServerRow> {
    let endpoint =
        serde_json::to_value(server.endpoint()).map_err(ServerRegistryError::persistence)?;

    Ok(NewServerRow {
        id: server.id().into_inner(),
        name: server.name().as_str().to_owned(),
        endpoint,
        org_id: server.org_id().map(OrgId::into_inner),
        is_global: server.is_global(),
        created_at: server.created_at(),
        updated_at: server.updated_at(),
    })
}

fn to_changeset(server: &ServerRegistration) -> ServerRegistryResult<ServerChangeset> {
    let NewServerRow {
        name,
        endpoint,
        org_id,
        is_global,
        updated_at,
        ..
    } = to_new_row(server)?;

    Ok(ServerChangeset {
        name,
        endpoint,
        org_id,
        is_global,
        updated_at,
    })
}

fn row_to_server(row: ServerRow) -> ServerRegistryResult<ServerRegistration> {
    let ServerRow {
        id,
        name,
        endpoint,
        org_id,
        is_global,
        created_at,
        updated_at,
    } = row;

    let parsed_name =
        ServerName::new(&name).map_err(ServerRegistryError::invalid_persisted_data)?;
    let parsed_scope =
        RegistrationScope::new(&parsed_name, org_id.map(OrgId::from_uuid), Some(is_global))
            .map_err(ServerRegistryError::invalid_persisted_data)?;
    let parsed_endpoint: ServerEndpoint =
        serde_json::from_value(endpoint).map_err(ServerRegistryError::invalid_persisted_data)?;

    Ok(ServerRegistration::from_persisted(PersistedServerData {
        id: ServerId::from_uuid(id),
        name: parsed_name,
        scope: parsed_scope,
        endpoint: parsed_endpoint,
        created_at,
        updated_at,
    }))
}
