//! Operator tool for the server registry schema.
//!
//! Usage:
//!
//! ```text
//! registry-migrate status
//! registry-migrate up
//! registry-migrate apply <version>
//! registry-migrate rollback <version>
//! ```
//!
//! Configuration comes from the environment (optionally via a `.env` file):
//! `DATABASE_URL` is required; `REGISTRY_POOL_SIZE`,
//! `REGISTRY_CONNECTION_TIMEOUT_SECS` and `REGISTRY_LOG_FORMAT` are optional.
//! Log verbosity follows `RUST_LOG`.

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use hybrid_registry::config::{LogFormat, RegistryConfig};
use hybrid_registry::schema_migration::{
    adapters::postgres::PostgresSchemaStore,
    domain::MigrationVersion,
    services::{MigrationOutcome, MigrationStatus, SchemaMigrator},
};
use mockable::DefaultClock;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Registry schema migration commands.
#[derive(Parser, Debug)]
#[command(name = "registry-migrate")]
#[command(about = "Apply, roll back and inspect server registry schema migrations")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalogued migrations and whether each is applied.
    Status,
    /// Apply every pending migration in order.
    Up,
    /// Apply one migration.
    Apply {
        /// Migration version.
        version: MigrationVersion,
    },
    /// Roll back one migration.
    Rollback {
        /// Migration version.
        version: MigrationVersion,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        return Err(err).wrap_err("failed to read .env file");
    }
    let config = RegistryConfig::from_env().wrap_err("invalid configuration")?;
    setup_tracing(config.log_format);

    let pool = config.build_pool().wrap_err("failed to connect to the database")?;
    let migrator = SchemaMigrator::new(
        Arc::new(PostgresSchemaStore::new(pool)),
        Arc::new(DefaultClock),
    );

    match args.command {
        Command::Status => {
            let status = migrator.status().await?;
            write_status(&mut io::stdout().lock(), &status)?;
        }
        Command::Up => {
            let applied = migrator.apply_pending().await?;
            info!(count = applied.len(), "pending migrations applied");
        }
        Command::Apply { version } => match migrator.apply(version).await? {
            MigrationOutcome::Applied(record) => {
                info!(version = %record.version, name = %record.name, "migration applied");
            }
            MigrationOutcome::AlreadyApplied(applied) => {
                info!(version = %applied, "migration was already applied");
            }
        },
        Command::Rollback { version } => {
            migrator.rollback(version).await?;
        }
    }
    Ok(())
}

fn write_status(out: &mut impl Write, status: &[MigrationStatus]) -> io::Result<()> {
    for entry in status {
        let state = entry.applied.as_ref().map_or_else(
            || String::from("pending"),
            |record| format!("applied {}", record.applied_at.to_rfc3339()),
        );
        writeln!(out, "{:>4}  {:<24}  {state}", entry.version.value(), entry.name)?;
    }
    Ok(())
}

fn setup_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
