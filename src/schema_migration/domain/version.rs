//! Sequential migration identifiers.

use super::SchemaMigrationDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sequential migration version, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationVersion(u32);

impl MigrationVersion {
    /// Creates the flat `mcp_servers` table.
    pub const CREATE_MCP_SERVERS: Self = Self(1);

    /// Introduces tenant ownership and global visibility.
    pub const HYBRID_TENANCY: Self = Self(2);

    /// Creates a validated migration version.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaMigrationDomainError::ZeroVersion`] for `0`.
    pub const fn new(value: u32) -> Result<Self, SchemaMigrationDomainError> {
        if value == 0 {
            return Err(SchemaMigrationDomainError::ZeroVersion);
        }
        Ok(Self(value))
    }

    /// Returns the numeric version.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MigrationVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = value
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid migration version '{value}': {err}"))?;
        Self::new(parsed).map_err(|err| err.to_string())
    }
}
