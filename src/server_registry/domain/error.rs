//! Error types for server registration domain validation.

use thiserror::Error;

/// Errors returned while constructing server registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServerRegistryDomainError {
    /// The server name is empty after trimming.
    #[error("server name must not be empty")]
    EmptyServerName,

    /// The server name contains characters outside `[a-z0-9_-]`.
    #[error(
        "server name '{0}' contains invalid characters (only lowercase alphanumeric, underscores and hyphens allowed)"
    )]
    InvalidServerName(String),

    /// The server name exceeds the 100-character storage limit.
    #[error("server name exceeds 100 character limit: {0}")]
    ServerNameTooLong(String),

    /// A registration without an owning organization was asked to be hidden.
    #[error("server '{name}' has no owning organization and must be global")]
    InvalidScope {
        /// Name of the offending registration.
        name: String,
    },

    /// The STDIO command is empty.
    #[error("STDIO command must not be empty")]
    EmptyStdioCommand,

    /// The HTTP base URL is empty.
    #[error("HTTP base URL must not be empty")]
    EmptyHttpBaseUrl,

    /// The HTTP base URL does not have an `http://` or `https://` prefix.
    #[error("HTTP base URL '{0}' must start with 'http://' or 'https://'")]
    InvalidHttpBaseUrl(String),

    /// An organization identifier could not be parsed.
    #[error("invalid organization identifier '{0}'")]
    InvalidOrgId(String),
}
