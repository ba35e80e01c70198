//! Connection payload stored alongside a registration.
//!
//! The registry persists this value but never interprets it; dispatching to
//! the server is the caller's concern.

use super::ServerRegistryDomainError;
use serde::{Deserialize, Serialize};

/// How a dispatcher reaches a registered server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ServerEndpoint {
    /// A local process spoken to over STDIO.
    Stdio {
        /// Executable command.
        command: String,
        /// Command-line arguments.
        #[serde(default)]
        args: Vec<String>,
    },
    /// A remote server reached over HTTP.
    Http {
        /// Base URL of the server.
        base_url: String,
    },
}

impl ServerEndpoint {
    /// Creates a `stdio` endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryDomainError::EmptyStdioCommand`] when `command`
    /// is empty after trimming.
    pub fn stdio(command: impl Into<String>) -> Result<Self, ServerRegistryDomainError> {
        let trimmed = command.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(ServerRegistryDomainError::EmptyStdioCommand);
        }
        Ok(Self::Stdio {
            command: trimmed,
            args: Vec::new(),
        })
    }

    /// Creates an `http` endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryDomainError`] when `base_url` is empty or does
    /// not start with `http://` or `https://`.
    pub fn http(base_url: impl Into<String>) -> Result<Self, ServerRegistryDomainError> {
        let trimmed = base_url.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(ServerRegistryDomainError::EmptyHttpBaseUrl);
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ServerRegistryDomainError::InvalidHttpBaseUrl(trimmed));
        }
        Ok(Self::Http { base_url: trimmed })
    }

    /// Replaces the argument list of a `stdio` endpoint; other kinds are
    /// returned unchanged.
    #[must_use]
    pub fn with_args(self, values: impl IntoIterator<Item = String>) -> Self {
        match self {
            Self::Stdio { command, .. } => Self::Stdio {
                command,
                args: values.into_iter().collect(),
            },
            other @ Self::Http { .. } => other,
        }
    }
}
