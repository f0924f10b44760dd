//! Typed error definitions for xmove.
//! Provides a small set of well-known failure modes for better logs and tests.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmoveError {
    #[error("Path '{path}' is not under '{prefix}'")]
    PathMismatch { path: String, prefix: String },

    #[error("Invalid glob '{0}'. Wildcards can only appear in the last path segment")]
    InvalidGlob(String),

    #[error("Unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("Unable to move between different protocols '{src}' and '{dst}'. You may want to copy instead")]
    CrossProtocolMove { src: String, dst: String },

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Cannot delete branch '{0}' with 'rm'; branch deletion is irreversible and uses a dedicated operation")]
    BranchDeleteRefused(String),

    #[error("Invalid repository reference '{0}'; expected user/repo[/branch[/path]]")]
    InvalidReference(String),

    #[error("A transaction is already active on this '{0}' handle")]
    TransactionActive(String),

    #[error("No transaction is active on this '{0}' handle")]
    TransactionNotActive(String),

    #[error("Not logged in; run 'xmove login' first")]
    NotLoggedIn,
}
