//! Deploy error types.

use cdnpush_transfer::TransferError;

/// Errors produced while coordinating uploads.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid replace pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("no replace rules configured, cannot rewrite {file}")]
    ReplacementRulesMissing { file: String },

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("cancelled")]
    Cancelled,

    #[error("upload task failed: {0}")]
    Join(String),
}
