//! Change-detecting upload coordination.
//!
//! This crate decides *what* to send and *when*; the network upload itself
//! is delegated to a [`Transport`](cdnpush_transfer::Transport) supplied by
//! the caller.
//!
//! # Pipeline
//!
//! 1. **Gate**: the first submission is sent as a verification probe;
//!    later submissions wait until it completes
//! 2. **Filter**: files whose fingerprint matches the last successful
//!    upload to the same destination are dropped
//! 3. **Rewrite**: style, script, markup and template files go through
//!    the replacement rules
//! 4. **Dispatch**: after the throttle delay the batch is handed to the
//!    selected transport, one call at a time per destination and in the
//!    order the runs were scheduled
//! 5. **Record**: on success, fingerprints of the delivered files are
//!    stored

pub mod config;
pub mod coordinator;
pub mod error;
pub mod rewrite;
pub mod scanner;
pub mod store;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod test_support;

pub use config::{CoordinatorConfig, DEFAULT_THROTTLE_MS, RuleConfig, UploaderOptions};
pub use coordinator::UploadCoordinator;
pub use error::DeployError;
pub use rewrite::{Pattern, ReplacementRule, apply_rules, rewrite_content};
pub use scanner::collect_files;
pub use store::{ChangedFile, FingerprintStore};
pub use types::{GateState, Submission, UploadReport, UploadRequest};
pub use uploader::{CompletionCallback, UploadHandle, Uploader};
