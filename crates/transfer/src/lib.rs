//! Transport-facing half of cdnpush.
//!
//! Everything a transport needs to receive a batch lives here: the
//! per-file [`UploadTarget`] descriptor, the [`UploadOptions`] handed
//! alongside it, and the [`Transport`] capability itself. The actual
//! network upload is implemented by the caller; this crate only ships a
//! tracing-backed [`DryRunTransport`].

mod fingerprint;
mod transport;
mod types;

pub use fingerprint::{fingerprint, is_rewritable, strip_query};
pub use transport::{DryRunTransport, Transport, TransportFuture, Transports};
pub use types::{TransportKind, UploadOptions, UploadState, UploadTarget};

/// Retry budget handed to every transport call.
///
/// Interpreted by the transport only; the coordinator never retries.
pub const DEFAULT_RETRY: u32 = 2;

/// Errors produced by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("receiver rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("receiver unreachable: {0}")]
    Unreachable(String),
}
