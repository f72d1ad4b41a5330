//! Transport capability.
//!
//! The deploy crate never talks to the network itself. Callers plug in
//! two implementations, one per [`TransportKind`], and the uploader picks
//! one per request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::TransferError;
use crate::types::{TransportKind, UploadOptions, UploadTarget};

/// Boxed future returned by [`Transport::upload`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransferError>> + Send + 'a>>;

/// Performs the actual upload of one batch.
///
/// The returned future resolves exactly once. `Ok` means every target in
/// the batch was delivered; any `Err` is treated as a failed batch.
pub trait Transport: Send + Sync {
    fn upload<'a>(&'a self, batch: &'a [UploadTarget], options: &'a UploadOptions)
    -> TransportFuture<'a>;
}

/// The two interchangeable transport strategies.
#[derive(Clone)]
pub struct Transports {
    pub fsr: Arc<dyn Transport>,
    pub receiver: Arc<dyn Transport>,
}

impl Transports {
    /// Creates a pair from the secure-deploy and plain-receiver strategies.
    pub fn new(fsr: Arc<dyn Transport>, receiver: Arc<dyn Transport>) -> Self {
        Self { fsr, receiver }
    }

    /// Uses the same implementation for both strategies.
    pub fn single(transport: Arc<dyn Transport>) -> Self {
        Self {
            fsr: Arc::clone(&transport),
            receiver: transport,
        }
    }

    /// Returns the strategy for `kind`.
    pub fn select(&self, kind: TransportKind) -> &Arc<dyn Transport> {
        match kind {
            TransportKind::Fsr => &self.fsr,
            TransportKind::Receiver => &self.receiver,
        }
    }
}

/// Logs every descriptor and reports success without sending anything.
#[derive(Debug, Default, Clone)]
pub struct DryRunTransport;

impl Transport for DryRunTransport {
    fn upload<'a>(
        &'a self,
        batch: &'a [UploadTarget],
        options: &'a UploadOptions,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            for target in batch {
                debug!(
                    host = %target.host,
                    receiver = %target.receiver,
                    to = %target.to,
                    subpath = %target.subpath,
                    bytes = target.content.len(),
                    "dry-run upload"
                );
            }
            info!(
                files = batch.len(),
                host = %options.host,
                retry = options.retry,
                "dry-run batch accepted"
            );
            Ok(())
        })
    }
}
