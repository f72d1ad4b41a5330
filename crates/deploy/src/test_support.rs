//! Shared test doubles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cdnpush_transfer::{
    TransferError, Transport, TransportFuture, Transports, UploadOptions, UploadState,
    UploadTarget,
};
use tokio::time::Instant;

use crate::config::UploaderOptions;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub batch: Vec<UploadTarget>,
    pub at: Instant,
    pub state: UploadState,
    pub retry: u32,
}

impl RecordedCall {
    pub fn subpaths(&self) -> Vec<&str> {
        self.batch.iter().map(|t| t.subpath.as_str()).collect()
    }
}

/// Records every batch it receives; optionally slow or failing.
pub(crate) struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    failing: AtomicBool,
    latency: Duration,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Self::build(false, Duration::ZERO)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(true, Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Self::build(false, latency)
    }

    fn build(failing: bool, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(failing),
            latency,
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn upload<'a>(
        &'a self,
        batch: &'a [UploadTarget],
        options: &'a UploadOptions,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(RecordedCall {
                batch: batch.to_vec(),
                at: Instant::now(),
                state: options.current_state(),
                retry: options.retry,
            });
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(TransferError::Rejected {
                    status: 503,
                    message: "service unavailable".into(),
                });
            }
            Ok(())
        })
    }
}

/// Panics inside every upload call.
pub(crate) struct PanickingTransport;

impl Transport for PanickingTransport {
    fn upload<'a>(
        &'a self,
        _batch: &'a [UploadTarget],
        _options: &'a UploadOptions,
    ) -> TransportFuture<'a> {
        Box::pin(async move { panic!("transport blew up") })
    }
}

/// Default options routing both strategies to `transport`.
pub(crate) fn options_with(transport: &Arc<RecordingTransport>) -> UploaderOptions {
    UploaderOptions::new(Transports::single(transport.clone()))
}
