//! Per-destination uploader.
//!
//! An [`Uploader`] owns the fingerprint store of one destination. Each
//! [`run`](Uploader::run) filters out files whose content was already
//! delivered, rewrites text assets, and schedules exactly one transport
//! call after the throttle delay.
//!
//! Scheduled runs go through a single dispatch worker per uploader, so
//! transport calls for one destination happen one at a time and in `run`
//! order, whatever runtime flavor drives them.

use std::sync::{Arc, Mutex};

use cdnpush_transfer::{
    DEFAULT_RETRY, Transport, TransportKind, UploadOptions, UploadState, UploadTarget,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::UploaderOptions;
use crate::error::DeployError;
use crate::rewrite::rewrite_content;
use crate::store::{ChangedFile, FingerprintStore};
use crate::types::{UploadReport, UploadRequest};

/// Invoked once when a run finishes, successfully or not.
pub type CompletionCallback = Box<dyn FnOnce(&Result<UploadReport, DeployError>) + Send + 'static>;

/// Handle to a scheduled run.
#[derive(Debug)]
pub struct UploadHandle {
    cancel: CancellationToken,
    join: JoinHandle<Result<UploadReport, DeployError>>,
}

impl UploadHandle {
    /// Cancels the run if its transport call has not started yet.
    ///
    /// Has no effect once the transport call started.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the run finished (including its callback).
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the run to finish.
    pub async fn join(self) -> Result<UploadReport, DeployError> {
        self.join
            .await
            .map_err(|e| DeployError::Join(e.to_string()))?
    }
}

#[derive(Debug, Default)]
struct RunCounts {
    scheduled: usize,
    in_flight: usize,
}

impl RunCounts {
    fn state(&self) -> UploadState {
        if self.scheduled > 0 {
            UploadState::Scheduled
        } else if self.in_flight > 0 {
            UploadState::InFlight
        } else {
            UploadState::Idle
        }
    }
}

struct UploaderInner {
    options: UploaderOptions,
    store: Arc<FingerprintStore>,
    runs: Mutex<RunCounts>,
    state_tx: watch::Sender<UploadState>,
    queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl UploaderInner {
    fn update_runs(&self, f: impl FnOnce(&mut RunCounts)) {
        let mut runs = self.runs.lock().unwrap();
        f(&mut *runs);
        self.state_tx.send_replace(runs.state());
    }

    /// Hands `job` to the dispatch worker, starting one if none is running.
    fn enqueue(&self, job: Job) {
        let mut queue = self.queue.lock().unwrap();
        let job = match queue.as_ref() {
            Some(tx) => match tx.send(job) {
                Ok(()) => return,
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_loop(rx));
        debug!("dispatch worker started");
        // The receiver was just moved into the worker; a failed send drops
        // the job, which releases its run slot and fails its reply.
        let _ = tx.send(job);
        *queue = Some(tx);
    }
}

/// Change-detecting, throttled uploader for one destination.
///
/// Cheap to clone; clones share the store and run state.
#[derive(Clone)]
pub struct Uploader {
    inner: Arc<UploaderInner>,
}

impl Uploader {
    /// Creates an uploader with an empty fingerprint store.
    pub fn new(options: UploaderOptions) -> Self {
        Self::with_store(options, Arc::new(FingerprintStore::new()))
    }

    /// Creates an uploader backed by an existing store.
    pub fn with_store(options: UploaderOptions, store: Arc<FingerprintStore>) -> Self {
        let (state_tx, _) = watch::channel(UploadState::Idle);
        Self {
            inner: Arc::new(UploaderInner {
                options,
                store,
                runs: Mutex::new(RunCounts::default()),
                state_tx,
                queue: Mutex::new(None),
            }),
        }
    }

    /// Returns the fingerprint store.
    pub fn store(&self) -> &Arc<FingerprintStore> {
        &self.inner.store
    }

    /// Returns the current run state.
    pub fn state(&self) -> UploadState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribes to run state changes.
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.inner.state_tx.subscribe()
    }

    /// Waits until nothing is scheduled or in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|s| *s == UploadState::Idle).await;
    }

    /// Filters, rewrites and schedules one batch.
    ///
    /// Returns immediately. The transport is called once, no earlier than
    /// the throttle delay and after every earlier run of this uploader has
    /// finished its call; then `on_complete` receives the outcome. Without a
    /// callback the outcome is logged. Fingerprints are recorded only when
    /// the transport reports success.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(
        &self,
        request: UploadRequest,
        on_complete: Option<CompletionCallback>,
    ) -> Result<UploadHandle, DeployError> {
        let options = &self.inner.options;
        let changed = self.inner.store.changed_files(&request.files);
        let skipped = request.files.len() - changed.len();

        let batch = changed
            .iter()
            .map(|file| -> Result<UploadTarget, DeployError> {
                let content = request.files.get(&file.raw).map(Vec::as_slice).unwrap_or(&[]);
                Ok(UploadTarget {
                    host: options.host.clone(),
                    receiver: options.receiver.clone(),
                    content: rewrite_content(&file.stripped, content, options.replace.as_deref())?,
                    to: request.to.clone(),
                    subpath: file.stripped.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let kind = request.transport_kind();
        debug!(
            to = %request.to,
            files = batch.len(),
            skipped,
            transport = ?kind,
            "upload scheduled"
        );

        let cancel = CancellationToken::new();
        let (reply_tx, reply_rx) = oneshot::channel();
        let started = Instant::now();
        let to = request.to.clone();
        self.inner.enqueue(Job {
            dispatch: Dispatch {
                to: request.to,
                kind,
                batch,
                changed,
                started,
                deadline: started + options.throttle,
            },
            slot: RunSlot::scheduled(&self.inner),
            cancel: cancel.clone(),
            reply: reply_tx,
        });

        let join = tokio::spawn(async move {
            let result = reply_rx
                .await
                .unwrap_or_else(|_| Err(DeployError::Join("dispatch worker stopped".into())));
            match on_complete {
                Some(cb) => cb(&result),
                None => match &result {
                    Ok(report) => info!(
                        to = %report.to,
                        files = report.subpaths.len(),
                        elapsed = ?report.elapsed,
                        "upload completed"
                    ),
                    Err(e) => warn!(to = %to, error = %e, "upload failed"),
                },
            }
            result
        });

        Ok(UploadHandle { cancel, join })
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("options", &self.inner.options)
            .field("state", &self.state())
            .field("recorded", &self.inner.store.len())
            .finish()
    }
}

/// Counts one run as scheduled, then in flight, and releases it on drop.
///
/// Dropping covers every way a run can end: success, failure,
/// cancellation, a panicking transport, or a job that never reached a
/// worker.
struct RunSlot {
    inner: Arc<UploaderInner>,
    in_flight: bool,
}

impl RunSlot {
    fn scheduled(inner: &Arc<UploaderInner>) -> Self {
        inner.update_runs(|r| r.scheduled += 1);
        Self {
            inner: Arc::clone(inner),
            in_flight: false,
        }
    }

    fn start(&mut self) {
        self.inner.update_runs(|r| {
            r.scheduled -= 1;
            r.in_flight += 1;
        });
        self.in_flight = true;
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        let in_flight = self.in_flight;
        self.inner.update_runs(|r| {
            if in_flight {
                r.in_flight -= 1;
            } else {
                r.scheduled -= 1;
            }
        });
    }
}

/// One scheduled run waiting for the dispatch worker.
struct Job {
    dispatch: Dispatch,
    slot: RunSlot,
    cancel: CancellationToken,
    reply: oneshot::Sender<Result<UploadReport, DeployError>>,
}

/// Everything a scheduled run carries to the transport.
struct Dispatch {
    to: String,
    kind: TransportKind,
    batch: Vec<UploadTarget>,
    changed: Vec<ChangedFile>,
    started: Instant,
    deadline: Instant,
}

impl Dispatch {
    async fn execute(
        self,
        mut slot: RunSlot,
        cancel: CancellationToken,
    ) -> Result<UploadReport, DeployError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(to = %self.to, "scheduled upload cancelled");
                return Err(DeployError::Cancelled);
            }
            _ = tokio::time::sleep_until(self.deadline) => {}
        }

        slot.start();
        let inner = Arc::clone(&slot.inner);
        let transport: Arc<dyn Transport> = Arc::clone(inner.options.transports.select(self.kind));
        let upload_options = UploadOptions {
            host: inner.options.host.clone(),
            receiver: inner.options.receiver.clone(),
            retry: DEFAULT_RETRY,
            state: inner.state_tx.subscribe(),
        };
        let subpaths: Vec<String> = self.batch.iter().map(|t| t.subpath.clone()).collect();
        let batch = self.batch;

        // Own task, so a panicking transport surfaces as a `JoinError`
        // instead of taking the worker down.
        let call = tokio::spawn(async move { transport.upload(&batch, &upload_options).await });
        let outcome = match call.await {
            Ok(result) => result.map_err(DeployError::from),
            Err(e) => Err(DeployError::Join(e.to_string())),
        };
        let recorded = outcome.map(|()| inner.store.record_delivered(&self.changed));
        drop(slot);

        Ok(UploadReport {
            to: self.to,
            kind: self.kind,
            subpaths,
            recorded: recorded?,
            elapsed: self.started.elapsed(),
        })
    }
}

async fn dispatch_loop(mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        let Job {
            dispatch,
            slot,
            cancel,
            reply,
        } = job;
        let result = dispatch.execute(slot, cancel).await;
        // The run's task may be gone if the runtime is shutting down.
        let _ = reply.send(result);
    }
    debug!("dispatch worker stopped");
}
