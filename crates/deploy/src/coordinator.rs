//! Multi-destination upload coordinator.
//!
//! Keeps one [`Uploader`] per destination and gates everything behind a
//! verification probe: the very first submission is dispatched at once,
//! every submission that arrives before it completes is queued, and the
//! queue is released in submission order when it does.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::UploaderOptions;
use crate::error::DeployError;
use crate::types::{GateState, Submission, UploadReport, UploadRequest};
use crate::uploader::{CompletionCallback, Uploader};

#[derive(Default)]
struct GateInner {
    verified: bool,
    inited: bool,
    pending: VecDeque<UploadRequest>,
    uploaders: HashMap<String, Uploader>,
}

impl GateInner {
    fn uploader_for(&mut self, to: &str, options: &UploaderOptions) -> Uploader {
        self.uploaders
            .entry(to.to_string())
            .or_insert_with(|| {
                debug!(to = %to, "creating uploader");
                Uploader::new(options.clone())
            })
            .clone()
    }
}

struct Shared {
    options: UploaderOptions,
    gate: Mutex<GateInner>,
}

impl Shared {
    /// Opens the gate and releases everything queued so far.
    fn after_verify(&self, result: &Result<UploadReport, DeployError>) {
        match result {
            Ok(report) => info!(
                to = %report.to,
                files = report.subpaths.len(),
                "verification upload completed"
            ),
            Err(e) => warn!(error = %e, "verification upload failed, releasing queue anyway"),
        }

        let released: Vec<(Uploader, UploadRequest)> = {
            let mut gate = self.gate.lock().unwrap();
            gate.inited = true;
            let pending = std::mem::take(&mut gate.pending);
            pending
                .into_iter()
                .map(|req| (gate.uploader_for(&req.to, &self.options), req))
                .collect()
        };

        debug!(count = released.len(), "releasing queued uploads");
        for (uploader, req) in released {
            let to = req.to.clone();
            if let Err(e) = uploader.run(req, None) {
                warn!(to = %to, error = %e, "queued upload rejected");
            }
        }
    }
}

/// Routes submissions to per-destination uploaders behind a one-time
/// verification gate.
#[derive(Clone)]
pub struct UploadCoordinator {
    shared: Arc<Shared>,
}

impl UploadCoordinator {
    /// Creates a coordinator whose uploaders all share `options`.
    pub fn new(options: UploaderOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                gate: Mutex::new(GateInner::default()),
            }),
        }
    }

    /// Submits a request.
    ///
    /// - First submission: queued *and* dispatched as the verification
    ///   probe. Its completion opens the gate and re-runs the queue,
    ///   probe included.
    /// - While the probe is running: queued.
    /// - Afterwards: dispatched immediately.
    ///
    /// Must be called from within a tokio runtime. If the probe cannot
    /// even be scheduled the gate and the queue are left untouched and the
    /// error is returned.
    pub fn submit(&self, request: UploadRequest) -> Result<Submission, DeployError> {
        let mut gate = self.shared.gate.lock().unwrap();
        let uploader = gate.uploader_for(&request.to, &self.shared.options);

        if !gate.verified {
            info!(to = %request.to, files = request.files.len(), "dispatching verification upload");
            let shared = Arc::clone(&self.shared);
            let on_complete: CompletionCallback = Box::new(move |result| {
                shared.after_verify(result);
            });
            // The gate stays locked until the probe is scheduled: `run` never
            // touches the gate and the callback fires later on its own task.
            let handle = uploader.run(request.clone(), Some(on_complete))?;
            gate.verified = true;
            gate.pending.push_back(request);
            return Ok(Submission::Probe(handle));
        }

        if !gate.inited {
            gate.pending.push_back(request);
            let position = gate.pending.len() - 1;
            debug!(position, "upload queued until verification completes");
            return Ok(Submission::Queued { position });
        }

        drop(gate);
        uploader.run(request, None).map(Submission::Dispatched)
    }

    /// Returns the state of the verification gate.
    pub fn gate(&self) -> GateState {
        let gate = self.shared.gate.lock().unwrap();
        match (gate.verified, gate.inited) {
            (_, true) => GateState::Open,
            (true, false) => GateState::Verifying,
            (false, false) => GateState::Unverified,
        }
    }

    /// Number of requests waiting for the gate.
    pub fn pending_len(&self) -> usize {
        self.shared.gate.lock().unwrap().pending.len()
    }

    /// Returns the uploader for `to`, if one was created.
    pub fn uploader(&self, to: &str) -> Option<Uploader> {
        self.shared.gate.lock().unwrap().uploaders.get(to).cloned()
    }

    /// Returns every uploader created so far.
    pub fn uploaders(&self) -> Vec<Uploader> {
        self.shared
            .gate
            .lock()
            .unwrap()
            .uploaders
            .values()
            .cloned()
            .collect()
    }

    /// Waits until every uploader is idle.
    ///
    /// Only meaningful once the gate is open: queued requests are not
    /// scheduled before that.
    pub async fn wait_idle(&self) {
        for uploader in self.uploaders() {
            uploader.wait_idle().await;
        }
    }
}
