//! Data types for the upload flow.

use std::collections::BTreeMap;
use std::time::Duration;

use cdnpush_transfer::TransportKind;
use serde::{Deserialize, Serialize};

use crate::uploader::UploadHandle;

/// One submission: a set of files for a single destination.
///
/// Keys of `files` are raw filenames and may carry a `?query` suffix.
/// Empty content marks an intentionally empty artifact; it is uploaded
/// but never fingerprinted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub to: String,
    pub files: BTreeMap<String, Vec<u8>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_fsr: bool,
}

fn is_false(v: &bool) -> bool {
    !v
}

impl UploadRequest {
    /// Creates an empty request for destination `to`.
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            ..Self::default()
        }
    }

    /// Adds a file to the request.
    pub fn file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }

    /// Routes the request through the plain receiver transport.
    pub fn disable_fsr(mut self, disable: bool) -> Self {
        self.disable_fsr = disable;
        self
    }

    /// Returns the transport strategy this request selects.
    pub fn transport_kind(&self) -> TransportKind {
        TransportKind::from_disable_fsr(self.disable_fsr)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub to: String,
    pub kind: TransportKind,
    /// Subpaths sent in the batch, in batch order.
    pub subpaths: Vec<String>,
    /// Number of fingerprints written to the store.
    pub recorded: usize,
    /// Wall-clock time from scheduling to transport completion.
    pub elapsed: Duration,
}

/// What the coordinator did with a submission.
#[derive(Debug)]
pub enum Submission {
    /// First submission: dispatched right away as the verification probe.
    Probe(UploadHandle),
    /// Held until the probe completes. `position` is the 0-based queue index.
    Queued { position: usize },
    /// Gate already open: dispatched right away.
    Dispatched(UploadHandle),
}

impl Submission {
    /// Returns the handle if the submission was dispatched.
    pub fn into_handle(self) -> Option<UploadHandle> {
        match self {
            Self::Probe(h) | Self::Dispatched(h) => Some(h),
            Self::Queued { .. } => None,
        }
    }
}

/// Verification gate of an [`UploadCoordinator`](crate::UploadCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nothing submitted yet.
    Unverified,
    /// Probe in flight; new submissions are queued.
    Verifying,
    /// Probe completed; submissions dispatch immediately.
    Open,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let req = UploadRequest::new("/www")
            .file("a.js?v=1", "x")
            .file("logo.png", vec![0u8, 1, 2])
            .disable_fsr(true);
        assert_eq!(req.to, "/www");
        assert_eq!(req.files.len(), 2);
        assert_eq!(req.transport_kind(), TransportKind::Receiver);
    }

    #[test]
    fn request_json_omits_default_flag() {
        let req = UploadRequest::new("/www").file("a.js", "x");
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("disableFsr"));
        let parsed: UploadRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, req);
        assert_eq!(parsed.transport_kind(), TransportKind::Fsr);
    }
}
