use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// One file of an outgoing batch, as handed to a [`Transport`](crate::Transport).
///
/// `content` is base64-encoded in JSON so transports can forward it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub host: String,
    pub receiver: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    pub to: String,
    pub subpath: String,
}

/// Run state of one uploader, observable by its transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadState {
    /// Nothing scheduled or in flight.
    #[default]
    Idle,
    /// At least one run is waiting out its throttle delay.
    Scheduled,
    /// A transport call is running and nothing else is waiting.
    InFlight,
}

/// Selects which of the two transport strategies handles a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportKind {
    /// Secure deploy service (the default).
    Fsr,
    /// Plain HTTP receiver.
    Receiver,
}

impl TransportKind {
    /// Maps the per-request `disableFsr` switch onto a strategy.
    pub fn from_disable_fsr(disable_fsr: bool) -> Self {
        if disable_fsr {
            Self::Receiver
        } else {
            Self::Fsr
        }
    }
}

/// Options passed alongside every batch.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub host: String,
    pub receiver: String,
    pub retry: u32,
    /// Read-only view of the owning uploader's state.
    pub state: watch::Receiver<UploadState>,
}

impl UploadOptions {
    /// Returns the owning uploader's current state.
    pub fn current_state(&self) -> UploadState {
        *self.state.borrow()
    }
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_target_json_shape() {
        let target = UploadTarget {
            host: "http://deploy".into(),
            receiver: "/receiver".into(),
            content: b"Hello".to_vec(),
            to: "/home/www".into(),
            subpath: "static/app.js".into(),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["content"], "SGVsbG8=");
        assert_eq!(json["subpath"], "static/app.js");
        assert_eq!(json["to"], "/home/www");
        let parsed: UploadTarget = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, target);
    }

    #[test]
    fn transport_kind_from_flag() {
        assert_eq!(TransportKind::from_disable_fsr(false), TransportKind::Fsr);
        assert_eq!(TransportKind::from_disable_fsr(true), TransportKind::Receiver);
    }

    #[test]
    fn options_expose_state_read_only() {
        let (tx, rx) = watch::channel(UploadState::Idle);
        let opts = UploadOptions {
            host: String::new(),
            receiver: String::new(),
            retry: crate::DEFAULT_RETRY,
            state: rx,
        };
        assert_eq!(opts.current_state(), UploadState::Idle);
        tx.send_replace(UploadState::InFlight);
        assert_eq!(opts.current_state(), UploadState::InFlight);
        assert_eq!(opts.retry, 2);
    }
}
