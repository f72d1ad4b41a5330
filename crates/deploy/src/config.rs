//! Uploader configuration.
//!
//! [`UploaderOptions`] is the in-memory form shared by every uploader of a
//! coordinator. [`CoordinatorConfig`] is its TOML form:
//!
//! ```toml
//! host = "https://deploy.example.com"
//! receiver = "/receiver"
//! throttle = 200
//!
//! [[replace]]
//! from = "__CDN__"
//! to = "https://cdn.example.com"
//!
//! [[replace]]
//! regex = "src=\"/static/"
//! to = "src=\"https://cdn.example.com/static/"
//! ```

use std::path::Path;
use std::time::Duration;

use cdnpush_transfer::Transports;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;
use crate::rewrite::ReplacementRule;

/// Default debounce between `run` and the transport call, in milliseconds.
pub const DEFAULT_THROTTLE_MS: u64 = 200;

/// Options shared by all uploaders of one coordinator.
#[derive(Clone)]
pub struct UploaderOptions {
    pub host: String,
    pub receiver: String,
    pub throttle: Duration,
    /// `None` means no rule list was configured; rewriting a text file then
    /// fails with [`DeployError::ReplacementRulesMissing`].
    pub replace: Option<Vec<ReplacementRule>>,
    pub transports: Transports,
}

impl UploaderOptions {
    /// Creates options with empty routing, the default throttle and an
    /// empty rule list.
    pub fn new(transports: Transports) -> Self {
        Self {
            host: String::new(),
            receiver: String::new(),
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
            replace: Some(Vec::new()),
            transports,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = receiver.into();
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_replace(mut self, rules: Vec<ReplacementRule>) -> Self {
        self.replace = Some(rules);
        self
    }

    /// Drops the rule list entirely.
    pub fn without_replace(mut self) -> Self {
        self.replace = None;
        self
    }
}

impl std::fmt::Debug for UploaderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploaderOptions")
            .field("host", &self.host)
            .field("receiver", &self.receiver)
            .field("throttle", &self.throttle)
            .field("replace", &self.replace)
            .finish_non_exhaustive()
    }
}

/// One `[[replace]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleConfig {
    /// Case-insensitive pattern.
    Text { from: String, to: String },
    /// Pattern used verbatim.
    Regex { regex: String, to: String },
}

impl RuleConfig {
    fn compile(self) -> Result<ReplacementRule, DeployError> {
        match self {
            RuleConfig::Text { from, to } => ReplacementRule::new(from, to),
            RuleConfig::Regex { regex, to } => ReplacementRule::new(Regex::new(&regex)?, to),
        }
    }
}

/// File form of [`UploaderOptions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub receiver: String,

    /// Milliseconds; 0 falls back to the default.
    #[serde(default = "default_throttle")]
    pub throttle: u64,

    #[serde(default)]
    pub replace: Vec<RuleConfig>,
}

fn default_throttle() -> u64 {
    DEFAULT_THROTTLE_MS
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            receiver: String::new(),
            throttle: DEFAULT_THROTTLE_MS,
            replace: Vec::new(),
        }
    }
}

impl CoordinatorConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, DeployError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            rules = config.replace.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Compiles the rule list and binds the transports.
    pub fn into_options(self, transports: Transports) -> Result<UploaderOptions, DeployError> {
        let throttle = if self.throttle == 0 {
            DEFAULT_THROTTLE_MS
        } else {
            self.throttle
        };
        let replace = self
            .replace
            .into_iter()
            .map(RuleConfig::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UploaderOptions::new(transports)
            .with_host(self.host)
            .with_receiver(self.receiver)
            .with_throttle(Duration::from_millis(throttle))
            .with_replace(replace))
    }
}
