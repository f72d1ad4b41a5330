//! cdnpush entry point.
//!
//! Usage: `cdnpush <to>=<dir> [<to>=<dir> ...]`
//!
//! Each directory is submitted as one request for destination `<to>`
//! through the dry-run transport. Settings come from the TOML file named
//! by `CDNPUSH_CONFIG` (default `cdnpush.toml`); a missing file means
//! defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use cdnpush_deploy::{CoordinatorConfig, Submission, UploadCoordinator, UploadRequest, collect_files};
use cdnpush_transfer::{DryRunTransport, Transports};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting cdnpush");

    let targets = parse_targets(std::env::args().skip(1))?;
    let config = load_config(&config_path())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, targets))
}

fn config_path() -> PathBuf {
    std::env::var_os("CDNPUSH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cdnpush.toml"))
}

fn load_config(path: &Path) -> anyhow::Result<CoordinatorConfig> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config not found, using defaults");
        return Ok(CoordinatorConfig::default());
    }
    let config = CoordinatorConfig::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    tracing::info!(host = %config.host, receiver = %config.receiver, "configuration loaded");
    Ok(config)
}

fn parse_targets(args: impl Iterator<Item = String>) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let targets = args
        .map(|arg| match arg.split_once('=') {
            Some((to, dir)) if !to.is_empty() && !dir.is_empty() => {
                Ok((to.to_string(), PathBuf::from(dir)))
            }
            _ => bail!("expected <to>=<dir>, got {arg:?}"),
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if targets.is_empty() {
        bail!("usage: cdnpush <to>=<dir> [<to>=<dir> ...]");
    }
    Ok(targets)
}

async fn run(config: CoordinatorConfig, targets: Vec<(String, PathBuf)>) -> anyhow::Result<()> {
    let transports = Transports::single(Arc::new(DryRunTransport));
    let coordinator = UploadCoordinator::new(config.into_options(transports)?);

    let mut probe = None;
    for (to, dir) in targets {
        let files = collect_files(&dir).with_context(|| format!("failed to read {}", dir.display()))?;
        tracing::info!(to = %to, dir = %dir.display(), files = files.len(), "submitting");

        let request = UploadRequest {
            to,
            files,
            disable_fsr: false,
        };
        if let Submission::Probe(handle) = coordinator.submit(request)? {
            probe = Some(handle);
        }
    }

    if let Some(handle) = probe
        && let Err(e) = handle.join().await
    {
        tracing::warn!(error = %e, "verification upload failed");
    }
    coordinator.wait_idle().await;

    tracing::info!("all uploads finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_destination_pairs() {
        let targets = parse_targets(args(&["/www=dist", "/static=out/static"])).unwrap();
        assert_eq!(
            targets,
            vec![
                ("/www".to_string(), PathBuf::from("dist")),
                ("/static".to_string(), PathBuf::from("out/static")),
            ]
        );
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(parse_targets(args(&["dist"])).is_err());
        assert!(parse_targets(args(&["=dist"])).is_err());
        assert!(parse_targets(args(&[])).is_err());
    }

    #[test]
    fn missing_config_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/cdnpush.toml")).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }
}
