use crate::docker::ComposeFlavor;
use crate::error::{Result, StackError};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Resolve every tool on the search path, failing on the first one missing.
pub fn check_tools(tools: &[&str]) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::with_capacity(tools.len());
    for tool in tools {
        match which::which(tool) {
            Ok(path) => {
                debug!("found {tool} at {}", path.display());
                resolved.push(path);
            }
            Err(_) => {
                return Err(StackError::DependencyMissing {
                    tool: tool.to_string(),
                })
            }
        }
    }
    Ok(resolved)
}

/// Pick the compose front-end: the `docker compose` plugin when it answers,
/// otherwise a standalone `docker-compose` binary.
pub async fn detect_compose(docker_bin: &str, cwd: &Path) -> Result<ComposeFlavor> {
    let plugin_ok = Command::new(docker_bin)
        .current_dir(cwd)
        .args(["compose", "version"])
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false);
    if plugin_ok {
        return Ok(ComposeFlavor::Plugin);
    }

    if which::which("docker-compose").is_ok() {
        return Ok(ComposeFlavor::Standalone);
    }

    Err(StackError::DependencyMissing {
        tool: "docker compose".to_string(),
    })
}

/// Checks run before any container operation.
pub async fn run(docker_bin: &str, cwd: &Path) -> Result<ComposeFlavor> {
    check_tools(&[docker_bin])?;
    let flavor = detect_compose(docker_bin, cwd).await?;
    debug!("using {flavor:?} compose");
    Ok(flavor)
}
