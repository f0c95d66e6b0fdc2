use crate::config::{MoodleConfig, Settings};
use crate::docker::Orchestrator;
use crate::error::{Result, StackError};
use crate::topology::{ComposeFile, APP_SERVICE};
use std::fs;
use tracing::{info, warn};

/// Write the compose file for `cfg`, creating the database directory so the
/// bind mount is owned by the invoking user rather than the daemon.
pub fn write_compose_file(cfg: &MoodleConfig, settings: &Settings) -> Result<ComposeFile> {
    let compose = ComposeFile::build(cfg, settings);
    let yaml = compose
        .to_yaml()
        .map_err(|e| StackError::TopologyStartFailed {
            code: None,
            detail: format!("rendering compose file: {e}"),
        })?;
    fs::create_dir_all(&settings.db_data_dir)?;
    fs::write(settings.compose_file(), yaml)?;
    Ok(compose)
}

/// Pull the image, replace any previous deployment and start `db` + `app`.
///
/// No rollback: if `up` fails halfway, whatever started keeps running.
pub async fn deploy(orch: &dyn Orchestrator, cfg: &MoodleConfig, settings: &Settings) -> Result<()> {
    info!("Pulling {}...", cfg.moodle_image);
    let pulled = orch
        .pull_image(&cfg.moodle_image)
        .await
        .map_err(|e| StackError::ImageFetchFailed {
            image: cfg.moodle_image.clone(),
            code: None,
            detail: e.to_string(),
        })?;
    if !pulled.success() {
        return Err(StackError::ImageFetchFailed {
            image: cfg.moodle_image.clone(),
            code: pulled.code,
            detail: pulled.detail(),
        });
    }

    let compose = write_compose_file(cfg, settings)?;

    info!("Stopping previous deployment...");
    let down = orch.compose_down().await.map_err(|e| StackError::TeardownFailed {
        code: None,
        detail: e.to_string(),
    })?;
    if !down.success() {
        // Nothing to tear down is the common case on first install.
        warn!("teardown reported: {}", down.detail());
    }

    info!("Starting services ({})...", compose.start_order().join(" -> "));
    let up = orch.compose_up().await.map_err(|e| StackError::TopologyStartFailed {
        code: None,
        detail: e.to_string(),
    })?;
    if !up.success() {
        return Err(StackError::TopologyStartFailed {
            code: up.code,
            detail: up.detail(),
        });
    }

    // Fixed delay, not a health check.
    if !settings.startup_wait.is_zero() {
        info!("Waiting {}s for Moodle to start...", settings.startup_wait.as_secs());
        tokio::time::sleep(settings.startup_wait).await;
    }

    match orch.compose_logs(APP_SERVICE, settings.log_tail).await {
        Ok(out) if out.success() && !out.stdout.trim().is_empty() => {
            println!("{}", out.stdout);
        }
        Ok(out) if !out.success() => warn!("could not read {APP_SERVICE} logs: {}", out.detail()),
        Ok(_) => warn!("no log output from {APP_SERVICE} yet"),
        Err(e) => warn!("could not read {APP_SERVICE} logs: {e}"),
    }

    info!("Moodle is available on port {}", cfg.moodle_port);
    Ok(())
}
