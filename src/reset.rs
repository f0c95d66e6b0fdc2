use crate::config::{MoodleConfig, Settings};
use crate::deploy::deploy;
use crate::docker::Orchestrator;
use crate::error::{Result, StackError};
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

const CONFIRM_WORD: &str = "reset";

/// Gate for the destructive part of reset. With `assume_yes` unset, only an
/// interactive user typing the confirmation word lets it through.
pub fn confirm<R: BufRead>(
    assume_yes: bool,
    interactive: bool,
    data_dir: &Path,
    mut input: R,
) -> Result<()> {
    if assume_yes {
        return Ok(());
    }
    if !interactive {
        return Err(StackError::ResetNotConfirmed);
    }

    eprint!(
        "This deletes every database file under {}. Type '{CONFIRM_WORD}' to continue: ",
        data_dir.display()
    );
    std::io::stderr().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    if line.trim() == CONFIRM_WORD {
        Ok(())
    } else {
        Err(StackError::ResetNotConfirmed)
    }
}

/// Remove everything inside `dir`, keeping `dir` itself. A missing directory
/// counts as already empty. Returns the number of top-level entries removed.
pub fn wipe_directory(dir: &Path) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}

/// Tear down, delete all database files, deploy again. Data loss is total.
pub async fn reset(orch: &dyn Orchestrator, cfg: &MoodleConfig, settings: &Settings) -> Result<()> {
    info!("Stopping services...");
    let down = orch.compose_down().await.map_err(|e| StackError::TeardownFailed {
        code: None,
        detail: e.to_string(),
    })?;
    if !down.success() {
        return Err(StackError::TeardownFailed {
            code: down.code,
            detail: down.detail(),
        });
    }

    let dir = &settings.db_data_dir;
    warn!("Deleting database files under {}", dir.display());
    let removed = wipe_directory(dir).map_err(|source| StackError::StorageResetFailed {
        path: dir.clone(),
        source,
    })?;
    info!("Removed {removed} entries");

    deploy(orch, cfg, settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_config, sample_settings, FakeOrchestrator};
    use std::io::Cursor;

    fn seed_db_dir(settings: &Settings) {
        let d = &settings.db_data_dir;
        fs::create_dir_all(d.join("moodle")).unwrap();
        fs::write(d.join("ibdata1"), b"x").unwrap();
        fs::write(d.join("moodle/mdl_user.ibd"), b"y").unwrap();
    }

    #[test]
    fn test_confirm_requires_yes_when_not_interactive() {
        let err = confirm(false, false, Path::new("mysql_data"), Cursor::new("reset\n")).unwrap_err();
        assert!(matches!(err, StackError::ResetNotConfirmed));
        assert!(confirm(true, false, Path::new("mysql_data"), Cursor::new("")).is_ok());
    }

    #[test]
    fn test_confirm_prompt() {
        assert!(confirm(false, true, Path::new("mysql_data"), Cursor::new("reset\n")).is_ok());
        let err = confirm(false, true, Path::new("mysql_data"), Cursor::new("y\n")).unwrap_err();
        assert!(matches!(err, StackError::ResetNotConfirmed));
    }

    #[test]
    fn test_wipe_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = sample_settings(dir.path());
        seed_db_dir(&settings);

        assert_eq!(wipe_directory(&settings.db_data_dir).unwrap(), 2);
        assert!(settings.db_data_dir.is_dir());
        assert_eq!(fs::read_dir(&settings.db_data_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_wipe_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(wipe_directory(&dir.path().join("absent")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_wipes_then_redeploys() {
        let dir = tempfile::tempdir().unwrap();
        let settings = sample_settings(dir.path());
        seed_db_dir(&settings);
        let orch = FakeOrchestrator::new();

        reset(&orch, &sample_config(), &settings).await.unwrap();

        assert_eq!(
            orch.calls(),
            vec!["down", "pull example/moodle:latest", "down", "up", "logs app 50"]
        );
        assert_eq!(fs::read_dir(&settings.db_data_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_reset_twice_ends_in_same_state() {
        let dir = tempfile::tempdir().unwrap();
        let settings = sample_settings(dir.path());
        seed_db_dir(&settings);
        let orch = FakeOrchestrator::new();

        reset(&orch, &sample_config(), &settings).await.unwrap();
        let compose_after_first = fs::read_to_string(settings.compose_file()).unwrap();
        let calls_after_first = orch.calls().len();

        reset(&orch, &sample_config(), &settings).await.unwrap();
        let calls = orch.calls();

        assert_eq!(calls[..calls_after_first], calls[calls_after_first..]);
        assert_eq!(fs::read_to_string(settings.compose_file()).unwrap(), compose_after_first);
    }

    #[tokio::test]
    async fn test_failed_teardown_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let settings = sample_settings(dir.path());
        seed_db_dir(&settings);
        let orch = FakeOrchestrator::new().fail("down", 1, "Cannot connect to the Docker daemon");

        let err = reset(&orch, &sample_config(), &settings).await.unwrap_err();

        assert!(matches!(err, StackError::TeardownFailed { .. }));
        assert!(settings.db_data_dir.join("ibdata1").exists());
        assert_eq!(orch.calls(), vec!["down"]);
    }
}
