use crate::config::Settings;
use crate::docker::Orchestrator;
use crate::error::{Result, StackError};
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const DB_COPY_DIR: &str = "mysql_data";
pub const APP_ARCHIVE: &str = "moodledata.tar.gz";

pub fn backup_dir_name(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Create `parent/base`, or `parent/base-1`, `-2`, ... when taken.
/// Never reuses an existing directory.
pub fn create_unique_dir(parent: &Path, base: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(parent)?;
    let mut n = 0u32;
    loop {
        let name = if n == 0 {
            base.to_string()
        } else {
            format!("{base}-{n}")
        };
        let candidate = parent.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Recursive file-level copy of `src` into `dst`. Returns files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut files = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(rel);
        let ft = entry.file_type();
        if ft.is_dir() {
            fs::create_dir_all(&target)?;
        } else if ft.is_file() {
            fs::copy(entry.path(), &target)?;
            files += 1;
        } else {
            debug!("skipping {}", entry.path().display());
        }
    }
    Ok(files)
}

fn failed(detail: impl Into<String>) -> StackError {
    StackError::BackupCopyFailed {
        detail: detail.into(),
    }
}

pub async fn backup(orch: &dyn Orchestrator, settings: &Settings) -> Result<PathBuf> {
    backup_at(orch, settings, Local::now()).await
}

/// Copy the database directory and archive the app volume into a new
/// timestamped directory. A failed run leaves the partial directory behind.
pub async fn backup_at(
    orch: &dyn Orchestrator,
    settings: &Settings,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    let src = &settings.db_data_dir;
    if !src.is_dir() {
        return Err(failed(format!(
            "database directory {} does not exist",
            src.display()
        )));
    }

    let dir = create_unique_dir(&settings.backup_dir, &backup_dir_name(now))
        .map_err(|e| failed(format!("creating backup directory: {e}")))?;
    info!("Backing up to {}", dir.display());

    warn!("Copying live database files; the copy is not transactionally consistent");
    let copied = copy_tree(src, &dir.join(DB_COPY_DIR))
        .map_err(|e| failed(format!("copying {}: {e}", src.display())))?;
    info!("Copied {copied} database files");

    let volume = settings.app_volume_name();
    info!("Archiving volume {volume}...");
    let out = orch
        .archive_volume(&volume, &dir, APP_ARCHIVE)
        .await
        .map_err(|e| failed(format!("archiving {volume}: {e}")))?;
    if !out.success() {
        return Err(failed(format!("archiving {volume}: {}", out.detail())));
    }

    info!("Backup complete: {}", dir.display());
    Ok(dir)
}
