use crate::error::{Result, StackError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_ENV_FILE: &str = ".env";

/// Key/value pairs read from an env file. Later duplicates win.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    pub path: PathBuf,
    pub vars: BTreeMap<String, String>,
}

/// Parse `path` as a dotenv file.
///
/// A missing file is `ConfigurationMissing`: nothing else may run without it.
pub fn read_env_file(path: &Path) -> Result<EnvFile> {
    if !path.is_file() {
        return Err(StackError::ConfigurationMissing {
            path: path.to_path_buf(),
        });
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| unreadable(path, e))?;
    let mut vars = BTreeMap::new();
    for item in iter {
        let (k, v) = item.map_err(|e| unreadable(path, e))?;
        vars.insert(k, v);
    }

    Ok(EnvFile {
        path: path.to_path_buf(),
        vars,
    })
}

fn unreadable(path: &Path, e: dotenvy::Error) -> StackError {
    StackError::ConfigurationUnreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Load `path` into the process env. Variables already set in the
/// environment win over the file, as with `dotenvy::from_path`.
pub fn load_env(path: &Path) -> Result<EnvFile> {
    let file = read_env_file(path)?;
    let mut applied = 0;
    for (k, v) in &file.vars {
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
            applied += 1;
        }
    }
    debug!(
        "loaded {} ({} keys, {} applied)",
        path.display(),
        file.vars.len(),
        applied
    );
    Ok(file)
}

/// Like `load_env`, but a missing file is not an error. Used by commands
/// that only need the optional runtime settings.
pub fn load_env_if_present(path: &Path) -> Result<Option<EnvFile>> {
    match load_env(path) {
        Ok(f) => Ok(Some(f)),
        Err(StackError::ConfigurationMissing { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
