use crate::error::ConfigError;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Keys the env file must provide. None of them has a default.
pub const REQUIRED_KEYS: [&str; 6] = [
    "MYSQL_ROOT_PASSWORD",
    "MYSQL_DATABASE",
    "MYSQL_USER",
    "MYSQL_PASSWORD",
    "MOODLE_PORT",
    "MOODLE_IMAGE",
];

/// Name of the runtime-managed volume holding Moodle's data files.
pub const APP_VOLUME: &str = "moodledata";

const LOCK_FILE: &str = ".moodle-stack.lock";
const COMPOSE_FILE: &str = "docker-compose.yml";

/// Validated deployment configuration, built from the env file.
#[derive(Clone, PartialEq, Eq)]
pub struct MoodleConfig {
    pub mysql_root_password: String,
    pub mysql_database: String,
    pub mysql_user: String,
    pub mysql_password: String,
    pub moodle_port: u16,
    pub moodle_image: String,
}

impl MoodleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. The first missing or blank key in
    /// `REQUIRED_KEYS` order is reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values: [String; 6] = Default::default();
        for (slot, key) in values.iter_mut().zip(REQUIRED_KEYS) {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => *slot = v,
                _ => return Err(ConfigError::MissingKey { key }),
            }
        }
        let [mysql_root_password, mysql_database, mysql_user, mysql_password, raw_port, moodle_image] =
            values;
        let moodle_image = moodle_image.trim().to_string();

        let moodle_port = raw_port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or(ConfigError::InvalidValue {
                key: "MOODLE_PORT",
                value: raw_port.clone(),
            })?;

        Ok(MoodleConfig {
            mysql_root_password,
            mysql_database,
            mysql_user,
            mysql_password,
            moodle_port,
            moodle_image,
        })
    }
}

// Keep credentials out of debug logs.
impl fmt::Debug for MoodleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoodleConfig")
            .field("mysql_root_password", &"***")
            .field("mysql_database", &self.mysql_database)
            .field("mysql_user", &self.mysql_user)
            .field("mysql_password", &"***")
            .field("moodle_port", &self.moodle_port)
            .field("moodle_image", &self.moodle_image)
            .finish()
    }
}

/// Optional knobs, all with defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub docker_bin: String,
    pub project_name: String,
    pub mysql_image: String,
    pub db_data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub helper_image: String,
    pub startup_wait: Duration,
    pub log_tail: usize,
}

impl Settings {
    pub fn from_env(root: &Path) -> Self {
        Self::from_lookup(root, |k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(root: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = absolute_root(root);
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        let project_name = non_empty("COMPOSE_PROJECT_NAME")
            .map(|s| sanitize_project_name(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "moodle".to_string());

        let startup_wait = non_empty("STARTUP_WAIT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(10);

        let log_tail = non_empty("LOG_TAIL_LINES")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(50);

        Settings {
            docker_bin: non_empty("DOCKER_BIN").unwrap_or_else(|| "docker".to_string()),
            project_name,
            mysql_image: non_empty("MYSQL_IMAGE").unwrap_or_else(|| "mysql:8.0".to_string()),
            db_data_dir: root.join(non_empty("DB_DATA_DIR").unwrap_or_else(|| "mysql_data".to_string())),
            backup_dir: root.join(non_empty("BACKUP_DIR").unwrap_or_else(|| "backups".to_string())),
            helper_image: non_empty("BACKUP_HELPER_IMAGE").unwrap_or_else(|| "alpine:3".to_string()),
            startup_wait: Duration::from_secs(startup_wait),
            log_tail,
            root,
        }
    }

    pub fn compose_file(&self) -> PathBuf {
        self.root.join(COMPOSE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Full name compose gives the app volume.
    pub fn app_volume_name(&self) -> String {
        format!("{}_{}", self.project_name, APP_VOLUME)
    }
}

/// Compose treats a bind source without a leading `/` or `./` as a named
/// volume, so every host path handed to docker hangs off an absolute root.
pub fn absolute_root(root: &Path) -> PathBuf {
    std::path::absolute(root).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(root))
            .unwrap_or_else(|_| root.to_path_buf())
    })
}

/// Compose project names are lowercase alphanumerics, `-` and `_`.
pub fn sanitize_project_name(raw: &str) -> String {
    let re = Regex::new(r"[^a-z0-9_-]+").expect("static regex");
    let lowered = raw.trim().to_lowercase();
    re.replace_all(&lowered, "")
        .trim_start_matches(['-', '_'])
        .to_string()
}

pub fn find_project_root(start_dir: &Path) -> PathBuf {
    // Walk up until we find an env file or a compose file.
    let mut dir = start_dir.to_path_buf();

    for _ in 0..12 {
        if dir.join(crate::env::DEFAULT_ENV_FILE).is_file() || dir.join(COMPOSE_FILE).is_file() {
            return dir;
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent.to_path_buf(),
            _ => break,
        }
    }

    start_dir.to_path_buf()
}

#[cfg(test)]
pub(crate) fn sample_lookup(key: &str) -> Option<String> {
    let v = match key {
        "MYSQL_ROOT_PASSWORD" => "rootpw",
        "MYSQL_DATABASE" => "moodle",
        "MYSQL_USER" => "moodleuser",
        "MYSQL_PASSWORD" => "userpw",
        "MOODLE_PORT" => "8080",
        "MOODLE_IMAGE" => "example/moodle:latest",
        _ => return None,
    };
    Some(v.to_string())
}
