use crate::backup;
use crate::cli::Commands;
use crate::config::{MoodleConfig, Settings};
use crate::deploy;
use crate::docker::DockerCli;
use crate::env::{load_env, load_env_if_present};
use crate::error::{Result, StackError};
use crate::lock::StackLock;
use crate::preflight;
use crate::reset;
use crate::status;
use crate::topology::ComposeFile;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Invocation {
    pub root: PathBuf,
    pub env_file: PathBuf,
}

pub async fn dispatch(inv: &Invocation, command: Commands) -> Result<()> {
    match command {
        Commands::Install => install(inv).await,
        Commands::Reset { yes } => reset(inv, yes).await,
        Commands::Backup => backup(inv).await,
        Commands::Status => status(inv).await,
        Commands::Compose => compose(inv),
    }
}

/// Env file and required keys, in that order, before anything touches docker.
fn load_config(inv: &Invocation) -> Result<(MoodleConfig, Settings)> {
    let file = load_env(&inv.env_file)?;
    debug!("configuration from {}", file.path.display());
    let cfg = MoodleConfig::from_env()?;
    let settings = Settings::from_env(&inv.root);
    Ok((cfg, settings))
}

async fn connect(settings: &Settings) -> Result<DockerCli> {
    let flavor = preflight::run(&settings.docker_bin, &settings.root).await?;
    Ok(DockerCli {
        docker_bin: settings.docker_bin.clone(),
        cwd: settings.root.clone(),
        flavor,
        compose_file: settings.compose_file(),
        project: settings.project_name.clone(),
        helper_image: settings.helper_image.clone(),
    })
}

pub async fn install(inv: &Invocation) -> Result<()> {
    let (cfg, settings) = load_config(inv)?;
    let orch = connect(&settings).await?;
    let _lock = StackLock::acquire(&settings.lock_path())?;
    deploy::deploy(&orch, &cfg, &settings).await
}

pub async fn reset(inv: &Invocation, yes: bool) -> Result<()> {
    let (cfg, settings) = load_config(inv)?;
    let orch = connect(&settings).await?;

    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    reset::confirm(yes, interactive, &settings.db_data_dir, stdin.lock())?;

    let _lock = StackLock::acquire(&settings.lock_path())?;
    reset::reset(&orch, &cfg, &settings).await
}

pub async fn backup(inv: &Invocation) -> Result<()> {
    load_env_if_present(&inv.env_file)?;
    let settings = Settings::from_env(&inv.root);
    let orch = connect(&settings).await?;
    let _lock = StackLock::acquire(&settings.lock_path())?;
    let dir = backup::backup(&orch, &settings).await?;
    println!("{}", dir.display());
    Ok(())
}

pub async fn status(inv: &Invocation) -> Result<()> {
    load_env_if_present(&inv.env_file)?;
    let settings = Settings::from_env(&inv.root);
    if !settings.compose_file().is_file() {
        info!("No compose file at {}; run install first", settings.compose_file().display());
    }
    let orch = connect(&settings).await?;
    let services = status::status(&orch).await?;
    for line in status::render(&services) {
        println!("{line}");
    }
    Ok(())
}

pub fn compose(inv: &Invocation) -> Result<()> {
    let (cfg, settings) = load_config(inv)?;
    let yaml = ComposeFile::build(&cfg, &settings)
        .to_yaml()
        .map_err(|e| StackError::TopologyStartFailed {
            code: None,
            detail: format!("rendering compose file: {e}"),
        })?;
    print!("{yaml}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REQUIRED_KEYS;
    use serial_test::serial;
    use std::fs;

    fn clear_env() {
        for k in REQUIRED_KEYS.iter().chain(["DOCKER_BIN"].iter()) {
            std::env::remove_var(k);
        }
    }

    fn invocation(root: &std::path::Path) -> Invocation {
        Invocation {
            root: root.to_path_buf(),
            env_file: root.join(".env"),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_install_without_env_file_touches_nothing() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();

        let err = install(&invocation(dir.path())).await.unwrap_err();

        assert!(matches!(err, StackError::ConfigurationMissing { .. }));
        assert_eq!(err.exit_code(), 1);
        assert!(!dir.path().join("docker-compose.yml").exists());
        assert!(!dir.path().join(".moodle-stack.lock").exists());
    }

    #[tokio::test]
    #[serial]
    async fn test_install_reports_missing_key() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "MYSQL_ROOT_PASSWORD=rootpw\n").unwrap();

        let err = install(&invocation(dir.path())).await.unwrap_err();
        clear_env();

        assert_eq!(err.to_string(), "Required configuration missing: MYSQL_DATABASE");
    }

    #[tokio::test]
    #[serial]
    async fn test_install_missing_docker_fails_before_pull() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "MYSQL_ROOT_PASSWORD=rootpw\nMYSQL_DATABASE=moodle\nMYSQL_USER=moodle\n\
             MYSQL_PASSWORD=pw\nMOODLE_PORT=8080\nMOODLE_IMAGE=example/moodle:latest\n\
             DOCKER_BIN=no-such-docker-binary-42\n",
        )
        .unwrap();

        let err = install(&invocation(dir.path())).await.unwrap_err();
        clear_env();

        assert!(matches!(err, StackError::DependencyMissing { tool } if tool == "no-such-docker-binary-42"));
        assert!(!dir.path().join("docker-compose.yml").exists());
    }

    #[test]
    #[serial]
    fn test_compose_requires_config() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let err = compose(&invocation(dir.path())).unwrap_err();
        assert!(matches!(err, StackError::ConfigurationMissing { .. }));
    }
}
