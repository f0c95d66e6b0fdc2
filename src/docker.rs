use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeFlavor {
    /// `docker compose ...`
    Plugin,
    /// `docker-compose ...`
    Standalone,
}

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    #[cfg(test)]
    pub fn ok(stdout: &str) -> Self {
        ProcessOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[cfg(test)]
    pub fn failed(code: i32, stderr: &str) -> Self {
        ProcessOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Text to show the user when the command failed: stderr if there is any,
    /// stdout otherwise.
    pub fn detail(&self) -> String {
        let err = self.stderr.trim();
        if !err.is_empty() {
            return err.to_string();
        }
        let out = self.stdout.trim();
        if !out.is_empty() {
            return out.to_string();
        }
        match self.code {
            Some(c) => format!("exited with status {c}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Every container runtime operation the drivers perform.
///
/// `Err` means the command could not be spawned at all; a command that ran
/// and failed comes back as `Ok` with a non-zero code.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn pull_image(&self, image: &str) -> io::Result<ProcessOutput>;

    async fn compose_down(&self) -> io::Result<ProcessOutput>;

    async fn compose_up(&self) -> io::Result<ProcessOutput>;

    async fn compose_logs(&self, service: &str, tail: usize) -> io::Result<ProcessOutput>;

    async fn compose_ps(&self) -> io::Result<ProcessOutput>;

    /// Tar+gzip the contents of `volume` into `dest_dir/file_name` from a
    /// throwaway helper container.
    async fn archive_volume(
        &self,
        volume: &str,
        dest_dir: &Path,
        file_name: &str,
    ) -> io::Result<ProcessOutput>;
}

/// `Orchestrator` backed by the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    pub docker_bin: String,
    pub cwd: PathBuf,
    pub flavor: ComposeFlavor,
    pub compose_file: PathBuf,
    pub project: String,
    pub helper_image: String,
}

impl DockerCli {
    async fn docker(&self, args: &[&str]) -> io::Result<ProcessOutput> {
        run(&self.docker_bin, &self.cwd, args).await
    }

    async fn compose(&self, args: &[&str]) -> io::Result<ProcessOutput> {
        let file = self.compose_file.to_string_lossy().to_string();
        let mut full: Vec<&str> = Vec::new();
        let bin = match self.flavor {
            ComposeFlavor::Plugin => {
                full.push("compose");
                self.docker_bin.as_str()
            }
            ComposeFlavor::Standalone => "docker-compose",
        };
        full.extend_from_slice(&["-f", &file, "-p", &self.project]);
        full.extend_from_slice(args);
        run(bin, &self.cwd, &full).await
    }
}

async fn run(bin: &str, cwd: &Path, args: &[&str]) -> io::Result<ProcessOutput> {
    debug!("running {bin} {}", args.join(" "));
    let out = Command::new(bin)
        .current_dir(cwd)
        .args(args)
        .output()
        .await?;
    Ok(ProcessOutput {
        code: out.status.code(),
        stdout: String::from_utf8_lossy(&out.stdout).trim_end().to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).trim_end().to_string(),
    })
}

#[async_trait]
impl Orchestrator for DockerCli {
    async fn pull_image(&self, image: &str) -> io::Result<ProcessOutput> {
        self.docker(&["pull", image]).await
    }

    async fn compose_down(&self) -> io::Result<ProcessOutput> {
        self.compose(&["down", "--remove-orphans"]).await
    }

    async fn compose_up(&self) -> io::Result<ProcessOutput> {
        self.compose(&["up", "-d"]).await
    }

    async fn compose_logs(&self, service: &str, tail: usize) -> io::Result<ProcessOutput> {
        let tail = tail.to_string();
        self.compose(&["logs", "--no-color", "--tail", &tail, service]).await
    }

    async fn compose_ps(&self) -> io::Result<ProcessOutput> {
        self.compose(&["ps", "-a", "--format", "json"]).await
    }

    async fn archive_volume(
        &self,
        volume: &str,
        dest_dir: &Path,
        file_name: &str,
    ) -> io::Result<ProcessOutput> {
        let src = format!("{volume}:/data:ro");
        let dst = format!("{}:/backup", dest_dir.display());
        let target = format!("/backup/{file_name}");
        self.docker(&[
            "run",
            "--rm",
            "-v",
            &src,
            "-v",
            &dst,
            &self.helper_image,
            "tar",
            "czf",
            &target,
            "-C",
            "/data",
            ".",
        ])
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Publisher {
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "TargetPort", default)]
    pub target_port: u16,
    #[serde(rename = "PublishedPort", default)]
    pub published_port: u16,
    #[serde(rename = "Protocol", default)]
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceStatus {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Publishers", default)]
    pub publishers: Option<Vec<Publisher>>,
}

impl ServiceStatus {
    pub fn ports_label(&self) -> String {
        let ports: Vec<String> = self
            .publishers
            .iter()
            .flatten()
            .filter(|p| p.published_port != 0)
            .map(|p| format!("{}->{}/{}", p.published_port, p.target_port, p.protocol))
            .collect();
        if ports.is_empty() {
            "-".to_string()
        } else {
            ports.join(", ")
        }
    }
}

/// Parse `compose ps --format json`. Older compose releases print a single
/// JSON array, newer ones one object per line.
pub fn parse_ps_output(raw: &str) -> serde_json::Result<Vec<ServiceStatus>> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(vec![]);
    }

    let mut res = Vec::new();
    if text.starts_with('[') {
        if let Value::Array(items) = serde_json::from_str::<Value>(text)? {
            for item in items {
                res.push(serde_json::from_value::<ServiceStatus>(item)?);
            }
        }
    } else {
        for line in text.lines().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            res.push(serde_json::from_str::<ServiceStatus>(line)?);
        }
    }

    for s in &mut res {
        if s.state.trim().is_empty() {
            s.state = "unknown".to_string();
        }
    }
    res.sort_by(|a, b| a.service.cmp(&b.service));
    Ok(res)
}
