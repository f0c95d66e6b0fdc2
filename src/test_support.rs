use crate::config::{sample_lookup, MoodleConfig, Settings};
use crate::docker::{Orchestrator, ProcessOutput};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Records every call and answers from a script; unscripted calls succeed.
#[derive(Default)]
pub struct FakeOrchestrator {
    calls: Mutex<Vec<String>>,
    script: Mutex<HashMap<&'static str, ProcessOutput>>,
    logs: Mutex<String>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, op: &'static str, code: i32, stderr: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(op, ProcessOutput::failed(code, stderr));
        self
    }

    pub fn respond(self, op: &'static str, stdout: &str) -> Self {
        self.script.lock().unwrap().insert(op, ProcessOutput::ok(stdout));
        self
    }

    pub fn with_logs(self, logs: &str) -> Self {
        *self.logs.lock().unwrap() = logs.to_string();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, op: &'static str, call: String) -> io::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(call);
        Ok(self
            .script
            .lock()
            .unwrap()
            .get(op)
            .cloned()
            .unwrap_or_else(|| ProcessOutput::ok("")))
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn pull_image(&self, image: &str) -> io::Result<ProcessOutput> {
        self.answer("pull", format!("pull {image}"))
    }

    async fn compose_down(&self) -> io::Result<ProcessOutput> {
        self.answer("down", "down".to_string())
    }

    async fn compose_up(&self) -> io::Result<ProcessOutput> {
        self.answer("up", "up".to_string())
    }

    async fn compose_logs(&self, service: &str, tail: usize) -> io::Result<ProcessOutput> {
        let logs = self.logs.lock().unwrap().clone();
        let out = self.answer("logs", format!("logs {service} {tail}"))?;
        if out.success() && out.stdout.is_empty() {
            return Ok(ProcessOutput::ok(&logs));
        }
        Ok(out)
    }

    async fn compose_ps(&self) -> io::Result<ProcessOutput> {
        self.answer("ps", "ps".to_string())
    }

    async fn archive_volume(
        &self,
        volume: &str,
        dest_dir: &Path,
        file_name: &str,
    ) -> io::Result<ProcessOutput> {
        let out = self.answer("archive", format!("archive {volume} {file_name}"))?;
        if out.success() {
            std::fs::write(dest_dir.join(file_name), b"fake archive")?;
        }
        Ok(out)
    }
}

pub fn sample_config() -> MoodleConfig {
    MoodleConfig::from_lookup(sample_lookup).unwrap()
}

/// Settings rooted at `root` with no startup wait.
pub fn sample_settings(root: &Path) -> Settings {
    let mut s = Settings::from_lookup(root, |_| None);
    s.startup_wait = Duration::ZERO;
    s
}
