use crate::docker::{parse_ps_output, Orchestrator, ServiceStatus};
use crate::error::{Result, StackError};
use crate::topology::{APP_SERVICE, DB_SERVICE};

pub async fn status(orch: &dyn Orchestrator) -> Result<Vec<ServiceStatus>> {
    let out = orch.compose_ps().await.map_err(|e| StackError::StatusFailed {
        detail: e.to_string(),
    })?;
    if !out.success() {
        return Err(StackError::StatusFailed {
            detail: out.detail(),
        });
    }
    parse_ps_output(&out.stdout).map_err(|e| StackError::StatusFailed {
        detail: format!("unexpected compose output: {e}"),
    })
}

/// One line per declared service; services compose does not know about are
/// shown as `absent`.
pub fn render(services: &[ServiceStatus]) -> Vec<String> {
    let mut lines = Vec::new();
    for name in [DB_SERVICE, APP_SERVICE] {
        match services.iter().find(|s| s.service == name) {
            Some(s) => lines.push(format!(
                "{:<4} {:<10} {:<24} {}",
                name,
                s.state,
                s.status,
                s.ports_label()
            )),
            None => lines.push(format!("{name:<4} absent")),
        }
    }
    lines
}
