use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::process::Command;

const SYSTEMCTL_TIMEOUT: Duration = Duration::from_secs(10);

/// Lists every systemd service unit with its sub-state (`running`,
/// `exited`, `dead`, ...).
pub async fn collect() -> Result<BTreeMap<String, String>> {
    let output = tokio::time::timeout(
        SYSTEMCTL_TIMEOUT,
        Command::new("systemctl")
            .args([
                "list-units",
                "--type=service",
                "--all",
                "--no-legend",
                "--no-pager",
            ])
            .kill_on_drop(true)
            .output(),
    )
    .await
    .context("systemctl timed out")?
    .context("failed to run systemctl")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("systemctl exited with {}: {}", output.status, stderr.trim());
    }
    Ok(parse_unit_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses `systemctl list-units --no-legend` output.
///
/// Columns are `UNIT LOAD ACTIVE SUB DESCRIPTION...`; failed units carry a
/// leading `●` (or `*` without UTF-8) marker column. Lines too short to
/// hold a SUB column map to `"unknown"`.
pub(crate) fn parse_unit_list(text: &str) -> BTreeMap<String, String> {
    let mut services = BTreeMap::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace().peekable();
        if matches!(parts.peek(), Some(&"●") | Some(&"*")) {
            parts.next();
        }
        let Some(name) = parts.next() else {
            continue;
        };
        let state = parts.nth(2).unwrap_or("unknown");
        services.insert(name.to_string(), state.to_string());
    }
    services
}
