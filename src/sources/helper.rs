use super::{section, SourceError};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tracing::{debug, warn};

/// Runs an external helper and returns its stdout split into lines.
///
/// The child is killed if it outlives `timeout`. Spawn failures and empty
/// output count as unavailable; invalid UTF-8 is replaced, not rejected.
pub async fn run_helper(command: &[String], timeout: Duration) -> Result<Vec<String>, SourceError> {
    let Some((program, args)) = command.split_first() else {
        return Err(SourceError::unavailable("helper", "no command configured"));
    };
    let locator = command.join(" ");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SourceError::unavailable(locator.clone(), e))?;

    let output = match time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => return Err(SourceError::unavailable(locator, err)),
        Err(_elapsed) => {
            warn!(command = %locator, timeout_ms = timeout.as_millis() as u64, "helper timeout");
            return Err(SourceError::Timeout {
                locator,
                timeout_ms: timeout.as_millis() as u64,
            });
        }
    };
    if !output.status.success() {
        debug!(command = %locator, status = %output.status, "helper exited with failure status");
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Err(SourceError::unavailable(locator, "empty output"));
    }
    Ok(lines)
}

/// First line starting with `prefix`, reduced to the field after `sep`.
pub fn extract_prefixed(lines: &[String], prefix: &str, sep: &str) -> Option<String> {
    lines
        .iter()
        .filter(|line| line.starts_with(prefix))
        .find_map(|line| section(line, sep))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout_lines() {
        let lines = run_helper(
            &cmd(&["sh", "-c", "printf 'Qt: 5.15.2\\nKDE Frameworks: 5.80.0\\n'"]),
            Duration::from_secs(5),
        )
        .await
        .expect("sh should run");
        assert_eq!(lines, vec!["Qt: 5.15.2", "KDE Frameworks: 5.80.0"]);
        assert_eq!(extract_prefixed(&lines, "Qt:", ":").as_deref(), Some("5.15.2"));
        assert_eq!(extract_prefixed(&lines, "Plasma:", ":"), None);
    }

    #[tokio::test]
    async fn invalid_utf8_output_keeps_the_other_lines() {
        let lines = run_helper(
            &cmd(&["sh", "-c", "printf 'name: \\377\\nOpenGL vendor string: Intel\\n'"]),
            Duration::from_secs(5),
        )
        .await
        .expect("sh should run");
        assert_eq!(lines.len(), 2);
        assert_eq!(
            extract_prefixed(&lines, "OpenGL vendor string:", ":").as_deref(),
            Some("Intel")
        );
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let err = run_helper(
            &cmd(&["/nonexistent/sysfacts-helper"]),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn empty_command_is_unavailable() {
        let err = run_helper(&[], Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn empty_output_is_unavailable() {
        let err = run_helper(&cmd(&["sh", "-c", "exit 0"]), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn slow_helper_times_out() {
        let err = run_helper(&cmd(&["sleep", "5"]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Timeout { .. }));
    }
}
