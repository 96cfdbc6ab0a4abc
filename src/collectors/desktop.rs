use crate::snapshot::DesktopInfo;
use crate::sources::helper::{extract_prefixed, run_helper};
use crate::sources::{read_field, section, FieldMode};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Plasma, KDE Frameworks, Qt and applications versions. `None` when every
/// source came up empty.
pub async fn collect_desktop(
    plasma_session: &Path,
    desktop_helper: &[String],
    applications_helper: &[String],
    timeout: Duration,
) -> Option<DesktopInfo> {
    let plasma_version =
        read_field(plasma_session, "X-KDE-PluginInfo-Version", "=", FieldMode::First)
            .map_err(|err| debug!(error = %err, "plasma version unavailable"))
            .ok();

    let mut info = DesktopInfo {
        plasma_version,
        ..DesktopInfo::default()
    };

    if !desktop_helper.is_empty() {
        match run_helper(desktop_helper, timeout).await {
            Ok(lines) => {
                info.qt_version = extract_prefixed(&lines, "Qt:", ":");
                info.frameworks_version = extract_prefixed(&lines, "KDE Frameworks:", ":");
            }
            Err(err) => debug!(error = %err, "desktop version helper unavailable"),
        }
    }

    if !applications_helper.is_empty() {
        match run_helper(applications_helper, timeout).await {
            Ok(lines) => info.applications_version = applications_version(&lines),
            Err(err) => debug!(error = %err, "applications version helper unavailable"),
        }
    }

    (!info.is_empty()).then_some(info)
}

/// Last `dolphin <version>` line, second space-separated field.
fn applications_version(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .filter(|line| line.starts_with("dolphin"))
        .filter_map(|line| section(line, " "))
        .last()
        .map(str::to_string)
}
