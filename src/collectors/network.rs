use crate::snapshot::NetworkState;
use crate::sources::helper::run_helper;
use std::time::Duration;
use tracing::debug;

/// Connectivity as reported by the network manager. An unknown state is the
/// same as no answer.
pub async fn collect_network(status_helper: &[String], timeout: Duration) -> Option<NetworkState> {
    if status_helper.is_empty() {
        return None;
    }
    let lines = run_helper(status_helper, timeout)
        .await
        .map_err(|err| debug!(error = %err, "network status unavailable"))
        .ok()?;
    let state = lines
        .iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .map_or(NetworkState::Unknown, parse_state);
    (state != NetworkState::Unknown).then_some(state)
}

pub fn parse_state(raw: &str) -> NetworkState {
    let raw = raw.trim().to_ascii_lowercase();
    match raw.as_str() {
        // "connected", "connected (site only)", "connected (local only)"
        s if s.starts_with("connected") => NetworkState::Connected,
        "connecting" => NetworkState::Connecting,
        "disconnecting" => NetworkState::Disconnecting,
        "disconnected" | "asleep" => NetworkState::Disconnected,
        _ => NetworkState::Unknown,
    }
}
