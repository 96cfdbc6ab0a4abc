use crate::snapshot::CpuInfo;
use crate::sources::{read_field, FieldMode, SourceError};
use std::path::Path;
use tracing::debug;

/// ACPI thermal zones probed in order; the first readable one wins.
const THERMAL_ZONES: [&str; 3] = ["THM0", "THRM", "THM"];

pub fn collect_cpu(cpuinfo: &Path, thermal_zones: &Path) -> Option<CpuInfo> {
    // "cpu" covers PowerPC, where there is no "model name".
    let model = first_of(cpuinfo, &["model name", "cpu"])?;

    let speed_mhz = first_of(cpuinfo, &["cpu MHz", "clock"]).and_then(|raw| parse_mhz(&raw));
    let logical_cores = logged(read_field(cpuinfo, "processor", ":", FieldMode::Last))
        .and_then(|last| last.parse::<u32>().ok())
        .map(|index| index + 1);

    Some(CpuInfo {
        model,
        speed_mhz,
        logical_cores,
        temperature_celsius: read_temperature(thermal_zones),
    })
}

pub fn read_temperature(thermal_zones: &Path) -> Option<f64> {
    THERMAL_ZONES.iter().find_map(|zone| {
        let path = thermal_zones.join(zone).join("temperature");
        let raw = read_field(&path, "temperature", ":", FieldMode::First).ok()?;
        parse_celsius(&raw)
    })
}

fn first_of(path: &Path, prefixes: &[&str]) -> Option<String> {
    prefixes
        .iter()
        .find_map(|prefix| logged(read_field(path, prefix, ":", FieldMode::First)))
}

fn logged(result: Result<String, SourceError>) -> Option<String> {
    result
        .map_err(|err| debug!(error = %err, "cpu field unavailable"))
        .ok()
}

fn parse_mhz(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let number = match lower.strip_suffix("mhz") {
        Some(rest) => &trimmed[..rest.len()],
        None => trimmed,
    };
    number.trim().parse().ok()
}

fn parse_celsius(raw: &str) -> Option<f64> {
    let number = raw.trim().trim_end_matches(" C").trim();
    if number.is_empty() {
        return None;
    }
    number.parse().ok()
}
