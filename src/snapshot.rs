use crate::format::{formatted_unit, usage_percent};
use std::fmt;
use std::time::Duration;

/// Result of one full scan. Built once by the scanner and never mutated
/// afterwards; every optional section is `None` when its sources failed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Snapshot {
    pub os: OsInfo,
    pub desktop: Option<DesktopInfo>,
    pub cpu: Option<CpuInfo>,
    pub graphics: Option<GraphicsInfo>,
    pub power: Option<PowerInfo>,
    pub memory: Option<MemoryInfo>,
    pub network: Option<NetworkState>,
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct OsInfo {
    pub sysname: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    pub hostname: String,
    pub distribution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DesktopInfo {
    pub plasma_version: Option<String>,
    pub frameworks_version: Option<String>,
    pub qt_version: Option<String>,
    pub applications_version: Option<String>,
}

impl DesktopInfo {
    pub fn is_empty(&self) -> bool {
        self.plasma_version.is_none()
            && self.frameworks_version.is_none()
            && self.qt_version.is_none()
            && self.applications_version.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CpuInfo {
    pub model: String,
    pub speed_mhz: Option<f64>,
    /// Number of logical processors (last zero-based index + 1).
    pub logical_cores: Option<u32>,
    pub temperature_celsius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MemoryInfo {
    pub total_ram_bytes: u64,
    /// Raw free RAM as reported by the kernel.
    pub free_ram_bytes: u64,
    /// Page cache, buffers and reclaimable slab on top of `free_ram_bytes`.
    pub reclaimable_bytes: Option<u64>,
    pub total_swap_bytes: u64,
    pub free_swap_bytes: u64,
    pub uptime_seconds: u64,
}

impl MemoryInfo {
    pub fn free_ram_display(&self) -> String {
        match self.reclaimable_bytes {
            Some(cache) => format!(
                "{} (+ {} Caches)",
                formatted_unit(self.free_ram_bytes),
                formatted_unit(cache)
            ),
            None => formatted_unit(self.free_ram_bytes),
        }
    }

    pub fn uptime_display(&self) -> String {
        humantime::format_duration(Duration::from_secs(self.uptime_seconds)).to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphicsInfo {
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub driver_2d: Option<String>,
    pub driver_3d: Option<String>,
    pub wayland_version: Option<String>,
}

impl GraphicsInfo {
    pub fn is_empty(&self) -> bool {
        self.vendor.is_none()
            && self.model.is_none()
            && self.driver_2d.is_none()
            && self.driver_3d.is_none()
            && self.wayland_version.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PowerInfo {
    pub battery: Option<BatteryStat>,
    pub ac_plugged: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BatteryStat {
    pub present: bool,
    pub rechargeable: bool,
    pub charge_percent: u8,
    pub charge_state: ChargeState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ChargeState {
    NoCharge,
    Charging,
    Discharging,
    #[default]
    Unknown,
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChargeState::NoCharge => write!(f, "No Charge"),
            ChargeState::Charging => write!(f, "Charging"),
            ChargeState::Discharging => write!(f, "Discharging"),
            ChargeState::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum NetworkState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Unknown,
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkState::Disconnected => write!(f, "offline"),
            NetworkState::Connecting => write!(f, "connecting"),
            NetworkState::Connected => write!(f, "online"),
            NetworkState::Disconnecting => write!(f, "shutting down"),
            NetworkState::Unknown => write!(f, "unknown"),
        }
    }
}

/// One storage volume as shown to the user after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Device {
    pub id: String,
    pub device_node: String,
    pub label: String,
    pub fs_type: String,
    pub mount_point: Option<String>,
    pub mounted: bool,
    pub removable: bool,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub icon: String,
}

impl Device {
    pub fn usage_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    pub fn usage_percent(&self) -> u64 {
        usage_percent(self.total_bytes, self.available_bytes)
    }

    /// Blank for devices reporting no capacity.
    pub fn total_display(&self) -> Option<String> {
        (self.total_bytes > 0).then(|| formatted_unit(self.total_bytes))
    }

    pub fn available_display(&self) -> Option<String> {
        (self.mounted && self.total_bytes > 0).then(|| formatted_unit(self.available_bytes))
    }
}
