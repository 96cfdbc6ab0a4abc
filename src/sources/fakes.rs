//! In-memory stand-ins for the OS seams, shared by collector tests.

use crate::config::{Config, HelpersConfig, SourcesConfig};
use super::devices::{DeviceHandle, DeviceService, Predicate};
use super::kernel::{FsStats, Kernel, KernelStats, Uname};
use super::mounts::{MountEntry, MountTable};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct FakeKernel {
    pub uname: Uname,
    pub stats: Option<KernelStats>,
    pub filesystems: HashMap<String, FsStats>,
    pub privileged: bool,
}

impl Kernel for FakeKernel {
    fn uname(&self) -> Uname {
        self.uname.clone()
    }

    fn sysinfo(&self) -> Option<KernelStats> {
        self.stats
    }

    fn statfs(&self, path: &Path) -> Option<FsStats> {
        self.filesystems.get(path.to_str()?).copied()
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticMounts(pub Vec<MountEntry>);

impl MountTable for StaticMounts {
    fn mounts(&self) -> Vec<MountEntry> {
        self.0.clone()
    }
}

/// Answers every query by filtering a fixed device list.
#[derive(Debug, Clone, Default)]
pub struct FakeDevices(pub Vec<DeviceHandle>);

impl DeviceService for FakeDevices {
    fn query(&self, predicate: &Predicate) -> Vec<DeviceHandle> {
        self.0
            .iter()
            .filter(|d| predicate.matches(d))
            .cloned()
            .collect()
    }
}

pub fn mount(device: &str, mount_point: &str, fs_type: &str) -> MountEntry {
    MountEntry {
        device: device.to_string(),
        mount_point: mount_point.to_string(),
        fs_type: fs_type.to_string(),
    }
}

/// Every pseudo-file points into a missing directory and no helper runs.
pub fn offline_config() -> Config {
    let missing = Path::new("/nonexistent/sysfacts");
    let mut cfg = Config::default();
    cfg.sources = SourcesConfig {
        cpuinfo: missing.join("cpuinfo"),
        meminfo: missing.join("meminfo"),
        thermal_zones: missing.join("thermal_zone"),
        etc_dir: missing.join("etc"),
        xorg_log: missing.join("Xorg.0.log"),
        wayland_header: missing.join("wayland-version.h"),
        plasma_session: missing.join("plasma.desktop"),
        sysfs: missing.join("sys"),
        udev_data: missing.join("udev"),
        mounts: missing.join("mounts"),
        pci_ids: vec![missing.join("pci.ids")],
    };
    cfg.helpers = HelpersConfig {
        glxinfo: Vec::new(),
        desktop_version: Vec::new(),
        applications_version: Vec::new(),
        network_status: Vec::new(),
    };
    cfg.helper_timeout_ms = 500;
    cfg
}
