//! Device enumeration by capability predicate.
//!
//! [`SysfsDeviceService`] builds device handles from `/sys/class/block`, the
//! udev database and `/sys/class/power_supply`, the same places UDisks and
//! UPower read from.

use super::mounts::{MountEntry, MountTable};
use super::read_trimmed;
use crate::snapshot::ChargeState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

const SECTOR_SIZE: u64 = 512;

/// Capabilities a predicate can test for presence alone. The others are
/// matched through their typed predicates (`VolumeUsage`, `DriveType`,
/// `BatteryType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    StorageAccess,
    AcAdapter,
}

/// Where a device handle comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Block,
    PowerSupply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeUsage {
    FileSystem,
    Encrypted,
    PartitionTable,
    Raid,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveType {
    HardDisk,
    Optical,
    Floppy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryType {
    Primary,
    Peripheral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageVolume {
    pub usage: VolumeUsage,
    pub fs_type: String,
    pub label: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccess {
    pub accessible: bool,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageDrive {
    pub drive_type: DriveType,
    pub removable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Battery {
    pub battery_type: BatteryType,
    pub plugged: bool,
    pub rechargeable: bool,
    pub charge_percent: u8,
    pub charge_state: ChargeState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcAdapter {
    pub plugged: bool,
}

/// A device with whichever capabilities it exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceHandle {
    pub udi: String,
    pub icon: String,
    pub block: Option<Block>,
    pub volume: Option<StorageVolume>,
    pub access: Option<StorageAccess>,
    pub drive: Option<StorageDrive>,
    pub parent_drive: Option<StorageDrive>,
    pub optical_disc: bool,
    pub battery: Option<Battery>,
    pub ac_adapter: Option<AcAdapter>,
}

impl DeviceHandle {
    pub fn is(&self, capability: Capability) -> bool {
        match capability {
            Capability::StorageAccess => self.access.is_some(),
            Capability::AcAdapter => self.ac_adapter.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Is(Capability),
    VolumeUsage(VolumeUsage),
    DriveType(DriveType),
    BatteryType(BatteryType),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// File system or encrypted volumes, plus accessible floppy drives which
    /// carry no file system classification.
    pub fn storage_media() -> Self {
        Predicate::Or(vec![
            Predicate::VolumeUsage(VolumeUsage::FileSystem),
            Predicate::VolumeUsage(VolumeUsage::Encrypted),
            Predicate::And(vec![
                Predicate::Is(Capability::StorageAccess),
                Predicate::DriveType(DriveType::Floppy),
            ]),
        ])
    }

    pub fn battery_or_ac() -> Self {
        Predicate::Or(vec![
            Predicate::BatteryType(BatteryType::Primary),
            Predicate::Is(Capability::AcAdapter),
        ])
    }

    /// Whether any device of `class` could satisfy the predicate.
    pub fn reaches(&self, class: DeviceClass) -> bool {
        match self {
            Predicate::Is(Capability::StorageAccess)
            | Predicate::VolumeUsage(_)
            | Predicate::DriveType(_) => class == DeviceClass::Block,
            Predicate::Is(Capability::AcAdapter) | Predicate::BatteryType(_) => {
                class == DeviceClass::PowerSupply
            }
            Predicate::And(all) => all.iter().all(|p| p.reaches(class)),
            Predicate::Or(any) => any.iter().any(|p| p.reaches(class)),
        }
    }

    pub fn matches(&self, device: &DeviceHandle) -> bool {
        match self {
            Predicate::Is(cap) => device.is(*cap),
            Predicate::VolumeUsage(usage) => {
                device.volume.as_ref().is_some_and(|v| v.usage == *usage)
            }
            Predicate::DriveType(kind) => device.drive.is_some_and(|d| d.drive_type == *kind),
            Predicate::BatteryType(kind) => {
                device.battery.as_ref().is_some_and(|b| b.battery_type == *kind)
            }
            Predicate::And(all) => all.iter().all(|p| p.matches(device)),
            Predicate::Or(any) => any.iter().any(|p| p.matches(device)),
        }
    }
}

pub trait DeviceService: Send + Sync {
    fn query(&self, predicate: &Predicate) -> Vec<DeviceHandle>;
}

pub struct SysfsDeviceService {
    sysfs: PathBuf,
    udev_data: PathBuf,
    mounts: Arc<dyn MountTable>,
}

impl SysfsDeviceService {
    pub fn new(
        sysfs: impl Into<PathBuf>,
        udev_data: impl Into<PathBuf>,
        mounts: Arc<dyn MountTable>,
    ) -> Self {
        Self {
            sysfs: sysfs.into(),
            udev_data: udev_data.into(),
            mounts,
        }
    }

    fn block_devices(&self) -> Vec<DeviceHandle> {
        let mounts = self.mounts.mounts();
        class_entries(&self.sysfs.join("class/block"))
            .into_iter()
            .filter_map(|(name, path)| self.block_device(&name, &path, &mounts))
            .collect()
    }

    fn block_device(&self, name: &str, path: &Path, mounts: &[MountEntry]) -> Option<DeviceHandle> {
        let sectors: u64 = read_trimmed(&path.join("size")).ok()?.parse().ok()?;
        let props = read_trimmed(&path.join("dev"))
            .map(|dev| udev_properties(&self.udev_data.join(format!("b{dev}"))))
            .unwrap_or_default();

        let is_partition = path.join("partition").exists();
        let drive_dir = if is_partition {
            std::fs::canonicalize(path)
                .ok()
                .and_then(|p| p.parent().map(Path::to_path_buf))
        } else {
            Some(path.to_path_buf())
        };
        let drive = drive_dir.map(|dir| StorageDrive {
            drive_type: drive_type(name, &props),
            removable: read_trimmed(&dir.join("removable")).is_ok_and(|v| v == "1")
                || props.get("ID_BUS").is_some_and(|bus| bus == "usb"),
        });
        if sectors == 0 && !drive.is_some_and(|d| d.removable) {
            return None;
        }

        let device_node = match read_trimmed(&path.join("dm/name")) {
            Ok(dm_name) if !dm_name.is_empty() => format!("/dev/mapper/{dm_name}"),
            _ => format!("/dev/{name}"),
        };

        let volume = props.get("ID_FS_USAGE").map(|usage| StorageVolume {
            usage: volume_usage(usage),
            fs_type: props.get("ID_FS_TYPE").cloned().unwrap_or_default(),
            label: props.get("ID_FS_LABEL").cloned().unwrap_or_default(),
            size: sectors * SECTOR_SIZE,
        });

        let media_drive = drive.is_some_and(|d| d.drive_type != DriveType::HardDisk);
        let has_fs = volume
            .as_ref()
            .is_some_and(|v| v.usage == VolumeUsage::FileSystem);
        let access = (has_fs || media_drive).then(|| {
            let mount = mounts.iter().find(|m| same_device(&m.device, &device_node));
            StorageAccess {
                accessible: mount.is_some(),
                file_path: mount.map(|m| m.mount_point.clone()),
            }
        });

        let optical_disc = props.get("ID_CDROM_MEDIA").is_some_and(|v| v == "1");
        let icon = match drive.map(|d| (d.drive_type, d.removable)) {
            Some((DriveType::Optical, _)) => "media-optical",
            Some((DriveType::Floppy, _)) => "media-floppy",
            Some((DriveType::HardDisk, true)) => "drive-removable-media",
            _ => "drive-harddisk",
        };

        Some(DeviceHandle {
            udi: format!("/org/freedesktop/UDisks2/block_devices/{name}"),
            icon: icon.to_string(),
            block: Some(Block {
                device: device_node,
            }),
            volume,
            access,
            drive: (!is_partition).then_some(drive).flatten(),
            parent_drive: drive,
            optical_disc,
            battery: None,
            ac_adapter: None,
        })
    }

    fn power_supplies(&self) -> Vec<DeviceHandle> {
        class_entries(&self.sysfs.join("class/power_supply"))
            .into_iter()
            .filter_map(|(name, path)| power_supply(&name, &path))
            .collect()
    }
}

impl DeviceService for SysfsDeviceService {
    fn query(&self, predicate: &Predicate) -> Vec<DeviceHandle> {
        let mut candidates = Vec::new();
        if predicate.reaches(DeviceClass::Block) {
            candidates.extend(self.block_devices());
        }
        if predicate.reaches(DeviceClass::PowerSupply) {
            candidates.extend(self.power_supplies());
        }
        let devices: Vec<DeviceHandle> = candidates
            .into_iter()
            .filter(|d| predicate.matches(d))
            .collect();
        debug!(matched = devices.len(), "device query finished");
        devices
    }
}

fn class_entries(dir: &Path) -> Vec<(String, PathBuf)> {
    let mut out: Vec<(String, PathBuf)> = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            (!name.starts_with('.')).then(|| (name, entry.path().to_path_buf()))
        })
        .collect();
    out.sort();
    out
}

fn power_supply(name: &str, path: &Path) -> Option<DeviceHandle> {
    let kind = read_trimmed(&path.join("type")).ok()?;
    let flag = |file: &str| read_trimmed(&path.join(file)).is_ok_and(|v| v == "1");
    match kind.as_str() {
        "Battery" => {
            let battery_type = match read_trimmed(&path.join("scope")) {
                Ok(scope) if scope == "Device" => BatteryType::Peripheral,
                _ => BatteryType::Primary,
            };
            let charge_percent = read_trimmed(&path.join("capacity"))
                .ok()
                .and_then(|v| v.parse::<u8>().ok())
                .unwrap_or(0)
                .min(100);
            let charge_state = read_trimmed(&path.join("status"))
                .map(|s| parse_charge_state(&s))
                .unwrap_or_default();
            let rechargeable = read_trimmed(&path.join("technology"))
                .is_ok_and(|t| !t.is_empty() && t != "Unknown");
            Some(DeviceHandle {
                udi: format!("/org/freedesktop/UPower/devices/battery_{name}"),
                icon: "battery".to_string(),
                battery: Some(Battery {
                    battery_type,
                    plugged: flag("present"),
                    rechargeable,
                    charge_percent,
                    charge_state,
                }),
                ..DeviceHandle::default()
            })
        }
        "Mains" => Some(DeviceHandle {
            udi: format!("/org/freedesktop/UPower/devices/line_power_{name}"),
            icon: "ac-adapter".to_string(),
            ac_adapter: Some(AcAdapter {
                plugged: flag("online"),
            }),
            ..DeviceHandle::default()
        }),
        _ => None,
    }
}

pub fn parse_charge_state(status: &str) -> ChargeState {
    match status {
        "Charging" => ChargeState::Charging,
        "Discharging" => ChargeState::Discharging,
        "Not charging" | "Full" => ChargeState::NoCharge,
        _ => ChargeState::Unknown,
    }
}

fn udev_properties(path: &Path) -> HashMap<String, String> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return HashMap::new();
    };
    text.lines()
        .filter_map(|line| line.strip_prefix("E:"))
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn drive_type(name: &str, props: &HashMap<String, String>) -> DriveType {
    let set = |key: &str| props.get(key).is_some_and(|v| v == "1");
    if name.starts_with("fd") || set("ID_DRIVE_FLOPPY") {
        DriveType::Floppy
    } else if name.starts_with("sr") || set("ID_CDROM") {
        DriveType::Optical
    } else {
        DriveType::HardDisk
    }
}

fn volume_usage(raw: &str) -> VolumeUsage {
    match raw {
        "filesystem" => VolumeUsage::FileSystem,
        "crypto" => VolumeUsage::Encrypted,
        "raid" => VolumeUsage::Raid,
        "partition_table" => VolumeUsage::PartitionTable,
        _ => VolumeUsage::Other,
    }
}

fn same_device(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
