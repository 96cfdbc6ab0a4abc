//! Merges the device service's storage volumes with LVM volumes that only
//! show up in the mount table.

use crate::snapshot::Device;
use crate::sources::devices::{DeviceHandle, DeviceService, Predicate};
use crate::sources::kernel::Kernel;
use crate::sources::mounts::{MountEntry, MountTable};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Device-mapper names of the form `<vg>-<lv>`.
#[allow(clippy::expect_used)] // fixed pattern
static LVM_DEVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/dev/mapper/\S*-\S*$").expect("static regex should not panic")
});

pub fn collect_devices(
    service: &dyn DeviceService,
    mounts: &dyn MountTable,
    kernel: &dyn Kernel,
) -> Vec<Device> {
    let mut devices: Vec<Device> = service
        .query(&Predicate::storage_media())
        .iter()
        .map(|handle| from_handle(handle, kernel))
        .collect();
    if devices.is_empty() {
        debug!("device service returned no storage volumes");
    }

    let mut seen: HashSet<String> = devices.iter().map(|d| d.device_node.clone()).collect();
    for entry in mounts.mounts() {
        if !LVM_DEVICE.is_match(&entry.device) || !seen.insert(entry.device.clone()) {
            continue;
        }
        devices.push(from_mount(entry, kernel));
    }
    devices
}

fn from_handle(handle: &DeviceHandle, kernel: &dyn Kernel) -> Device {
    let device_node = handle
        .block
        .as_ref()
        .map(|b| b.device.clone())
        .unwrap_or_default();
    let mounted = handle.access.as_ref().is_some_and(|a| a.accessible);
    let mount_point = if mounted {
        handle.access.as_ref().and_then(|a| a.file_path.clone())
    } else {
        None
    };
    let removable =
        (mounted || handle.optical_disc) && handle.parent_drive.is_some_and(|d| d.removable);

    let volume_label = handle
        .volume
        .as_ref()
        .map(|v| v.label.as_str())
        .filter(|l| !l.is_empty());
    let label = volume_label
        .or(mount_point.as_deref().filter(|m| !m.is_empty()))
        .unwrap_or(device_node.as_str())
        .to_string();

    let mut device = Device {
        id: handle.udi.clone(),
        device_node,
        label,
        fs_type: handle
            .volume
            .as_ref()
            .map(|v| v.fs_type.clone())
            .unwrap_or_default(),
        mount_point,
        mounted,
        removable,
        total_bytes: handle.volume.as_ref().map_or(0, |v| v.size),
        available_bytes: 0,
        icon: handle.icon.clone(),
    };
    fill_space(&mut device, kernel);
    device
}

fn from_mount(entry: MountEntry, kernel: &dyn Kernel) -> Device {
    let mut device = Device {
        id: entry.device.clone(),
        device_node: entry.device,
        label: entry.mount_point.clone(),
        fs_type: entry.fs_type,
        mount_point: Some(entry.mount_point),
        mounted: true,
        removable: false,
        total_bytes: 0,
        available_bytes: 0,
        icon: "drive-harddisk".to_string(),
    };
    fill_space(&mut device, kernel);
    device
}

/// Overwrites total/available from statfs. Root sees the reserved blocks too.
fn fill_space(device: &mut Device, kernel: &dyn Kernel) {
    let Some(mount_point) = device.mount_point.as_deref().filter(|_| device.mounted) else {
        return;
    };
    let Some(stats) = kernel.statfs(Path::new(mount_point)) else {
        debug!(mount_point, "statfs failed, keeping volume size");
        return;
    };
    let blocks = if kernel.is_privileged() {
        stats.free_blocks
    } else {
        stats.available_blocks
    };
    device.total_bytes = stats.blocks.saturating_mul(stats.block_size);
    device.available_bytes = blocks.saturating_mul(stats.block_size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::devices::{
        Block, DriveType, StorageAccess, StorageDrive, StorageVolume, VolumeUsage,
    };
    use crate::sources::fakes::{mount, FakeDevices, FakeKernel, StaticMounts};
    use crate::sources::kernel::FsStats;
    use crate::sources::mounts::ProcMountTable;

    fn volume(udi: &str, node: &str, label: &str, mount_point: Option<&str>) -> DeviceHandle {
        DeviceHandle {
            udi: udi.to_string(),
            icon: "drive-harddisk".to_string(),
            block: Some(Block {
                device: node.to_string(),
            }),
            volume: Some(StorageVolume {
                usage: VolumeUsage::FileSystem,
                fs_type: "ext4".to_string(),
                label: label.to_string(),
                size: 4096,
            }),
            access: Some(StorageAccess {
                accessible: mount_point.is_some(),
                file_path: mount_point.map(str::to_string),
            }),
            parent_drive: Some(StorageDrive {
                drive_type: DriveType::HardDisk,
                removable: false,
            }),
            ..DeviceHandle::default()
        }
    }

    fn kernel(privileged: bool) -> FakeKernel {
        let mut kernel = FakeKernel {
            privileged,
            ..FakeKernel::default()
        };
        for path in ["/", "/home", "/srv"] {
            kernel.filesystems.insert(
                path.to_string(),
                FsStats {
                    blocks: 1000,
                    block_size: 4096,
                    available_blocks: 250,
                    free_blocks: 300,
                },
            );
        }
        kernel
    }

    #[test]
    fn lvm_volume_known_to_service_is_listed_once() {
        let service = FakeDevices(vec![
            volume("udi-root", "/dev/sda1", "", Some("/")),
            volume("udi-home", "/dev/mapper/vg-home", "home", Some("/home")),
        ]);
        let mounts = StaticMounts(vec![
            mount("/dev/sda1", "/", "ext4"),
            mount("/dev/mapper/vg-home", "/home", "ext4"),
            mount("/dev/mapper/vg-srv", "/srv", "xfs"),
            mount("/dev/mapper/vg-srv", "/srv/bind", "xfs"),
            mount("/dev/mapper/cryptroot", "/mnt", "ext4"),
        ]);

        let devices = collect_devices(&service, &mounts, &kernel(false));
        let nodes: Vec<&str> = devices.iter().map(|d| d.device_node.as_str()).collect();
        assert_eq!(
            nodes,
            vec!["/dev/sda1", "/dev/mapper/vg-home", "/dev/mapper/vg-srv"]
        );
        let ids: HashSet<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), devices.len());

        let srv = &devices[2];
        assert_eq!(srv.id, "/dev/mapper/vg-srv");
        assert_eq!(srv.label, "/srv");
        assert_eq!(srv.fs_type, "xfs");
        assert!(srv.mounted);
        assert!(!srv.removable);
        assert_eq!(srv.icon, "drive-harddisk");
        assert_eq!(srv.total_bytes, 1000 * 4096);
    }

    #[test]
    fn label_priority() {
        let service = FakeDevices(vec![
            volume("a", "/dev/sda1", "DATA", Some("/home")),
            volume("b", "/dev/sda2", "", Some("/")),
            volume("c", "/dev/sda3", "", None),
        ]);
        let devices = collect_devices(&service, &StaticMounts::default(), &kernel(false));
        let labels: Vec<&str> = devices.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["DATA", "/", "/dev/sda3"]);
        assert_eq!(devices[2].mount_point, None);
    }

    #[test]
    fn available_space_depends_on_privilege() {
        let service = FakeDevices(vec![volume("a", "/dev/sda1", "", Some("/"))]);
        let user = collect_devices(&service, &StaticMounts::default(), &kernel(false));
        assert_eq!(user[0].available_bytes, 250 * 4096);
        assert_eq!(user[0].usage_percent(), 75);

        let root = collect_devices(&service, &StaticMounts::default(), &kernel(true));
        assert_eq!(root[0].available_bytes, 300 * 4096);
    }

    #[test]
    fn unmounted_or_unreadable_keeps_volume_size() {
        let service = FakeDevices(vec![
            volume("a", "/dev/sdb1", "", None),
            volume("b", "/dev/sdb2", "", Some("/media/usb")),
        ]);
        let devices = collect_devices(&service, &StaticMounts::default(), &kernel(false));
        assert_eq!(devices[0].total_bytes, 4096);
        assert_eq!(devices[0].available_bytes, 0);
        assert_eq!(devices[0].available_display(), None);
        assert_eq!(devices[1].total_bytes, 4096);
        assert_eq!(devices[1].available_bytes, 0);
    }

    #[test]
    fn removable_needs_mount_or_disc_and_removable_parent() {
        let mut stick = volume("usb", "/dev/sdc1", "STICK", Some("/media/stick"));
        stick.parent_drive = Some(StorageDrive {
            drive_type: DriveType::HardDisk,
            removable: true,
        });
        let mut idle_stick = volume("usb2", "/dev/sdd1", "", None);
        idle_stick.parent_drive = stick.parent_drive;
        let mut disc = volume("cd", "/dev/sr0", "DVD", None);
        disc.optical_disc = true;
        disc.parent_drive = Some(StorageDrive {
            drive_type: DriveType::Optical,
            removable: true,
        });

        let service = FakeDevices(vec![stick, idle_stick, disc]);
        let devices = collect_devices(&service, &StaticMounts::default(), &kernel(false));
        let removable: Vec<bool> = devices.iter().map(|d| d.removable).collect();
        assert_eq!(removable, vec![true, false, true]);
    }

    #[test]
    fn empty_service_still_lists_lvm_mounts() {
        let mounts = StaticMounts(vec![mount("/dev/mapper/vg-root", "/", "btrfs")]);
        let devices = collect_devices(&FakeDevices::default(), &mounts, &FakeKernel::default());
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].total_bytes, 0);
        assert_eq!(devices[0].total_display(), None);
    }

    #[test]
    fn lvm_mount_without_statfs_is_kept_from_proc_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("mounts");
        std::fs::write(
            &table,
            "/dev/sr0 /run/media/me/CD iso9660 ro 0 0\n\
             /dev/mapper/vg-data /data ext4 rw 0 0\n",
        )
        .unwrap();
        let mounts = ProcMountTable::new(&table);

        let devices = collect_devices(&FakeDevices::default(), &mounts, &FakeKernel::default());
        assert_eq!(devices.len(), 1);
        let data = &devices[0];
        assert_eq!(data.device_node, "/dev/mapper/vg-data");
        assert_eq!(data.label, "/data");
        assert!(data.mounted);
        assert_eq!(data.total_bytes, 0);
        assert_eq!(data.total_display(), None);
        assert_eq!(data.available_display(), None);
    }
}
