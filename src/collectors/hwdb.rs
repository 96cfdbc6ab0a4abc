//! Display adapter lookup in sysfs and the PCI id database.

use super::graphics::DisplayAdapter;
use crate::sources::{read_lines, read_trimmed};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PciFunction {
    vendor_id: String,
    device_id: String,
    driver: Option<String>,
    boot_vga: bool,
}

/// The boot VGA device if one is flagged, else the first display-class device.
pub fn primary_display_adapter(sysfs: &Path, pci_ids: &[PathBuf]) -> Option<DisplayAdapter> {
    let mut adapters = display_functions(&sysfs.join("bus/pci/devices"));
    let index = adapters.iter().position(|f| f.boot_vga).unwrap_or(0);
    if adapters.is_empty() {
        debug!("no PCI display adapter found");
        return None;
    }
    let function = adapters.swap_remove(index);

    let (vendor, device) = pci_ids
        .iter()
        .find_map(|path| lookup_names(path, &function.vendor_id, &function.device_id))
        .unwrap_or_default();
    Some(DisplayAdapter {
        vendor,
        device,
        driver: function.driver,
    })
}

fn display_functions(dir: &Path) -> Vec<PciFunction> {
    let mut entries: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().to_path_buf())
        .collect();
    entries.sort();

    entries
        .iter()
        .filter_map(|path| {
            let class = read_trimmed(&path.join("class")).ok()?;
            if !class.trim_start_matches("0x").starts_with("03") {
                return None;
            }
            let id = |file: &str| {
                read_trimmed(&path.join(file))
                    .ok()
                    .map(|v| v.trim_start_matches("0x").to_ascii_lowercase())
            };
            let driver = std::fs::read_link(path.join("driver"))
                .ok()
                .and_then(|target| target.file_name()?.to_str().map(str::to_string));
            Some(PciFunction {
                vendor_id: id("vendor")?,
                device_id: id("device")?,
                driver,
                boot_vga: read_trimmed(&path.join("boot_vga")).is_ok_and(|v| v == "1"),
            })
        })
        .collect()
}

/// Vendor and device names from a `pci.ids` file. `None` only when the file
/// cannot be read, so the next candidate file gets a chance.
fn lookup_names(
    path: &Path,
    vendor_id: &str,
    device_id: &str,
) -> Option<(Option<String>, Option<String>)> {
    let lines = match read_lines(path) {
        Ok(lines) => lines,
        Err(err) => {
            debug!(error = %err, "pci.ids unavailable");
            return None;
        }
    };

    let mut vendor: Option<String> = None;
    for line in lines {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('\t') {
            if vendor.is_none() || rest.starts_with('\t') {
                continue;
            }
            if let Some(name) = id_entry(rest, device_id) {
                return Some((vendor, Some(name)));
            }
        } else if vendor.is_some() {
            // Left the vendor block without meeting the device.
            break;
        } else {
            vendor = id_entry(&line, vendor_id);
        }
    }
    Some((vendor, None))
}

/// `"<hex id>  <name>"` when the id matches.
fn id_entry(line: &str, id: &str) -> Option<String> {
    let (key, name) = line.split_once("  ")?;
    key.eq_ignore_ascii_case(id).then(|| name.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;

    const PCI_IDS: &str = "# header\n\
8086  Intel Corporation\n\
\t3e9b  CoffeeLake-H GT2 [UHD Graphics 630]\n\
\t\t1028 0869  subsystem\n\
\t9a49  TigerLake-LP GT2 [Iris Xe Graphics]\n\
10de  NVIDIA Corporation\n\
\t1c03  GP106 [GeForce GTX 1060 6GB]\n\
C 03  Display controller\n";

    fn pci_device(root: &Path, slot: &str, class: &str, vendor: &str, device: &str) -> PathBuf {
        let dir = root.join("bus/pci/devices").join(slot);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("class"), format!("{class}\n")).unwrap();
        fs::write(dir.join("vendor"), format!("{vendor}\n")).unwrap();
        fs::write(dir.join("device"), format!("{device}\n")).unwrap();
        dir
    }

    #[test]
    fn names_from_pci_ids() {
        let dir = tempfile::tempdir().unwrap();
        let ids = dir.path().join("pci.ids");
        fs::write(&ids, PCI_IDS).unwrap();

        assert_eq!(
            lookup_names(&ids, "8086", "9a49"),
            Some((
                Some("Intel Corporation".to_string()),
                Some("TigerLake-LP GT2 [Iris Xe Graphics]".to_string())
            ))
        );
        assert_eq!(
            lookup_names(&ids, "10de", "ffff"),
            Some((Some("NVIDIA Corporation".to_string()), None))
        );
        assert_eq!(lookup_names(&ids, "1234", "0001"), Some((None, None)));
        assert_eq!(lookup_names(&dir.path().join("missing.ids"), "8086", "9a49"), None);
    }

    #[test]
    fn prefers_boot_vga_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let ids = dir.path().join("pci.ids");
        fs::write(&ids, PCI_IDS).unwrap();

        pci_device(dir.path(), "0000:00:1f.3", "0x040380", "0x8086", "0xa348");
        pci_device(dir.path(), "0000:00:02.0", "0x030000", "0x8086", "0x3e9b");
        let nvidia = pci_device(dir.path(), "0000:01:00.0", "0x030000", "0x10de", "0x1c03");
        fs::write(nvidia.join("boot_vga"), "1\n").unwrap();
        let driver_dir = dir.path().join("bus/pci/drivers/nouveau");
        fs::create_dir_all(&driver_dir).unwrap();
        symlink(&driver_dir, nvidia.join("driver")).unwrap();

        let adapter =
            primary_display_adapter(dir.path(), &[dir.path().join("none.ids"), ids]).unwrap();
        assert_eq!(adapter.vendor.as_deref(), Some("NVIDIA Corporation"));
        assert_eq!(adapter.device.as_deref(), Some("GP106 [GeForce GTX 1060 6GB]"));
        assert_eq!(adapter.driver.as_deref(), Some("nouveau"));
    }

    #[test]
    fn no_display_class_device() {
        let dir = tempfile::tempdir().unwrap();
        pci_device(dir.path(), "0000:00:1f.3", "0x040380", "0x8086", "0xa348");
        assert_eq!(primary_display_adapter(dir.path(), &[]), None);
    }
}
