use super::read_lines;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Device name as listed in the mount table, e.g. `/dev/mapper/vg-root`.
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

pub trait MountTable: Send + Sync {
    fn mounts(&self) -> Vec<MountEntry>;
}

/// Every entry of a `/proc/mounts`-style file, pseudo filesystems included.
#[derive(Debug, Clone)]
pub struct ProcMountTable {
    path: PathBuf,
}

impl ProcMountTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MountTable for ProcMountTable {
    fn mounts(&self) -> Vec<MountEntry> {
        match read_lines(&self.path) {
            Ok(lines) => lines.iter().filter_map(|line| parse_line(line)).collect(),
            Err(err) => {
                debug!(error = %err, "mount table unavailable");
                Vec::new()
            }
        }
    }
}

fn parse_line(line: &str) -> Option<MountEntry> {
    let mut fields = line.split_whitespace();
    let device = fields.next()?;
    let mount_point = fields.next()?;
    let fs_type = fields.next()?;
    Some(MountEntry {
        device: unescape(device),
        mount_point: unescape(mount_point),
        fs_type: unescape(fs_type),
    })
}

/// Undoes the kernel's octal escaping of space, tab, newline and backslash.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
