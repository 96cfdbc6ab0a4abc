use nix::sys::{statvfs, sysinfo, utsname};
use nix::unistd;
use std::ffi::OsStr;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uname {
    pub sysname: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    pub nodename: String,
}

/// Raw `sysinfo(2)` counters. Memory fields are in units of `mem_unit` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStats {
    pub total_ram: u64,
    pub free_ram: u64,
    pub total_swap: u64,
    pub free_swap: u64,
    pub uptime_seconds: u64,
    pub mem_unit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub blocks: u64,
    pub block_size: u64,
    /// Blocks available to unprivileged users.
    pub available_blocks: u64,
    pub free_blocks: u64,
}

/// Kernel calls a scan depends on.
pub trait Kernel: Send + Sync {
    fn uname(&self) -> Uname;
    fn sysinfo(&self) -> Option<KernelStats>;
    fn statfs(&self, path: &Path) -> Option<FsStats>;
    fn is_privileged(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NixKernel;

impl Kernel for NixKernel {
    fn uname(&self) -> Uname {
        let uts = match utsname::uname() {
            Ok(uts) => uts,
            Err(err) => {
                debug!(error = %err, "uname failed");
                return Uname::default();
            }
        };
        let text = |s: &OsStr| s.to_string_lossy().into_owned();
        Uname {
            sysname: text(uts.sysname()),
            release: text(uts.release()),
            version: text(uts.version()),
            machine: text(uts.machine()),
            nodename: text(uts.nodename()),
        }
    }

    fn sysinfo(&self) -> Option<KernelStats> {
        let info = sysinfo::sysinfo()
            .map_err(|err| debug!(error = %err, "sysinfo failed"))
            .ok()?;
        // nix already scales the counters by mem_unit, so they are bytes.
        Some(KernelStats {
            total_ram: info.ram_total(),
            free_ram: info.ram_unused(),
            total_swap: info.swap_total(),
            free_swap: info.swap_free(),
            uptime_seconds: info.uptime().as_secs(),
            mem_unit: 1,
        })
    }

    fn statfs(&self, path: &Path) -> Option<FsStats> {
        let st = statvfs::statvfs(path)
            .map_err(|err| debug!(path = %path.display(), error = %err, "statvfs failed"))
            .ok()?;
        Some(FsStats {
            blocks: st.blocks() as u64,
            block_size: st.fragment_size() as u64,
            available_blocks: st.blocks_available() as u64,
            free_blocks: st.blocks_free() as u64,
        })
    }

    fn is_privileged(&self) -> bool {
        unistd::getuid().is_root()
    }
}
