use crate::snapshot::MemoryInfo;
use crate::sources::kernel::{Kernel, KernelStats};
use crate::sources::{read_trimmed, SourceError};
use std::path::Path;
use tracing::debug;

/// Held back from the reclaimable estimate to absorb counting noise (KiB).
const RECLAIM_MARGIN_KIB: u64 = 50 * 1024;

pub fn collect_memory(kernel: &dyn Kernel, meminfo: &Path) -> Option<MemoryInfo> {
    let Some(stats) = kernel.sysinfo() else {
        debug!("sysinfo(2) failed, memory section omitted");
        return None;
    };
    let estimate = match practically_free_kib(meminfo) {
        Ok(kib) => Some(kib),
        Err(err) => {
            debug!(error = %err, "no reclaimable memory estimate");
            None
        }
    };
    Some(memory_info(&stats, estimate))
}

/// Combines kernel counters with the meminfo estimate. Cache is only reported
/// when the estimate actually exceeds the raw free figure.
pub fn memory_info(stats: &KernelStats, estimate_kib: Option<u64>) -> MemoryInfo {
    let unit = stats.mem_unit;
    let free_ram_bytes = stats.free_ram.saturating_mul(unit);
    let reclaimable_bytes = estimate_kib
        .map(|kib| kib.saturating_mul(1024))
        .filter(|&total_free| total_free > free_ram_bytes)
        .map(|total_free| total_free - free_ram_bytes);

    MemoryInfo {
        total_ram_bytes: stats.total_ram.saturating_mul(unit),
        free_ram_bytes,
        reclaimable_bytes,
        total_swap_bytes: stats.total_swap.saturating_mul(unit),
        free_swap_bytes: stats.free_swap.saturating_mul(unit),
        uptime_seconds: stats.uptime_seconds,
    }
}

/// Free + buffers + page cache + reclaimable slab, in KiB, minus a margin.
pub fn practically_free_kib(meminfo: &Path) -> Result<u64, SourceError> {
    let text = read_trimmed(meminfo)?;
    let value = |key: &str| -> Option<u64> {
        text.lines().find_map(|line| {
            let (name, rest) = line.split_once(':')?;
            if name.trim() != key {
                return None;
            }
            rest.split_whitespace().next()?.parse().ok()
        })
    };

    let free = value("MemFree")
        .ok_or_else(|| SourceError::mismatch(meminfo.display().to_string(), "MemFree"))?;
    let slab = value("SReclaimable").or_else(|| value("Slab")).unwrap_or(0);
    let mut total = free
        + value("Buffers").unwrap_or(0)
        + value("Cached").unwrap_or(0)
        + slab;
    if total > RECLAIM_MARGIN_KIB {
        total -= RECLAIM_MARGIN_KIB;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fakes::FakeKernel;
    use std::io::Write;

    fn stats() -> KernelStats {
        KernelStats {
            total_ram: 4_000,
            free_ram: 100,
            total_swap: 2_000,
            free_swap: 1_500,
            uptime_seconds: 90,
            mem_unit: 1024,
        }
    }

    fn meminfo(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn estimate_above_raw_free_reports_caches() {
        let file = meminfo(
            "MemTotal:  4096000 kB\nMemFree:  100 kB\nBuffers:  1000 kB\n\
             Cached:  100000 kB\nSwapCached:  7 kB\nSReclaimable:  0 kB\n",
        );
        let kib = practically_free_kib(file.path()).unwrap();
        assert_eq!(kib, 100 + 1000 + 100_000 - 50 * 1024);

        let info = memory_info(&stats(), Some(kib));
        assert_eq!(info.free_ram_bytes, 100 * 1024);
        assert_eq!(info.reclaimable_bytes, Some(kib * 1024 - 100 * 1024));
        assert!(info.free_ram_display().starts_with("100.0 KiB (+ "));
        assert!(info.free_ram_display().ends_with(" Caches)"));
    }

    #[test]
    fn estimate_below_raw_free_reports_raw_only() {
        let file = meminfo("MemFree:  50 kB\nBuffers:  0 kB\nCached:  0 kB\n");
        let kib = practically_free_kib(file.path()).unwrap();
        assert_eq!(kib, 50);

        let info = memory_info(&stats(), Some(kib));
        assert_eq!(info.reclaimable_bytes, None);
        assert_eq!(info.free_ram_display(), "100.0 KiB");
    }

    #[test]
    fn slab_is_used_without_sreclaimable() {
        let file = meminfo("MemFree: 60000 kB\nSlab: 1000 kB\n");
        assert_eq!(practically_free_kib(file.path()).unwrap(), 61_000 - 50 * 1024);
    }

    #[test]
    fn scales_by_mem_unit() {
        let info = memory_info(&stats(), None);
        assert_eq!(info.total_ram_bytes, 4_000 * 1024);
        assert_eq!(info.total_swap_bytes, 2_000 * 1024);
        assert_eq!(info.free_swap_bytes, 1_500 * 1024);
        assert_eq!(info.uptime_seconds, 90);
    }

    #[test]
    fn failed_sysinfo_omits_section() {
        let kernel = FakeKernel::default();
        assert!(collect_memory(&kernel, Path::new("/proc/meminfo")).is_none());
    }

    #[test]
    fn missing_meminfo_keeps_raw_values() {
        let kernel = FakeKernel {
            stats: Some(stats()),
            ..FakeKernel::default()
        };
        let info = collect_memory(&kernel, Path::new("/nonexistent/sysfacts/meminfo")).unwrap();
        assert_eq!(info.reclaimable_bytes, None);
        assert_eq!(info.free_ram_bytes, 100 * 1024);
    }
}
