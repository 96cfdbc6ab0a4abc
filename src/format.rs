const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Renders a byte count in binary units with one decimal place.
/// GiB from 1 GiB upwards, MiB from 1 MiB, KiB below that.
pub fn formatted_unit(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    }
}

/// Used share of a device as `(total - available) / (total / 100)`.
///
/// Integer division on purpose: devices smaller than 100 bytes report 0
/// rather than dividing by zero.
pub fn usage_percent(total: u64, available: u64) -> u64 {
    let per_cent = total / 100;
    if total == 0 || per_cent == 0 {
        return 0;
    }
    total.saturating_sub(available) / per_cent
}
