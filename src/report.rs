//! Plain-text rendering of a snapshot. Sections without data are skipped.

use crate::format::formatted_unit;
use crate::snapshot::Snapshot;
use std::fmt::Write;

pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, snapshot);
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn write_report(out: &mut String, s: &Snapshot) -> std::fmt::Result {
    let os = &s.os;
    writeln!(out, "OS Information")?;
    writeln!(out, "  OS: {}", os.distribution)?;
    writeln!(out, "  Kernel: {} {} {}", os.sysname, os.release, os.machine)?;
    writeln!(out, "  Host: {}", os.hostname)?;
    if let Some(desktop) = &s.desktop {
        let rows = [
            ("Plasma", &desktop.plasma_version),
            ("KDE Frameworks", &desktop.frameworks_version),
            ("KDE Applications", &desktop.applications_version),
            ("Qt", &desktop.qt_version),
        ];
        for (name, value) in rows {
            if let Some(value) = value {
                writeln!(out, "  {name}: {value}")?;
            }
        }
    }

    if let Some(gfx) = &s.graphics {
        writeln!(out, "\nDisplay Info")?;
        let rows = [
            ("Vendor", &gfx.vendor),
            ("Model", &gfx.model),
            ("2D driver", &gfx.driver_2d),
            ("3D driver", &gfx.driver_3d),
            ("Wayland", &gfx.wayland_version),
        ];
        for (name, value) in rows {
            if let Some(value) = value {
                writeln!(out, "  {name}: {value}")?;
            }
        }
    }

    if let Some(power) = &s.power {
        writeln!(out, "\nBattery Information")?;
        if let Some(battery) = &power.battery {
            writeln!(out, "  Battery present: {}", yes_no(battery.present))?;
            writeln!(out, "  State: {}", battery.charge_state)?;
            writeln!(out, "  Charge percent: {}%", battery.charge_percent)?;
            writeln!(out, "  Rechargeable: {}", yes_no(battery.rechargeable))?;
        }
        if let Some(plugged) = power.ac_plugged {
            writeln!(out, "  AC plugged: {}", yes_no(plugged))?;
        }
    }

    if let Some(cpu) = &s.cpu {
        writeln!(out, "\nCPU Information")?;
        writeln!(out, "  Processor (CPU): {}", cpu.model)?;
        if let Some(mhz) = cpu.speed_mhz {
            writeln!(out, "  Speed: {mhz:.2} MHz")?;
        }
        if let Some(cores) = cpu.logical_cores.filter(|&n| n > 1) {
            writeln!(out, "  Cores: {cores}")?;
        }
        if let Some(temp) = cpu.temperature_celsius {
            writeln!(out, "  Temperature: {temp} °C")?;
        }
    }

    if let Some(mem) = &s.memory {
        writeln!(out, "\nMemory Information")?;
        let total = formatted_unit(mem.total_ram_bytes);
        writeln!(out, "  Total memory (RAM): {total}")?;
        writeln!(out, "  Free memory: {}", mem.free_ram_display())?;
        writeln!(out, "  Total swap: {}", formatted_unit(mem.total_swap_bytes))?;
        writeln!(out, "  Free swap: {}", formatted_unit(mem.free_swap_bytes))?;
        writeln!(out, "  Uptime: {}", mem.uptime_display())?;
    }

    if let Some(state) = s.network {
        writeln!(out, "\nNetwork Status")?;
        writeln!(out, "  Network is {state}")?;
    }

    writeln!(out, "\nDisk Information")?;
    for dev in &s.devices {
        write!(out, "  {} ({}) {}", dev.label, dev.device_node, dev.fs_type)?;
        if let Some(total) = dev.total_display() {
            write!(out, " total {total}")?;
        }
        if let Some(avail) = dev.available_display() {
            let used = formatted_unit(dev.usage_bytes());
            write!(out, " free {avail}, used {used} ({}%)", dev.usage_percent())?;
        }
        if dev.removable {
            write!(out, " [removable]")?;
        }
        writeln!(out)?;
    }
    Ok(())
}
