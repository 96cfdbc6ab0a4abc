//! Best-effort graphics identification.
//!
//! Three sources are layered, each later one overriding the earlier:
//! modules loaded by the X server, the strings reported by `glxinfo`, and
//! (with the `hwdb` feature) the PCI id database entry of the display adapter.

use crate::snapshot::GraphicsInfo;
use crate::sources::helper::{extract_prefixed, run_helper};
use crate::sources::{read_field, read_lines, FieldMode};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

pub const VENDOR_ATI: &str = "ATI Technologies Inc.";
pub const VENDOR_NVIDIA: &str = "NVIDIA Corporation";

/// Xorg 2D driver modules, vendor drivers first and generic fallbacks last.
const DRIVER_2D_CANDIDATES: [&str; 15] = [
    "fglrx",
    "intel",
    "nouveau",
    "nv",
    "nvidia",
    "openchrome",
    "radeon",
    "radeonhd",
    "vboxvideo",
    "amdgpu",
    "qxl",
    "vmware",
    "modesetting",
    "vesa",
    "fbdev",
];

#[allow(clippy::expect_used)] // fixed patterns, checked by the tests below
static GALLIUM_CHIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Gallium.+on (\S+)").expect("static regex should not panic"));
#[allow(clippy::expect_used)]
static DRI_CHIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(R[0-9]00) \(([^)]+)\)").expect("static regex should not panic")
});
#[allow(clippy::expect_used)]
static NVIDIA_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(NVIDIA [0-9.]+)").expect("static regex should not panic"));
#[allow(clippy::expect_used)]
static MESA_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Mesa (\S+)").expect("static regex should not panic"));
#[allow(clippy::expect_used)]
static LOAD_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\(II\) LoadModule: "(\S+)""#).expect("static regex should not panic")
});
#[allow(clippy::expect_used)]
static UNLOAD_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\(II\) UnloadModule: "(\S+)""#).expect("static regex should not panic")
});

/// The primary display adapter as named by the hardware database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayAdapter {
    pub vendor: Option<String>,
    pub device: Option<String>,
    /// Bound kernel driver, tried before the fixed 2D candidates.
    pub driver: Option<String>,
}

/// `OpenGL … string:` values from the 3D probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlStrings {
    pub vendor: Option<String>,
    pub renderer: Option<String>,
    pub version: Option<String>,
}

impl GlStrings {
    pub fn from_lines(lines: &[String]) -> Self {
        Self {
            vendor: extract_prefixed(lines, "OpenGL vendor string:", ":"),
            renderer: extract_prefixed(lines, "OpenGL renderer string:", ":"),
            version: extract_prefixed(lines, "OpenGL version string:", ":"),
        }
    }

    fn vendor(&self) -> &str {
        self.vendor.as_deref().unwrap_or("")
    }

    fn renderer(&self) -> &str {
        self.renderer.as_deref().unwrap_or("")
    }

    fn version(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }
}

/// Fields a renderer rule sets; `None` leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Update {
    vendor: Option<String>,
    model: Option<String>,
    driver_3d: Option<String>,
}

type RendererRule = fn(&GlStrings) -> Option<Update>;

/// Tried in order, the first rule that fires decides the 3D driver.
const RENDERER_RULES: [RendererRule; 5] = [
    software_rasterizer,
    gallium,
    mesa_dri,
    ati_proprietary,
    nvidia_proprietary,
];

fn software_rasterizer(gl: &GlStrings) -> Option<Update> {
    gl.renderer().contains("Software Rasterizer").then(|| Update {
        driver_3d: Some("swrast (No 3D Acceleration)".to_string()),
        ..Update::default()
    })
}

fn gallium(gl: &GlStrings) -> Option<Update> {
    let chip = GALLIUM_CHIP.captures(gl.renderer())?.get(1)?.as_str().to_string();
    let vendor = gl.vendor();
    let (vendor, tag) = if vendor.contains("R300") {
        (Some(VENDOR_ATI), "R300")
    } else if vendor.contains("R600") {
        (Some(VENDOR_ATI), "R600")
    } else if vendor.contains("nouveau") {
        (Some(VENDOR_NVIDIA), "nouveau")
    } else {
        (None, "Unknown")
    };
    Some(Update {
        vendor: vendor.map(str::to_string),
        model: Some(chip),
        driver_3d: Some(format!("{tag} Gallium")),
    })
}

fn mesa_dri(gl: &GlStrings) -> Option<Update> {
    let renderer = gl.renderer();
    if !renderer.contains("Mesa DRI") {
        return None;
    }
    let chip = DRI_CHIP
        .captures(renderer)
        .and_then(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())));
    Some(match chip {
        Some((code, description)) => Update {
            vendor: Some(VENDOR_ATI.to_string()),
            model: Some(description.to_string()),
            driver_3d: Some(format!("{code} classic")),
        },
        None => Update {
            driver_3d: Some("Mesa classic".to_string()),
            ..Update::default()
        },
    })
}

fn ati_proprietary(gl: &GlStrings) -> Option<Update> {
    let vendor = gl.vendor();
    (vendor.contains("ATI") || vendor.contains("Advanced Micro Devices")).then(|| Update {
        vendor: Some(VENDOR_ATI.to_string()),
        model: gl.renderer.clone(),
        driver_3d: Some("ATI".to_string()),
    })
}

fn nvidia_proprietary(gl: &GlStrings) -> Option<Update> {
    if !gl.vendor().contains("NVIDIA") {
        return None;
    }
    let tag = NVIDIA_VERSION
        .captures(gl.version())
        .and_then(|caps| caps.get(1))
        .map_or("NVIDIA", |m| m.as_str());
    Some(Update {
        vendor: Some(VENDOR_NVIDIA.to_string()),
        model: gl.renderer.clone(),
        driver_3d: Some(tag.to_string()),
    })
}

fn mesa_version(version: &str) -> Option<String> {
    Some(MESA_VERSION.captures(version)?.get(1)?.as_str().to_string())
}

/// Runs the three layers over already-gathered inputs. Pure, so every branch
/// can be tested without a display.
pub fn classify(
    loaded_modules: &[String],
    gl: &GlStrings,
    adapter: Option<&DisplayAdapter>,
) -> GraphicsInfo {
    let mut info = GraphicsInfo {
        driver_2d: first_loaded(loaded_modules, adapter),
        vendor: gl.vendor.clone(),
        model: gl.renderer.clone(),
        ..GraphicsInfo::default()
    };

    if let Some(update) = RENDERER_RULES.iter().find_map(|rule| rule(gl)) {
        info.vendor = update.vendor.or(info.vendor);
        info.model = update.model.or(info.model);
        info.driver_3d = update.driver_3d;
    }

    if let Some(mesa) = mesa_version(gl.version()) {
        info.driver_3d = Some(match info.driver_3d.take() {
            Some(tag) => format!("{tag} ({mesa})"),
            None => format!("Mesa ({mesa})"),
        });
    }

    if let Some(adapter) = adapter {
        if adapter.vendor.is_some() {
            info.vendor = adapter.vendor.clone();
        }
        if let Some(device) = adapter.device.as_ref().filter(|d| !d.is_empty()) {
            info.model = Some(device.clone());
        }
    }

    info
}

fn first_loaded(loaded_modules: &[String], adapter: Option<&DisplayAdapter>) -> Option<String> {
    adapter
        .and_then(|a| a.driver.as_deref())
        .into_iter()
        .chain(DRIVER_2D_CANDIDATES)
        .find(|candidate| loaded_modules.iter().any(|m| m == candidate))
        .map(str::to_string)
}

/// Modules still loaded at the end of an Xorg log, in load order.
pub fn loaded_modules(xorg_log: &Path) -> Vec<String> {
    let lines = match read_lines(xorg_log) {
        Ok(lines) => lines,
        Err(err) => {
            debug!(error = %err, "display server log unavailable");
            return Vec::new();
        }
    };

    let mut modules: Vec<String> = Vec::new();
    for line in &lines {
        if let Some(caps) = LOAD_MODULE.captures(line) {
            modules.push(caps[1].to_string());
        } else if let Some(caps) = UNLOAD_MODULE.captures(line) {
            if let Some(pos) = modules.iter().position(|m| *m == caps[1]) {
                modules.remove(pos);
            }
        }
    }
    modules
}

pub fn wayland_version(header: &Path) -> Option<String> {
    read_field(header, "#define WAYLAND_VERSION", "\"", FieldMode::First)
        .map_err(|err| debug!(error = %err, "wayland version unavailable"))
        .ok()
}

/// Where the classifier gets its raw inputs.
#[derive(Debug, Clone)]
pub struct GraphicsSources {
    pub xorg_log: PathBuf,
    pub glxinfo: Vec<String>,
    pub timeout: Duration,
    pub sysfs: PathBuf,
    pub pci_ids: Vec<PathBuf>,
}

/// Gathers all inputs and classifies. `None` when nothing at all was learned.
pub async fn probe(sources: &GraphicsSources) -> Option<GraphicsInfo> {
    let modules = loaded_modules(&sources.xorg_log);

    let gl = if sources.glxinfo.is_empty() {
        GlStrings::default()
    } else {
        match run_helper(&sources.glxinfo, sources.timeout).await {
            Ok(lines) => GlStrings::from_lines(&lines),
            Err(err) => {
                debug!(error = %err, "3D probe unavailable");
                GlStrings::default()
            }
        }
    };

    let adapter = primary_adapter(&sources.sysfs, &sources.pci_ids);
    let info = classify(&modules, &gl, adapter.as_ref());
    (!info.is_empty()).then_some(info)
}

#[cfg(feature = "hwdb")]
fn primary_adapter(sysfs: &Path, pci_ids: &[PathBuf]) -> Option<DisplayAdapter> {
    super::hwdb::primary_display_adapter(sysfs, pci_ids)
}

#[cfg(not(feature = "hwdb"))]
fn primary_adapter(_sysfs: &Path, _pci_ids: &[PathBuf]) -> Option<DisplayAdapter> {
    None
}

/// Holds the classification for the rest of the process once computed.
#[derive(Debug, Default)]
pub struct GraphicsCache {
    cell: OnceCell<Option<GraphicsInfo>>,
}

impl GraphicsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_probe(&self, sources: &GraphicsSources) -> Option<GraphicsInfo> {
        self.cell.get_or_init(|| probe(sources)).await.clone()
    }

    #[cfg(test)]
    pub fn is_filled(&self) -> bool {
        self.cell.initialized()
    }

    /// Forgets the cached result so the next scan probes again.
    #[cfg(test)]
    pub fn reset(&mut self) {
        self.cell.take();
    }
}
