pub mod cpu;
pub mod desktop;
pub mod disks;
pub mod graphics;
#[cfg(feature = "hwdb")]
pub mod hwdb;
pub mod memory;
pub mod network;
pub mod os;
pub mod power;

use crate::config::Config;
use crate::snapshot::Snapshot;
use crate::sources::devices::{DeviceService, SysfsDeviceService};
use crate::sources::kernel::{Kernel, NixKernel};
use crate::sources::mounts::{MountTable, ProcMountTable};
use graphics::{GraphicsCache, GraphicsSources};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Runs full scans. Holds the OS seams and the graphics cache, so one
/// `Scanner` should live for the whole process.
pub struct Scanner {
    config: Config,
    kernel: Arc<dyn Kernel>,
    devices: Arc<dyn DeviceService>,
    mounts: Arc<dyn MountTable>,
    graphics: GraphicsCache,
}

impl Scanner {
    pub fn new(config: Config) -> Self {
        let mounts: Arc<dyn MountTable> =
            Arc::new(ProcMountTable::new(config.sources.mounts.clone()));
        let devices = Arc::new(SysfsDeviceService::new(
            config.sources.sysfs.clone(),
            config.sources.udev_data.clone(),
            mounts.clone(),
        ));
        Self::with_services(config, Arc::new(NixKernel), devices, mounts)
    }

    pub fn with_services(
        config: Config,
        kernel: Arc<dyn Kernel>,
        devices: Arc<dyn DeviceService>,
        mounts: Arc<dyn MountTable>,
    ) -> Self {
        Self {
            config,
            kernel,
            devices,
            mounts,
            graphics: GraphicsCache::new(),
        }
    }

    /// One sequential pass over every source. Never fails: a source that is
    /// missing only leaves its section empty.
    pub async fn scan(&self) -> Snapshot {
        let started = Instant::now();
        let cfg = &self.config;
        let timeout = cfg.helper_timeout();

        let os = os::collect_os(self.kernel.as_ref(), cfg.distribution, &cfg.sources.etc_dir);
        let desktop = desktop::collect_desktop(
            &cfg.sources.plasma_session,
            &cfg.helpers.desktop_version,
            &cfg.helpers.applications_version,
            timeout,
        )
        .await;
        let cpu = cpu::collect_cpu(&cfg.sources.cpuinfo, &cfg.sources.thermal_zones);

        let mut display = self
            .graphics
            .get_or_probe(&self.graphics_sources())
            .await
            .unwrap_or_default();
        display.wayland_version = graphics::wayland_version(&cfg.sources.wayland_header);
        let graphics = (!display.is_empty()).then_some(display);

        let power = power::collect_power(self.devices.as_ref());
        let memory = memory::collect_memory(self.kernel.as_ref(), &cfg.sources.meminfo);
        let network = network::collect_network(&cfg.helpers.network_status, timeout).await;
        let devices = disks::collect_devices(
            self.devices.as_ref(),
            self.mounts.as_ref(),
            self.kernel.as_ref(),
        );

        info!(
            devices = devices.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );

        Snapshot {
            os,
            desktop,
            cpu,
            graphics,
            power,
            memory,
            network,
            devices,
        }
    }

    /// Drops the cached graphics classification.
    #[cfg(test)]
    pub fn reset_graphics(&mut self) {
        self.graphics.reset();
    }

    fn graphics_sources(&self) -> GraphicsSources {
        GraphicsSources {
            xorg_log: self.config.sources.xorg_log.clone(),
            glxinfo: self.config.helpers.glxinfo.clone(),
            timeout: self.config.helper_timeout(),
            sysfs: self.config.sources.sysfs.clone(),
            pci_ids: self.config.sources.pci_ids.clone(),
        }
    }
}
