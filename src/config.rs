use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default = "default_helper_timeout_ms")]
    pub helper_timeout_ms: u64,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub helpers: HelpersConfig,
}

/// Which release file names the distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    #[default]
    OsRelease,
    Redhat,
    Suse,
    Debian,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub cpuinfo: PathBuf,
    pub meminfo: PathBuf,
    /// Directory holding ACPI thermal zones (`<zone>/temperature`).
    pub thermal_zones: PathBuf,
    /// Root under which distribution release files are looked up.
    pub etc_dir: PathBuf,
    pub xorg_log: PathBuf,
    pub wayland_header: PathBuf,
    pub plasma_session: PathBuf,
    pub sysfs: PathBuf,
    pub udev_data: PathBuf,
    /// Kernel mount table in `/proc/mounts` format.
    pub mounts: PathBuf,
    /// Tried in order, the first readable one wins.
    pub pci_ids: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HelpersConfig {
    pub glxinfo: Vec<String>,
    pub desktop_version: Vec<String>,
    pub applications_version: Vec<String>,
    pub network_status: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            distribution: Distribution::default(),
            helper_timeout_ms: default_helper_timeout_ms(),
            sources: SourcesConfig::default(),
            helpers: HelpersConfig::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cpuinfo: PathBuf::from("/proc/cpuinfo"),
            meminfo: PathBuf::from("/proc/meminfo"),
            thermal_zones: PathBuf::from("/proc/acpi/thermal_zone"),
            etc_dir: PathBuf::from("/etc"),
            xorg_log: PathBuf::from("/var/log/Xorg.0.log"),
            wayland_header: PathBuf::from("/usr/include/wayland-version.h"),
            plasma_session: PathBuf::from("/usr/share/xsessions/plasma.desktop"),
            sysfs: PathBuf::from("/sys"),
            udev_data: PathBuf::from("/run/udev/data"),
            mounts: PathBuf::from("/proc/self/mounts"),
            pci_ids: vec![
                PathBuf::from("/usr/share/hwdata/pci.ids"),
                PathBuf::from("/usr/share/misc/pci.ids"),
            ],
        }
    }
}

impl Default for HelpersConfig {
    fn default() -> Self {
        Self {
            glxinfo: command(&["glxinfo"]),
            desktop_version: command(&["kf5-config", "--version"]),
            applications_version: command(&["dolphin", "--version"]),
            network_status: command(&["nmcli", "-t", "-f", "STATE", "general"]),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation("listen is required".to_string()));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port address".to_string(),
            ));
        }
        if self.helper_timeout_ms < 1 {
            return Err(ConfigError::Validation(
                "helper_timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.sources.sysfs.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "sources.sysfs must not be empty".to_string(),
            ));
        }

        validate_helpers(&self.helpers)?;

        Ok(())
    }

    pub fn helper_timeout(&self) -> Duration {
        Duration::from_millis(self.helper_timeout_ms)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_helpers(helpers: &HelpersConfig) -> Result<(), ConfigError> {
    let entries = [
        ("glxinfo", &helpers.glxinfo),
        ("desktop_version", &helpers.desktop_version),
        ("applications_version", &helpers.applications_version),
        ("network_status", &helpers.network_status),
    ];
    for (name, cmd) in entries {
        // An empty list disables the helper; a blank program name is a typo.
        if cmd.first().is_some_and(|program| program.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "helpers.{name}: program name must not be empty"
            )));
        }
    }
    Ok(())
}

fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn default_listen() -> String {
    "127.0.0.1:9109".to_string()
}

const fn default_helper_timeout_ms() -> u64 {
    3000
}
