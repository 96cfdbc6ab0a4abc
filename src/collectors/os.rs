use crate::config::Distribution;
use crate::snapshot::OsInfo;
use crate::sources::kernel::Kernel;
use crate::sources::{read_field, read_first_line, FieldMode};
use std::path::Path;
use tracing::debug;

const UNKNOWN_DISTRIBUTION: &str = "Unknown";

pub fn collect_os(kernel: &dyn Kernel, distribution: Distribution, etc_dir: &Path) -> OsInfo {
    let uts = kernel.uname();
    let label = distribution_label(distribution, etc_dir)
        .unwrap_or_else(|| UNKNOWN_DISTRIBUTION.to_string())
        .replace("X86-64", "x86_64");

    OsInfo {
        sysname: uts.sysname,
        release: uts.release,
        version: uts.version,
        machine: uts.machine,
        hostname: uts.nodename,
        distribution: label,
    }
}

fn distribution_label(distribution: Distribution, etc_dir: &Path) -> Option<String> {
    let file = match distribution {
        Distribution::None => return None,
        Distribution::OsRelease => return os_release(&etc_dir.join("os-release")),
        Distribution::Redhat => "redhat-release",
        Distribution::Suse => "SuSE-release",
        Distribution::Debian => "debian_version",
    };
    let path = etc_dir.join(file);
    read_first_line(&path)
        .map_err(|err| debug!(error = %err, "release file unavailable"))
        .ok()
}

/// `NAME VERSION` from an os-release file, quotes removed.
fn os_release(path: &Path) -> Option<String> {
    let field = |key: &str| {
        read_field(path, key, "=", FieldMode::First)
            .map(|v| v.replace('"', ""))
            .map_err(|err| debug!(error = %err, key, "os-release field unavailable"))
            .ok()
    };
    let parts: Vec<String> = [field("NAME="), field("VERSION=")]
        .into_iter()
        .flatten()
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fakes::FakeKernel;
    use crate::sources::kernel::Uname;
    use std::fs;

    fn kernel() -> FakeKernel {
        FakeKernel {
            uname: Uname {
                sysname: "Linux".to_string(),
                release: "6.5.0".to_string(),
                version: "#1 SMP".to_string(),
                machine: "x86_64".to_string(),
                nodename: "box".to_string(),
            },
            ..FakeKernel::default()
        }
    }

    #[test]
    fn os_release_name_and_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("os-release"),
            "PRETTY_NAME=\"Ubuntu 22.04.3 LTS\"\nNAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\n\
             VERSION=\"22.04.3 LTS (Jammy Jellyfish)\"\nID=ubuntu\n",
        )
        .unwrap();

        let os = collect_os(&kernel(), Distribution::OsRelease, dir.path());
        assert_eq!(os.distribution, "Ubuntu 22.04.3 LTS (Jammy Jellyfish)");
        assert_eq!(os.sysname, "Linux");
        assert_eq!(os.hostname, "box");
    }

    #[test]
    fn release_file_first_line_with_arch_fixup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("SuSE-release"),
            "openSUSE 11.1 (X86-64)\nVERSION = 11.1\n",
        )
        .unwrap();
        let os = collect_os(&kernel(), Distribution::Suse, dir.path());
        assert_eq!(os.distribution, "openSUSE 11.1 (x86_64)");
    }

    #[test]
    fn unconfigured_or_missing_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("debian_version"), "12.2\n").unwrap();
        assert_eq!(
            collect_os(&kernel(), Distribution::None, dir.path()).distribution,
            "Unknown"
        );
        assert_eq!(
            collect_os(&kernel(), Distribution::Redhat, dir.path()).distribution,
            "Unknown"
        );
        assert_eq!(
            collect_os(&kernel(), Distribution::Debian, dir.path()).distribution,
            "12.2"
        );
    }
}
