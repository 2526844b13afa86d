use super::ServiceProvider;
use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::cmd;

/// Directories systemd loads unit files from, relative to the root.
const UNIT_DIRS: [&str; 3] = [
    "etc/systemd/system",
    "lib/systemd/system",
    "usr/lib/systemd/system",
];

#[derive(Debug)]
pub struct Systemd {
    root: PathBuf,
}

impl Systemd {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn ctl(&self, verb: &str, service: &str) -> Result<()> {
        let unit = Self::unit_name(service);
        cmd::run("systemctl", [verb, unit.as_str()])
    }

    /// Qualify a bare service name with the .service suffix. Names that
    /// already carry a unit suffix (socket, timer, ...) pass through.
    fn unit_name(service: &str) -> String {
        if service.contains('.') {
            service.to_string()
        } else {
            format!("{}.service", service)
        }
    }
}

impl ServiceProvider for Systemd {
    fn name(&self) -> &str {
        "systemd"
    }

    fn is_enabled(&self, service: &str) -> bool {
        let unit = Self::unit_name(service);
        cmd::run_status("systemctl", ["is-enabled", "--quiet", unit.as_str()])
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn enable(&self, service: &str) -> Result<()> {
        self.ctl("enable", service)
    }

    fn disable(&self, service: &str) -> Result<()> {
        self.ctl("disable", service)
    }

    fn remove(&self, service: &str) -> Result<()> {
        let unit = Self::unit_name(service);

        if let Err(err) = cmd::run("systemctl", ["disable", unit.as_str()]) {
            tracing::debug!("disable before removal of {} failed: {:#}", unit, err);
        }

        for path in self.definition_files(service) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("removed unit file {}", path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("Failed to remove unit file {}", path.display())));
                }
            }
        }

        cmd::run("systemctl", ["daemon-reload"])
    }

    fn start(&self, service: &str) -> Result<()> {
        self.ctl("start", service)
    }

    fn stop(&self, service: &str) -> Result<()> {
        self.ctl("stop", service)
    }

    fn restart(&self, service: &str) -> Result<()> {
        self.ctl("restart", service)
    }

    fn reload(&self, service: &str) -> Result<()> {
        self.ctl("reload", service)
    }

    fn is_running(&self, service: &str) -> Result<bool> {
        let unit = Self::unit_name(service);
        let status = cmd::run_status("systemctl", ["is-active", "--quiet", unit.as_str()])?;

        // is-active exits 0 for active, 3 for inactive/failed. Anything
        // else (4 is "no such unit") means the probe could not answer.
        match status.code() {
            Some(0) => Ok(true),
            Some(3) => Ok(false),
            code => anyhow::bail!("systemctl is-active {} reported status {:?}", unit, code),
        }
    }

    fn has_service(&self, service: &str) -> bool {
        if self.definition_files(service).iter().any(|p| p.exists()) {
            return true;
        }

        let unit = Self::unit_name(service);
        cmd::run_status("systemctl", ["cat", unit.as_str()])
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn definition_files(&self, service: &str) -> Vec<PathBuf> {
        let unit = Self::unit_name(service);
        UNIT_DIRS
            .iter()
            .map(|dir| self.root.join(dir).join(&unit))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_get_service_suffix() {
        assert_eq!(Systemd::unit_name("postfix"), "postfix.service");
        assert_eq!(Systemd::unit_name("proftpd.socket"), "proftpd.socket");
    }

    #[test]
    fn definition_files_cover_all_unit_dirs() {
        let provider = Systemd::new(Path::new("/target"));
        let files = provider.definition_files("mysql");

        assert_eq!(files.len(), 3);
        assert!(files
            .iter()
            .any(|p| p == Path::new("/target/etc/systemd/system/mysql.service")));
        assert!(files
            .iter()
            .any(|p| p == Path::new("/target/lib/systemd/system/mysql.service")));
    }

    #[test]
    fn has_service_sees_unit_file_under_root() {
        let root = tempfile::tempdir().unwrap();
        let unit_dir = root.path().join("etc/systemd/system");
        std::fs::create_dir_all(&unit_dir).unwrap();
        std::fs::write(unit_dir.join("named.service"), "[Unit]\n").unwrap();

        let provider = Systemd::new(root.path());
        assert!(provider.has_service("named"));
    }
}
