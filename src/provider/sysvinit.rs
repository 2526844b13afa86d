use super::ServiceProvider;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cmd;

/// Runlevels a service is started in by default.
const START_RUNLEVELS: [&str; 4] = ["etc/rc2.d", "etc/rc3.d", "etc/rc4.d", "etc/rc5.d"];

/// All runlevel directories, including halt/single/reboot.
const ALL_RUNLEVELS: [&str; 7] = [
    "etc/rc0.d",
    "etc/rc1.d",
    "etc/rc2.d",
    "etc/rc3.d",
    "etc/rc4.d",
    "etc/rc5.d",
    "etc/rc6.d",
];

/// Which toolchain manages enablement links for this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toolchain {
    /// update-rc.d / invoke-rc.d
    Debian,
    /// chkconfig / service
    Generic,
}

#[derive(Debug)]
pub struct Sysvinit {
    root: PathBuf,
    script_dir: &'static str,
    toolchain: Toolchain,
}

impl Sysvinit {
    /// SysVInit configuration for Debian-family hosts
    pub fn debian(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            script_dir: "etc/init.d",
            toolchain: Toolchain::Debian,
        }
    }

    /// Flavor-generic SysVInit configuration
    pub fn generic(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            script_dir: "etc/init.d",
            toolchain: Toolchain::Generic,
        }
    }

    fn script_path(&self, service: &str) -> PathBuf {
        self.root.join(self.script_dir).join(service)
    }

    fn service_tool(&self) -> &'static str {
        match self.toolchain {
            Toolchain::Debian => "invoke-rc.d",
            Toolchain::Generic => "service",
        }
    }

    fn invoke(&self, service: &str, verb: &str) -> Result<()> {
        cmd::run(self.service_tool(), [service, verb])
    }

    /// Delete every S/K link pointing at the service across all runlevels.
    fn remove_runlevel_links(&self, service: &str) -> Result<()> {
        for runlevel_dir in &ALL_RUNLEVELS {
            let dir = self.root.join(runlevel_dir);
            if !dir.exists() {
                continue;
            }

            for entry in fs::read_dir(&dir)?.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if link_matches(name, service, &['S', 'K']) {
                        fs::remove_file(entry.path())?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Match a runlevel link name (`S20cron`, `K80cron`) against a service.
/// The link is one of the given prefixes, a sequence number, and the
/// exact service name.
fn link_matches(name: &str, service: &str, prefixes: &[char]) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if prefixes.contains(&c) => {}
        _ => return false,
    }
    chars.as_str().trim_start_matches(|c: char| c.is_ascii_digit()) == service
}

impl ServiceProvider for Sysvinit {
    fn name(&self) -> &str {
        "sysvinit"
    }

    fn is_enabled(&self, service: &str) -> bool {
        // Enabled means a start link exists in at least one default runlevel
        for runlevel_dir in &START_RUNLEVELS {
            let dir = self.root.join(runlevel_dir);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if link_matches(name, service, &['S']) {
                        return true;
                    }
                }
            }
        }

        false
    }

    fn enable(&self, service: &str) -> Result<()> {
        if !self.has_service(service) {
            anyhow::bail!(
                "Service {} not found in {}",
                service,
                self.root.join(self.script_dir).display()
            );
        }

        match self.toolchain {
            Toolchain::Debian => {
                cmd::run("update-rc.d", [service, "defaults"])?;
                cmd::run("update-rc.d", [service, "enable"])
            }
            Toolchain::Generic => cmd::run("chkconfig", [service, "on"]),
        }
    }

    fn disable(&self, service: &str) -> Result<()> {
        match self.toolchain {
            Toolchain::Debian => cmd::run("update-rc.d", [service, "disable"]),
            Toolchain::Generic => cmd::run("chkconfig", [service, "off"]),
        }
    }

    fn remove(&self, service: &str) -> Result<()> {
        match self.toolchain {
            Toolchain::Debian => {
                cmd::run("update-rc.d", ["-f", service, "remove"])?;
            }
            Toolchain::Generic => {
                self.remove_runlevel_links(service)?;
            }
        }

        match fs::remove_file(self.script_path(service)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(anyhow::Error::new(err).context(format!(
                "Failed to remove init script for {}",
                service
            ))),
        }
    }

    fn start(&self, service: &str) -> Result<()> {
        if self.is_running(service).unwrap_or(false) {
            return Ok(());
        }
        self.invoke(service, "start")
    }

    fn stop(&self, service: &str) -> Result<()> {
        if !self.is_running(service).unwrap_or(false) {
            return Ok(());
        }
        self.invoke(service, "stop")
    }

    fn restart(&self, service: &str) -> Result<()> {
        if self.is_running(service)? {
            self.invoke(service, "restart")
        } else {
            self.invoke(service, "start")
        }
    }

    fn reload(&self, service: &str) -> Result<()> {
        if self.is_running(service)? {
            self.invoke(service, "reload")
        } else {
            self.invoke(service, "start")
        }
    }

    fn is_running(&self, service: &str) -> Result<bool> {
        if !self.has_service(service) {
            anyhow::bail!("Unknown service: {}", service);
        }

        let status = cmd::run_status(self.service_tool(), [service, "status"])?;

        // LSB status: 0 running, 1-3 stopped in various ways
        match status.code() {
            Some(0) => Ok(true),
            Some(1..=3) => Ok(false),
            code => anyhow::bail!("{} status for {} reported {:?}", self.service_tool(), service, code),
        }
    }

    fn has_service(&self, service: &str) -> bool {
        self.script_path(service).exists()
    }

    fn definition_files(&self, service: &str) -> Vec<PathBuf> {
        vec![self.script_path(service)]
    }
}
