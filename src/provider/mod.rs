mod systemd;
mod sysvinit;
mod upstart;

pub use systemd::Systemd;
pub use sysvinit::Sysvinit;
pub use upstart::Upstart;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detect::InitKind;

/// Trait for init system providers (systemd, upstart, sysvinit).
///
/// A provider executes one primitive lifecycle operation against the OS.
/// Mutating operations report the tool's own diagnostic on failure; the
/// coordinator wraps them with operation and service context.
pub trait ServiceProvider: Send + Sync + std::fmt::Debug {
    /// Name of the init flavor this provider drives
    fn name(&self) -> &str;

    /// Check if a service starts at boot
    fn is_enabled(&self, service: &str) -> bool;

    /// Enable a service to start at boot
    fn enable(&self, service: &str) -> Result<()>;

    /// Disable a service from starting at boot
    fn disable(&self, service: &str) -> Result<()>;

    /// Remove the service definition from the system
    fn remove(&self, service: &str) -> Result<()>;

    fn start(&self, service: &str) -> Result<()>;

    fn stop(&self, service: &str) -> Result<()>;

    fn restart(&self, service: &str) -> Result<()>;

    fn reload(&self, service: &str) -> Result<()>;

    /// Probe whether the service is currently running. Errors here mean the
    /// probe itself could not answer (unknown service, missing tool).
    fn is_running(&self, service: &str) -> Result<bool>;

    /// Check if a definition for the service exists at all
    fn has_service(&self, service: &str) -> bool;

    /// Definition files this flavor would have created for the service.
    /// Used to clean up leftovers after an init-system migration.
    fn definition_files(&self, service: &str) -> Vec<PathBuf>;
}

/// Resolve the provider for an init flavor, preferring the most OS-specific
/// implementation and falling back to the flavor-generic one.
pub fn resolve(kind: InitKind, root: &Path) -> Arc<dyn ServiceProvider> {
    match kind {
        InitKind::Systemd => Arc::new(Systemd::new(root)),
        InitKind::Upstart => Arc::new(Upstart::new(root)),
        InitKind::SysVInit => {
            if root.join("etc/debian_version").exists() {
                Arc::new(Sysvinit::debian(root))
            } else {
                Arc::new(Sysvinit::generic(root))
            }
        }
    }
}
