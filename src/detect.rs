//! Init system detection.
//!
//! Runs once at coordinator construction. Absence of systemd or upstart
//! artifacts is evidence for SysVInit, not a failure, so detection always
//! produces a value.

use std::fmt;
use std::path::Path;

use crate::cmd;

/// Directory systemd creates at boot, relative to the filesystem root.
const SYSTEMD_MARKER: &str = "run/systemd/system";

/// The init flavor active on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitKind {
    Systemd,
    Upstart,
    SysVInit,
}

impl InitKind {
    pub const ALL: [InitKind; 3] = [InitKind::Systemd, InitKind::Upstart, InitKind::SysVInit];

    pub fn name(&self) -> &'static str {
        match self {
            InitKind::Systemd => "systemd",
            InitKind::Upstart => "upstart",
            InitKind::SysVInit => "sysvinit",
        }
    }

    /// Parse a flavor identifier as it appears in configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "systemd" => Some(InitKind::Systemd),
            "upstart" => Some(InitKind::Upstart),
            "sysvinit" => Some(InitKind::SysVInit),
            _ => None,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            InitKind::Systemd => 0,
            InitKind::Upstart => 1,
            InitKind::SysVInit => 2,
        }
    }
}

impl fmt::Display for InitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the active init flavor under `root`. First match wins:
/// the systemd control directory, then a responding upstart `initctl`,
/// then SysVInit as the fallback.
pub fn detect(root: &Path) -> InitKind {
    if root.join(SYSTEMD_MARKER).is_dir() {
        return InitKind::Systemd;
    }

    if which::which("initctl").is_ok() {
        match cmd::run_output("initctl", ["--version"]) {
            Ok(version) if version.to_lowercase().contains("upstart") => {
                return InitKind::Upstart;
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("initctl version probe failed: {:#}", err),
        }
    }

    InitKind::SysVInit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn systemd_marker_takes_precedence() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(SYSTEMD_MARKER)).unwrap();
        // Other artifacts alongside the marker must not matter
        std::fs::create_dir_all(root.path().join("etc/init.d")).unwrap();
        std::fs::create_dir_all(root.path().join("etc/init")).unwrap();

        assert_eq!(detect(root.path()), InitKind::Systemd);
    }

    #[test]
    fn marker_must_be_a_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("run/systemd")).unwrap();
        std::fs::write(root.path().join(SYSTEMD_MARKER), "").unwrap();

        assert_ne!(detect(root.path()), InitKind::Systemd);
    }

    #[test]
    fn empty_root_never_detects_systemd() {
        let root = tempfile::tempdir().unwrap();
        assert_ne!(detect(root.path()), InitKind::Systemd);
    }

    #[test]
    fn flavor_names_round_trip() {
        for kind in InitKind::ALL {
            assert_eq!(InitKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(InitKind::from_name("launchd"), None);
    }
}
