use super::ServiceProvider;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cmd;

/// Upstart provider. Job definitions live under `etc/init` as
/// `<name>.conf`; boot-time enablement is controlled through the
/// companion `<name>.override` file and its `manual` stanza.
#[derive(Debug)]
pub struct Upstart {
    root: PathBuf,
    job_dir: &'static str,
}

impl Upstart {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            job_dir: "etc/init",
        }
    }

    fn job_file(&self, service: &str) -> PathBuf {
        self.root.join(self.job_dir).join(format!("{}.conf", service))
    }

    fn override_file(&self, service: &str) -> PathBuf {
        self.root
            .join(self.job_dir)
            .join(format!("{}.override", service))
    }

    fn override_is_manual(&self, service: &str) -> bool {
        fs::read_to_string(self.override_file(service))
            .map(|content| content.lines().any(|line| line.trim() == "manual"))
            .unwrap_or(false)
    }
}

impl ServiceProvider for Upstart {
    fn name(&self) -> &str {
        "upstart"
    }

    fn is_enabled(&self, service: &str) -> bool {
        self.has_service(service) && !self.override_is_manual(service)
    }

    fn enable(&self, service: &str) -> Result<()> {
        if !self.has_service(service) {
            anyhow::bail!("Unknown job: {}", service);
        }

        let path = self.override_file(service);
        if !path.exists() {
            return Ok(());
        }

        // Strip the manual stanza, keeping any other override content
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let kept: Vec<&str> = content
            .lines()
            .filter(|line| line.trim() != "manual")
            .collect();

        if kept.iter().all(|line| line.trim().is_empty()) {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        } else {
            fs::write(&path, kept.join("\n") + "\n")
                .with_context(|| format!("Failed to rewrite {}", path.display()))?;
        }

        Ok(())
    }

    fn disable(&self, service: &str) -> Result<()> {
        if !self.has_service(service) {
            anyhow::bail!("Unknown job: {}", service);
        }

        if self.override_is_manual(service) {
            return Ok(());
        }

        let path = self.override_file(service);
        let mut content = fs::read_to_string(&path).unwrap_or_default();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str("manual\n");

        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&self, service: &str) -> Result<()> {
        for path in self.definition_files(service) {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("removed job file {}", path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("Failed to remove job file {}", path.display())));
                }
            }
        }

        Ok(())
    }

    fn start(&self, service: &str) -> Result<()> {
        if self.is_running(service).unwrap_or(false) {
            return Ok(());
        }
        cmd::run("initctl", ["start", service])
    }

    fn stop(&self, service: &str) -> Result<()> {
        if !self.is_running(service).unwrap_or(false) {
            return Ok(());
        }
        cmd::run("initctl", ["stop", service])
    }

    fn restart(&self, service: &str) -> Result<()> {
        // initctl restart re-execs the running process without rereading
        // the job file and errors on stopped jobs, so go through stop/start
        if self.is_running(service)? {
            cmd::run("initctl", ["stop", service])?;
        }
        cmd::run("initctl", ["start", service])
    }

    fn reload(&self, service: &str) -> Result<()> {
        if self.is_running(service)? {
            cmd::run("initctl", ["reload", service])
        } else {
            cmd::run("initctl", ["start", service])
        }
    }

    fn is_running(&self, service: &str) -> Result<bool> {
        let status = cmd::run_output("initctl", ["status", service])?;
        Ok(status.contains("start/running"))
    }

    fn has_service(&self, service: &str) -> bool {
        self.job_file(service).exists()
    }

    fn definition_files(&self, service: &str) -> Vec<PathBuf> {
        vec![self.job_file(service), self.override_file(service)]
    }
}
