use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem root the coordinator operates on
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Init flavor: "auto" detects at construction, or an explicit
    /// "systemd", "upstart" or "sysvinit"
    #[serde(default = "default_init")]
    pub init: String,

    /// Caller-facing service name to platform service name
    /// (e.g. mta = "postfix")
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_init() -> String {
    "auto".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            init: default_init(),
            aliases: HashMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }
}
