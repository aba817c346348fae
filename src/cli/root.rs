//! Vault root resolution

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::VaultConfig;
use crate::pipeline::Vault;

/// Environment variable naming the vault root
pub const ROOT_ENV: &str = "CODEVAULT_ROOT";

/// Resolve the vault root: `--root`, then `CODEVAULT_ROOT`, then `~/.codevault`
pub fn resolve_root(flag: Option<&str>) -> PathBuf {
    flag.map(PathBuf::from)
        .or_else(|| env::var_os(ROOT_ENV).map(PathBuf::from))
        .unwrap_or_else(VaultConfig::default_root)
}

/// Whether a vault has been initialized at `root`
pub fn vault_exists(root: &Path) -> bool {
    VaultConfig::new(root).db_path().exists()
}

/// Load settings and open the vault at `root`
pub fn open_vault(root: &Path) -> Result<Vault> {
    let config = VaultConfig::load(root)
        .with_context(|| format!("Invalid vault settings in {}", root.display()))?;
    Vault::open(config).with_context(|| format!("Could not open vault at {}", root.display()))
}
