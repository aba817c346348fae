//! Vault configuration
//!
//! The vault root is always passed in explicitly. Optional settings are read
//! from `<root>/config.toml`; a missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Name of the optional settings file inside the vault root
pub const CONFIG_FILE: &str = "config.toml";

/// Configuration for a vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault root directory
    pub root: PathBuf,
    /// Recognized source file extensions, without the dot
    pub extensions: Vec<String>,
    /// Patterns appended to every exclude list
    pub default_excludes: Vec<String>,
    /// Whether to follow gitignore rules when discovering files
    pub respect_gitignore: bool,
    /// Store the serialized declaration tree next to the source
    pub store_declaration_trees: bool,
    /// Treat any syntax error as a parse failure
    pub strict_parsing: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            extensions: vec![
                "ts".to_string(),
                "tsx".to_string(),
                "js".to_string(),
                "jsx".to_string(),
            ],
            default_excludes: vec![
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
            ],
            respect_gitignore: true,
            store_declaration_trees: true,
            strict_parsing: true,
        }
    }
}

impl VaultConfig {
    /// Default settings for a vault at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load settings for the vault at `root`, or defaults if it has no
    /// settings file. The given root always wins over a stored one.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::new(root));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| VaultError::io(&path, e))?;
        let mut config: VaultConfig = toml::from_str(&content)
            .map_err(|e| VaultError::Config(format!("{}: {}", path.display(), e)))?;
        config.root = root;
        Ok(config)
    }

    /// Write settings to `<root>/config.toml`
    pub fn save(&self) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| VaultError::Config(e.to_string()))?;
        std::fs::create_dir_all(&self.root).map_err(|e| VaultError::io(&self.root, e))?;
        let path = self.config_path();
        std::fs::write(&path, content).map_err(|e| VaultError::io(&path, e))?;
        Ok(())
    }

    /// `~/.codevault`
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".codevault")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("index.db")
    }

    pub fn semantic_index_dir(&self) -> PathBuf {
        self.root.join("semantic-index")
    }

    /// Whether a path has one of the recognized extensions
    pub fn is_recognized(&self, path: &Path) -> bool {
        crate::selection::has_recognized_extension(path, &self.extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::new("/tmp/vault");
        assert_eq!(config.extensions, vec!["ts", "tsx", "js", "jsx"]);
        assert!(config.strict_parsing);
        assert!(config.store_declaration_trees);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/vault/index.db"));
        assert!(config.is_recognized(Path::new("a.TSX")));
        assert!(!config.is_recognized(Path::new("a.md")));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::load(dir.path()).unwrap();
        assert_eq!(config, VaultConfig::new(dir.path()));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "extensions = [\"ts\"]\nstrict_parsing = false\nroot = \"/elsewhere\"\n",
        )
        .unwrap();

        let config = VaultConfig::load(dir.path()).unwrap();
        assert_eq!(config.extensions, vec!["ts"]);
        assert!(!config.strict_parsing);
        assert!(config.respect_gitignore);
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VaultConfig::new(dir.path());
        config.default_excludes.push("**/dist/**".to_string());
        config.save().unwrap();

        assert_eq!(VaultConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "extensions = 3").unwrap();
        assert!(matches!(
            VaultConfig::load(dir.path()),
            Err(VaultError::Config(_))
        ));
    }
}
