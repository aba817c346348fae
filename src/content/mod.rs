//! Content-addressed artifact storage
//!
//! Every artifact lives at `files/<hh>/<rest>.<ext>` where `<hh>` is the
//! first two hex characters of the SHA-256 of the source bytes. All 256
//! shard directories are created when the store is opened and are never
//! removed, so add/remove churn never recreates them.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, VaultError};

/// Length of a hex-encoded content hash
pub const HASH_LEN: usize = 64;

/// Kind of artifact stored under a content hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The raw source bytes
    Source,
    /// The serialized declaration tree derived from the source
    DeclarationTree,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Source, ArtifactKind::DeclarationTree];

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Source => "src",
            ArtifactKind::DeclarationTree => "ast.json",
        }
    }
}

/// Hash-sharded artifact store rooted at `<root>/files`
#[derive(Debug, Clone)]
pub struct ContentStore {
    files_dir: PathBuf,
}

impl ContentStore {
    /// Open the store below `root`, provisioning the shard directories
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let files_dir = root.as_ref().join("files");
        for shard in 0..=255u8 {
            let dir = files_dir.join(format!("{:02x}", shard));
            // create_dir_all treats a directory created concurrently as success
            fs::create_dir_all(&dir).map_err(|e| VaultError::io(&dir, e))?;
        }
        debug!("Content store ready at {}", files_dir.display());
        Ok(Self { files_dir })
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// SHA-256 of `bytes` as lowercase hex
    pub fn content_hash(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Location of an artifact for a hash
    pub fn path_for(&self, hash: &str, kind: ArtifactKind) -> Result<PathBuf> {
        let hash = validate_hash(hash)?;
        let (shard, rest) = hash.split_at(2);
        Ok(self
            .files_dir
            .join(shard)
            .join(format!("{}.{}", rest, kind.extension())))
    }

    /// Store source bytes and return their hash
    pub fn put(&self, bytes: &[u8]) -> Result<String> {
        let hash = Self::content_hash(bytes);
        self.put_artifact(&hash, ArtifactKind::Source, bytes)?;
        Ok(hash)
    }

    /// Store an artifact under an already computed hash.
    ///
    /// Returns `true` when the artifact was written by this call and `false`
    /// when it was already present.
    pub fn put_artifact(&self, hash: &str, kind: ArtifactKind, bytes: &[u8]) -> Result<bool> {
        let path = self.path_for(hash, kind)?;
        if path.exists() {
            debug!("Artifact already stored: {}", path.display());
            return Ok(false);
        }
        self.write_artifact(hash, &path, bytes)?;
        Ok(true)
    }

    /// Write an artifact whether or not it exists, replacing the old bytes
    /// atomically. Source artifacts are immutable and are never replaced.
    pub fn replace_artifact(&self, hash: &str, kind: ArtifactKind, bytes: &[u8]) -> Result<()> {
        if kind == ArtifactKind::Source {
            self.put_artifact(hash, kind, bytes)?;
            return Ok(());
        }
        let path = self.path_for(hash, kind)?;
        self.write_artifact(hash, &path, bytes)
    }

    fn write_artifact(&self, hash: &str, path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| VaultError::InvalidHash(hash.to_string()))?;
        fs::create_dir_all(dir).map_err(|e| VaultError::io(dir, e))?;

        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        let written = fs::File::create(&tmp)
            .and_then(|mut f| {
                f.write_all(bytes)?;
                f.sync_all()
            })
            .and_then(|_| fs::rename(&tmp, path));

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(VaultError::io(path, err));
        }

        debug!("Stored {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Read the source bytes for a hash
    pub fn get(&self, hash: &str) -> Result<Vec<u8>> {
        self.get_artifact(hash, ArtifactKind::Source)
    }

    pub fn get_artifact(&self, hash: &str, kind: ArtifactKind) -> Result<Vec<u8>> {
        let path = self.path_for(hash, kind)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(VaultError::NotFound(
                format!("{} artifact for {}", kind.extension(), hash),
            )),
            Err(e) => Err(VaultError::io(&path, e)),
        }
    }

    /// Whether source bytes are stored for a hash
    pub fn exists(&self, hash: &str) -> bool {
        self.exists_artifact(hash, ArtifactKind::Source)
    }

    pub fn exists_artifact(&self, hash: &str, kind: ArtifactKind) -> bool {
        self.path_for(hash, kind)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Remove every artifact stored for a hash.
    ///
    /// Returns whether anything was removed. Emptied ancestor directories
    /// are removed up to, but never including, the shard directory.
    pub fn remove(&self, hash: &str) -> Result<bool> {
        let mut removed = false;
        for kind in ArtifactKind::ALL {
            removed |= self.remove_artifact(hash, kind)?;
        }
        Ok(removed)
    }

    /// Remove a single artifact. Returns whether it existed.
    pub fn remove_artifact(&self, hash: &str, kind: ArtifactKind) -> Result<bool> {
        let path = self.path_for(hash, kind)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                if let Some(dir) = path.parent() {
                    self.remove_empty_ancestors(dir);
                }
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VaultError::io(&path, e)),
        }
    }

    /// Hashes of every stored source artifact, sorted
    pub fn list_hashes(&self) -> Result<Vec<String>> {
        let suffix = format!(".{}", ArtifactKind::Source.extension());
        let mut hashes = Vec::new();

        for shard in 0..=255u8 {
            let shard_name = format!("{:02x}", shard);
            let dir = self.files_dir.join(&shard_name);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(VaultError::io(&dir, e)),
            };

            for entry in entries {
                let entry = entry.map_err(|e| VaultError::io(&dir, e))?;
                let name = entry.file_name();
                let Some(rest) = name.to_str().and_then(|n| n.strip_suffix(&suffix)) else {
                    continue;
                };
                let hash = format!("{}{}", shard_name, rest);
                if validate_hash(&hash).is_ok() {
                    hashes.push(hash);
                }
            }
        }

        hashes.sort();
        Ok(hashes)
    }

    /// Remove empty directories below `files/` other than the shards.
    /// Returns how many were removed.
    pub fn prune_empty_dirs(&self) -> Result<usize> {
        let mut pruned = 0;
        let entries = fs::read_dir(&self.files_dir).map_err(|e| VaultError::io(&self.files_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| VaultError::io(&self.files_dir, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            pruned += prune_below(&path)?;
            if !self.is_shard_dir(&path) && remove_if_empty(&path) {
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!("Pruned {} empty directories", pruned);
        }
        Ok(pruned)
    }

    fn is_shard_dir(&self, dir: &Path) -> bool {
        dir.parent() == Some(self.files_dir.as_path())
            && dir
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.len() == 2 && n.bytes().all(|b| b.is_ascii_hexdigit()))
                .unwrap_or(false)
    }

    fn remove_empty_ancestors(&self, start: &Path) {
        let mut dir = start.to_path_buf();
        loop {
            if dir == self.files_dir || self.is_shard_dir(&dir) || !dir.starts_with(&self.files_dir) {
                break;
            }
            if !remove_if_empty(&dir) {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }
    }
}

/// Post-order removal of empty directories strictly below `dir`
fn prune_below(dir: &Path) -> Result<usize> {
    let mut pruned = 0;
    let entries = fs::read_dir(dir).map_err(|e| VaultError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| VaultError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            pruned += prune_below(&path)?;
            if remove_if_empty(&path) {
                pruned += 1;
            }
        }
    }
    Ok(pruned)
}

fn remove_if_empty(dir: &Path) -> bool {
    let empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if !empty {
        return false;
    }
    match fs::remove_dir(dir) {
        Ok(()) => true,
        Err(err) => {
            warn!("Could not remove empty directory {}: {}", dir.display(), err);
            false
        }
    }
}

/// Accept a 64 character hex hash, returning it lowercased
fn validate_hash(hash: &str) -> Result<String> {
    if hash.len() == HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(hash.to_ascii_lowercase())
    } else {
        Err(VaultError::InvalidHash(hash.to_string()))
    }
}
