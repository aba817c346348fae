//! Ingestion: selected files to stored content and symbol rows
//!
//! Per file the states are `Selected -> Hashed -> AlreadyStored` or
//! `Selected -> Hashed -> Parsing -> Extracted -> Persisted`. Content is
//! written before symbol rows so a row never points at missing content.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::Vault;
use crate::content::{ArtifactKind, ContentStore};
use crate::error::{Result, VaultError};
use crate::extraction::{apply_symbol_map, derive_symbols, describe_source, load_symbol_map, SymbolMap};
use crate::selection::{self, DirectoryLister, FsLister, ScopedLister};
use crate::types::{AddOptions, AddResponse, FileSelectionSpec, SourceUnit};

/// Per-file progress at info level when verbose, debug otherwise
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Terminal state of a successfully handled file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Content was parsed and persisted
    Stored { hash: String, symbols: usize },
    /// Identical content was already stored; nothing was parsed or written
    AlreadyStored { hash: String },
}

impl FileOutcome {
    pub fn hash(&self) -> &str {
        match self {
            FileOutcome::Stored { hash, .. } | FileOutcome::AlreadyStored { hash } => hash,
        }
    }
}

/// A file that could not be ingested
#[derive(Debug)]
pub struct FileError {
    pub path: PathBuf,
    pub error: VaultError,
}

/// Result of an add batch
#[derive(Debug, Default)]
pub struct AddReport {
    pub outcomes: Vec<(PathBuf, FileOutcome)>,
    pub errors: Vec<FileError>,
    /// Dependency edges created while resolving the batch
    pub edges_resolved: usize,
}

impl AddReport {
    pub fn stored(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Stored { .. }))
            .count()
    }

    pub fn already_stored(&self) -> usize {
        self.outcomes.len() - self.stored()
    }

    /// Symbols written by this batch
    pub fn symbols_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                FileOutcome::Stored { symbols, .. } => *symbols,
                FileOutcome::AlreadyStored { .. } => 0,
            })
            .sum()
    }

    /// A batch succeeds when at least one file was handled or nothing failed
    pub fn is_success(&self) -> bool {
        !self.outcomes.is_empty() || self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Stored {} files with {} symbols",
            self.stored(),
            self.symbols_count()
        );
        if self.already_stored() > 0 {
            summary.push_str(&format!(", {} already present", self.already_stored()));
        }
        if !self.errors.is_empty() {
            summary.push_str(&format!(", {} failed", self.errors.len()));
        }
        summary
    }
}

impl From<&AddReport> for AddResponse {
    fn from(report: &AddReport) -> Self {
        if report.is_success() {
            AddResponse {
                success: true,
                symbols_count: Some(report.symbols_count()),
                message: Some(report.summary()),
                error: None,
            }
        } else {
            let error = report
                .errors
                .iter()
                .map(|e| e.error.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            AddResponse {
                success: false,
                symbols_count: None,
                message: None,
                error: Some(error),
            }
        }
    }
}

impl From<Result<AddReport>> for AddResponse {
    fn from(result: Result<AddReport>) -> Self {
        match result {
            Ok(report) => AddResponse::from(&report),
            Err(err) => AddResponse {
                success: false,
                symbols_count: None,
                message: None,
                error: Some(err.to_string()),
            },
        }
    }
}

struct HashedFile {
    path: PathBuf,
    hash: String,
    bytes: Vec<u8>,
}

impl Vault {
    /// Add a file or directory.
    ///
    /// The nearest `tsconfig.json` at or above the target supplies the
    /// `files`, `include` and `exclude` lists, matched relative to its own
    /// directory. Only files at or below the target are considered, and
    /// without `recursive` only a directory's own files.
    pub fn add(&mut self, path: &Path, options: &AddOptions) -> Result<AddReport> {
        let target = selection::absolute(path)?;
        let spec = selection::spec_for_target(&target)?;
        let lister = ScopedLister::new(
            FsLister {
                recursive: options.recursive,
                respect_gitignore: self.config.respect_gitignore,
            },
            target,
        );
        self.ingest_selection(spec, &lister, options)
    }

    /// Select files with `lister` and ingest them
    pub fn ingest_selection(
        &mut self,
        mut spec: FileSelectionSpec,
        lister: &dyn DirectoryLister,
        options: &AddOptions,
    ) -> Result<AddReport> {
        spec.exclude_patterns
            .extend(self.config.default_excludes.iter().cloned());
        let files = selection::select(&spec, lister, &self.config.extensions)?;
        info!("Selected {} files under {}", files.len(), spec.base_dir.display());

        let symbol_map = match &options.symbol_map {
            Some(path) => load_symbol_map(path)?,
            None => SymbolMap::new(),
        };

        self.ingest_files(&files, options, &symbol_map)
    }

    /// Ingest an explicit list of files.
    ///
    /// Failures of individual files are collected in the report; only
    /// failures of the store as a whole are returned as errors.
    pub fn ingest_files(
        &mut self,
        files: &[PathBuf],
        options: &AddOptions,
        symbol_map: &SymbolMap,
    ) -> Result<AddReport> {
        // Reading and hashing have no side effects and run in parallel
        let hashed: Vec<(PathBuf, Result<HashedFile>)> = files
            .par_iter()
            .map(|path| {
                let read = fs::read(path)
                    .map_err(|e| VaultError::io(path, e))
                    .map(|bytes| HashedFile {
                        path: path.clone(),
                        hash: ContentStore::content_hash(&bytes),
                        bytes,
                    });
                (path.clone(), read)
            })
            .collect();

        let mut report = AddReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut stored_keys = Vec::new();

        for (path, read) in hashed {
            let file = match read {
                Ok(file) => file,
                Err(error) => {
                    warn!("{}", error);
                    report.errors.push(FileError { path, error });
                    continue;
                }
            };

            // Identical content earlier in this batch collapses to one write
            if !seen.insert(file.hash.clone()) {
                progress!(options.verbose, "{}: duplicate of earlier file in batch", path.display());
                report.outcomes.push((
                    path,
                    FileOutcome::AlreadyStored { hash: file.hash },
                ));
                continue;
            }

            match self.ingest_hashed(&file, options, symbol_map) {
                Ok(outcome) => {
                    if let FileOutcome::Stored { hash, .. } = &outcome {
                        stored_keys.push(hash.clone());
                    }
                    report.outcomes.push((path, outcome));
                }
                Err(error) => {
                    warn!("Skipping {}: {}", path.display(), error);
                    report.errors.push(FileError { path, error });
                }
            }
        }

        if !stored_keys.is_empty() {
            report.edges_resolved = self.db.resolve_dependency_edges(&stored_keys)?;
        }

        info!("{}", report.summary());
        Ok(report)
    }

    /// Ingest a single file
    pub fn ingest_file(&mut self, path: &Path, options: &AddOptions) -> Result<FileOutcome> {
        let bytes = fs::read(path).map_err(|e| VaultError::io(path, e))?;
        let file = HashedFile {
            path: path.to_path_buf(),
            hash: ContentStore::content_hash(&bytes),
            bytes,
        };
        let symbol_map = match &options.symbol_map {
            Some(map_path) => load_symbol_map(map_path)?,
            None => SymbolMap::new(),
        };

        let outcome = self.ingest_hashed(&file, options, &symbol_map)?;
        if let FileOutcome::Stored { hash, .. } = &outcome {
            self.db.resolve_dependency_edges(std::slice::from_ref(hash))?;
        }
        Ok(outcome)
    }

    fn ingest_hashed(
        &mut self,
        file: &HashedFile,
        options: &AddOptions,
        symbol_map: &SymbolMap,
    ) -> Result<FileOutcome> {
        let path = file.path.as_path();
        let hash = file.hash.as_str();

        // Dedup fast path, checked before the expensive parse
        if !options.force && self.content.exists(hash) {
            progress!(options.verbose, "{}: already stored as {}", path.display(), hash);
            return Ok(FileOutcome::AlreadyStored {
                hash: hash.to_string(),
            });
        }

        let tree = self.parser.parse(path, &file.bytes)?;

        let text = String::from_utf8_lossy(&file.bytes);
        let existing = self.db.get_source_unit(hash)?;
        let unit = SourceUnit {
            key: hash.to_string(),
            description: describe_source(&text),
            size_bytes: file.bytes.len() as u64,
            created_at: existing
                .as_ref()
                .map(|u| u.created_at.clone())
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
        };

        let symbols = apply_symbol_map(derive_symbols(&tree, &unit), symbol_map);
        let references = match self.references.extract(&unit, &text, &tree, &symbols) {
            Ok(refs) => refs,
            Err(err) => {
                warn!("Reference extraction failed for {}: {}", path.display(), err);
                Vec::new()
            }
        };

        // Content first, then rows
        let wrote_source = self.content.put_artifact(hash, ArtifactKind::Source, &file.bytes)?;
        let mut wrote_tree = false;
        if self.config.store_declaration_trees {
            let json = serde_json::to_vec(&tree)?;
            // A forced re-add refreshes the tree; an existing one is kept on failure
            let written = if options.force {
                let existed = self
                    .content
                    .exists_artifact(hash, ArtifactKind::DeclarationTree);
                self.content
                    .replace_artifact(hash, ArtifactKind::DeclarationTree, &json)
                    .map(|_| !existed)
            } else {
                self.content
                    .put_artifact(hash, ArtifactKind::DeclarationTree, &json)
            };
            match written {
                Ok(wrote) => wrote_tree = wrote,
                Err(err) => {
                    self.discard_content(hash, wrote_source, false);
                    return Err(err);
                }
            }
        }

        let replace = options.force || existing.is_some();
        if let Err(err) = self.db.persist_unit(&unit, &symbols, &references, replace) {
            self.discard_content(hash, wrote_source, wrote_tree);
            return Err(err);
        }

        if let Err(err) = self.indexer.index(&unit, &symbols) {
            warn!("Semantic indexing failed for {}: {}", hash, err);
        }

        progress!(
            options.verbose,
            "{}: stored as {} ({} symbols)",
            path.display(),
            hash,
            symbols.len()
        );
        Ok(FileOutcome::Stored {
            hash: hash.to_string(),
            symbols: symbols.len(),
        })
    }

    /// Best-effort removal of content written for a unit whose rows failed
    fn discard_content(&self, hash: &str, source: bool, tree: bool) {
        let written = [
            (source, ArtifactKind::Source),
            (tree, ArtifactKind::DeclarationTree),
        ];
        for (_, kind) in written.iter().filter(|(w, _)| *w) {
            if let Err(err) = self.content.remove_artifact(hash, *kind) {
                warn!("Could not discard {} artifact for {}: {}", kind.extension(), hash, err);
            }
        }
    }
}
