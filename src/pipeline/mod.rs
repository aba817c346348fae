//! The vault: content store, symbol graph and the pipelines between them
//!
//! [`Vault`] owns every component and exposes the add/remove operations
//! (see `ingest` and `evict`) plus read access to what has been stored.
//! A vault assumes it is the only writer of its root directory.

mod evict;
mod ingest;

use std::fs;

use tracing::info;

use crate::capabilities::{NoReferences, NoopIndexer, ReferenceExtractor, SemanticIndexer};
use crate::config::VaultConfig;
use crate::content::{ArtifactKind, ContentStore};
use crate::db::Database;
use crate::error::{Result, VaultError};
use crate::extraction::{DeclarationParser, TypeScriptParser};
use crate::types::{DeclarationTree, SourceUnit, Symbol, SymbolKind, VaultStats};

pub use evict::ReconcileReport;
pub use ingest::{AddReport, FileError, FileOutcome};

/// A content-addressed code index rooted at one directory
pub struct Vault {
    config: VaultConfig,
    content: ContentStore,
    db: Database,
    parser: Box<dyn DeclarationParser + Send>,
    references: Box<dyn ReferenceExtractor>,
    indexer: Box<dyn SemanticIndexer>,
}

impl Vault {
    /// Open the vault at `config.root`, creating its layout if needed
    pub fn open(config: VaultConfig) -> Result<Self> {
        fs::create_dir_all(&config.root).map_err(|e| VaultError::io(&config.root, e))?;
        for dir in ["symbols", "embeddings"] {
            let path = config.semantic_index_dir().join(dir);
            fs::create_dir_all(&path).map_err(|e| VaultError::io(&path, e))?;
        }

        let content = ContentStore::open(&config.root)?;
        let db = Database::open(config.db_path())?;
        let parser = Box::new(TypeScriptParser::new(config.strict_parsing));

        info!("Opened vault at {}", config.root.display());

        Ok(Self {
            config,
            content,
            db,
            parser,
            references: Box::new(NoReferences),
            indexer: Box::new(NoopIndexer),
        })
    }

    /// Replace the declaration parser
    pub fn with_parser(mut self, parser: impl DeclarationParser + Send + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn with_reference_extractor(mut self, extractor: impl ReferenceExtractor + 'static) -> Self {
        self.references = Box::new(extractor);
        self
    }

    pub fn with_semantic_indexer(mut self, indexer: impl SemanticIndexer + 'static) -> Self {
        self.indexer = Box::new(indexer);
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Read API
    // =========================================================================

    /// Metadata of a stored source unit
    pub fn source_unit(&self, hash: &str) -> Result<SourceUnit> {
        self.db
            .get_source_unit(&hash.to_ascii_lowercase())?
            .ok_or_else(|| VaultError::NotFound(format!("source unit {}", hash)))
    }

    /// Stored source text of a unit
    pub fn source_text(&self, hash: &str) -> Result<String> {
        let bytes = self.content.get(hash)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Stored declaration tree of a unit
    pub fn declaration_tree(&self, hash: &str) -> Result<DeclarationTree> {
        let bytes = self
            .content
            .get_artifact(hash, ArtifactKind::DeclarationTree)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn symbols_by_name(&self, name: &str) -> Result<Vec<Symbol>> {
        self.db.find_symbols_by_name(name)
    }

    pub fn symbols_in_unit(&self, hash: &str) -> Result<Vec<Symbol>> {
        self.db
            .find_symbols_by_source_unit(&hash.to_ascii_lowercase())
    }

    pub fn symbols_by_kind(&self, kind: SymbolKind, limit: u32) -> Result<Vec<Symbol>> {
        self.db.find_symbols_by_kind(kind, limit)
    }

    /// Case-insensitive prefix search over symbol names
    pub fn search_symbols(
        &self,
        query: &str,
        kind: Option<SymbolKind>,
        limit: u32,
    ) -> Result<Vec<Symbol>> {
        self.db.search_symbols(query, kind, limit)
    }

    pub fn stats(&self) -> Result<VaultStats> {
        self.db.get_stats()
    }
}
