//! Pluggable capabilities called by the ingestion and eviction pipelines
//!
//! Both have no-op defaults. The pipeline calls them unconditionally so
//! real implementations can be dropped in without touching orchestration.

use crate::error::Result;
use crate::types::{DeclarationTree, SourceUnit, Symbol, SymbolReference};

/// Finds occurrences of known symbols inside a source unit
pub trait ReferenceExtractor: Send {
    fn extract(
        &self,
        unit: &SourceUnit,
        source: &str,
        tree: &DeclarationTree,
        symbols: &[Symbol],
    ) -> Result<Vec<SymbolReference>>;
}

/// Maintains a search index over stored symbols
pub trait SemanticIndexer: Send {
    /// Called after a source unit and its symbols are committed
    fn index(&self, unit: &SourceUnit, symbols: &[Symbol]) -> Result<()>;

    /// Called after a source unit is evicted
    fn remove(&self, source_unit_key: &str) -> Result<()>;
}

/// Reference extractor that finds nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReferences;

impl ReferenceExtractor for NoReferences {
    fn extract(
        &self,
        _unit: &SourceUnit,
        _source: &str,
        _tree: &DeclarationTree,
        _symbols: &[Symbol],
    ) -> Result<Vec<SymbolReference>> {
        Ok(Vec::new())
    }
}

/// Semantic indexer that indexes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndexer;

impl SemanticIndexer for NoopIndexer {
    fn index(&self, _unit: &SourceUnit, _symbols: &[Symbol]) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _source_unit_key: &str) -> Result<()> {
        Ok(())
    }
}
