//! Eviction and reconciliation
//!
//! Rows are deleted before content so an interrupted eviction leaves at
//! worst an orphaned blob, which [`Vault::reconcile`] can report and prune.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::Vault;
use crate::content::ArtifactKind;
use crate::error::{Result, VaultError};
use crate::types::RemoveResponse;

/// Differences between the content store and the symbol graph
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Stored content without a source unit row
    pub orphaned_content: Vec<String>,
    /// Source unit rows whose content is missing
    pub missing_content: Vec<String>,
    /// Orphans removed by this run
    pub pruned: usize,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_content.len() == self.pruned && self.missing_content.is_empty()
    }
}

impl From<Result<()>> for RemoveResponse {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => RemoveResponse {
                success: true,
                error: None,
            },
            Err(err) => RemoveResponse {
                success: false,
                error: Some(err.to_string()),
            },
        }
    }
}

impl Vault {
    /// Evict a source unit by content hash.
    ///
    /// Deletes the unit's rows in one transaction, re-resolves the units that
    /// depended on it, then removes its artifacts and prunes empty directories. Fails with `NotFound` when neither rows nor
    /// content exist for the hash.
    pub fn remove(&mut self, hash: &str) -> Result<()> {
        // Validates the hash before touching anything
        self.content.path_for(hash, ArtifactKind::Source)?;
        let hash = hash.to_ascii_lowercase();

        // Units linked into this one relink to whatever definitions remain
        let dependents = self.db.dependent_units(&hash)?;
        let removed_rows = self.db.delete_by_source_unit(&hash)?;
        if removed_rows && !dependents.is_empty() {
            self.db.resolve_dependency_edges(&dependents)?;
        }
        let removed_content = self.content.remove(&hash)?;
        self.content.prune_empty_dirs()?;

        if !removed_rows && !removed_content {
            return Err(VaultError::NotFound(format!("source unit {}", hash)));
        }

        if let Err(err) = self.indexer.remove(&hash) {
            warn!("Semantic index removal failed for {}: {}", hash, err);
        }

        info!("Removed {}", hash);
        Ok(())
    }

    /// Compare stored content with source unit rows. With `prune`, orphaned
    /// content is removed.
    pub fn reconcile(&mut self, prune: bool) -> Result<ReconcileReport> {
        let blobs: BTreeSet<String> = self.content.list_hashes()?.into_iter().collect();
        let units: BTreeSet<String> = self.db.source_unit_keys()?.into_iter().collect();

        let mut report = ReconcileReport {
            orphaned_content: blobs.difference(&units).cloned().collect(),
            missing_content: units.difference(&blobs).cloned().collect(),
            pruned: 0,
        };

        for hash in &report.missing_content {
            warn!("Source unit {} has no stored content", hash);
        }

        if prune {
            for hash in &report.orphaned_content {
                if self.content.remove(hash)? {
                    report.pruned += 1;
                }
            }
            self.content.prune_empty_dirs()?;
        }

        info!(
            "Reconciled: {} orphaned, {} missing, {} pruned",
            report.orphaned_content.len(),
            report.missing_content.len(),
            report.pruned
        );
        Ok(report)
    }
}
