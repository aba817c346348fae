//! Parse-only inspection of source files
//!
//! [`inspect`] runs the same selection, parsing and symbol derivation as an
//! add, but writes nothing: no content, no rows. Positions are reported as
//! 1-based line and column instead of byte offsets, and a JSDoc block
//! directly above a declaration is attached as its documentation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::VaultConfig;
use crate::content::ContentStore;
use crate::error::{Result, VaultError};
use crate::extraction::{derive, describe_source, DeclarationParser, TypeScriptParser};
use crate::selection::{self, FsLister, ScopedLister};
use crate::types::{SourceUnit, SymbolKind};

/// A symbol as seen by inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: PathBuf,
    /// 1-based line of the declaration start
    pub line: usize,
    /// 1-based column of the declaration start, in characters
    pub column: usize,
    pub exported: bool,
    pub default_export: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub dependencies: Vec<String>,
}

/// Result of inspecting a file or directory
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    /// Directory patterns were matched against
    pub base_dir: PathBuf,
    pub symbols: Vec<InspectedSymbol>,
    pub files_processed: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl InspectReport {
    pub fn total_count(&self) -> usize {
        self.symbols.len()
    }

    /// `path` relative to the base directory when it lies below it
    pub fn display_path<'p>(&self, path: &'p Path) -> std::path::Display<'p> {
        path.strip_prefix(&self.base_dir).unwrap_or(path).display()
    }
}

/// Parse the files selected for `target` and report their symbols.
///
/// Selection follows the same project-config rules as an add. Files that
/// fail to read or parse are reported in `errors` and do not stop the run.
pub fn inspect(target: &Path, config: &VaultConfig, recursive: bool) -> Result<InspectReport> {
    let started = Instant::now();
    let target = selection::absolute(target)?;

    let mut spec = selection::spec_for_target(&target)?;
    spec.exclude_patterns
        .extend(config.default_excludes.iter().cloned());
    let lister = ScopedLister::new(
        FsLister {
            recursive,
            respect_gitignore: config.respect_gitignore,
        },
        target,
    );
    let files = selection::select(&spec, &lister, &config.extensions)?;
    debug!("Inspecting {} files under {}", files.len(), spec.base_dir.display());

    let strict = config.strict_parsing;
    let results: Vec<Result<Vec<InspectedSymbol>>> = files
        .par_iter()
        .map_init(
            || TypeScriptParser::new(strict),
            |parser, path| inspect_file(parser, path),
        )
        .collect();

    let mut report = InspectReport {
        base_dir: spec.base_dir,
        ..Default::default()
    };
    for (path, result) in files.iter().zip(results) {
        report.files_processed += 1;
        match result {
            Ok(symbols) => report.symbols.extend(symbols),
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                report.errors.push(err.to_string());
            }
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    Ok(report)
}

/// Parse one file and derive its symbols without touching any store
pub fn inspect_file(
    parser: &mut dyn DeclarationParser,
    path: &Path,
) -> Result<Vec<InspectedSymbol>> {
    let bytes = fs::read(path).map_err(|e| VaultError::io(path, e))?;
    let tree = parser.parse(path, &bytes)?;

    let text = String::from_utf8_lossy(&bytes);
    let unit = SourceUnit {
        key: ContentStore::content_hash(&bytes),
        description: describe_source(&text),
        size_bytes: bytes.len() as u64,
        created_at: String::new(),
    };

    let symbols = derive(&tree, &unit)
        .into_iter()
        .map(|derived| {
            let start = derived.symbol.start_pos as usize;
            let (line, column) = line_column(&bytes, start);
            InspectedSymbol {
                name: derived.symbol.name,
                kind: derived.symbol.kind,
                file_path: path.to_path_buf(),
                line,
                column,
                exported: derived.symbol.exported,
                default_export: derived.default_export,
                documentation: doc_comment_before(&bytes, start),
                dependencies: derived.symbol.dependencies,
            }
        })
        .collect();
    Ok(symbols)
}

/// 1-based line and character column of a byte offset
fn line_column(bytes: &[u8], offset: usize) -> (usize, usize) {
    let offset = offset.min(bytes.len());
    let before = &bytes[..offset];
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
    (line, column)
}

/// Text of a `/** ... */` block separated from `offset` only by whitespace
fn doc_comment_before(bytes: &[u8], offset: usize) -> Option<String> {
    let offset = offset.min(bytes.len());
    let before = String::from_utf8_lossy(&bytes[..offset]);
    let trimmed = before.trim_end();
    if !trimmed.ends_with("*/") {
        return None;
    }
    let open = trimmed.rfind("/*")?;
    let comment = &trimmed[open..];
    if !comment.starts_with("/**") || comment == "/**/" {
        return None;
    }

    let cleaned = comment
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("/**")
                .trim_end_matches("*/")
                .trim_start_matches('*')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
