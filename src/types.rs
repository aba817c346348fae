//! Core type definitions for codevault
//!
//! Defines the fundamental types of the index:
//! - Source units: one ingested file's content, keyed by content hash
//! - Symbols: named top-level declarations extracted from a source unit
//! - Declaration trees: the parser output consumed by symbol derivation

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Version written into serialized declaration trees
pub const DECLARATION_TREE_VERSION: u32 = 1;

/// Represents the kind of an extracted symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    #[serde(rename = "type-alias", alias = "type_alias", alias = "type")]
    TypeAlias,
    Enum,
    Variable,
    Namespace,
    Module,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 8] = [
        SymbolKind::Function,
        SymbolKind::Class,
        SymbolKind::Interface,
        SymbolKind::TypeAlias,
        SymbolKind::Enum,
        SymbolKind::Variable,
        SymbolKind::Namespace,
        SymbolKind::Module,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::TypeAlias => "type-alias",
            SymbolKind::Enum => "enum",
            SymbolKind::Variable => "variable",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Module => "module",
        }
    }

    /// Parse a stored kind. `type_alias` and `type` are accepted for type aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "interface" => Some(SymbolKind::Interface),
            "type-alias" | "type_alias" | "type" => Some(SymbolKind::TypeAlias),
            "enum" => Some(SymbolKind::Enum),
            "variable" => Some(SymbolKind::Variable),
            "namespace" => Some(SymbolKind::Namespace),
            "module" => Some(SymbolKind::Module),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about one ingested file's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Hex content hash, also the storage key
    pub key: String,
    pub description: String,
    pub size_bytes: u64,
    /// RFC 3339 timestamp of first ingestion
    pub created_at: String,
}

/// A named top-level declaration extracted from a source unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub key: String,
    pub source_unit_key: String,
    /// Byte offset of the first byte of the declaration
    pub start_pos: u64,
    /// Byte offset one past the last byte of the declaration
    pub end_pos: u64,
    pub name: String,
    pub kind: SymbolKind,
    pub description: String,
    /// Referenced names, in first-seen order, not resolved to keys
    pub dependencies: Vec<String>,
    pub exported: bool,
}

/// A resolved dependency between two stored symbols
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from_key: String,
    pub to_key: String,
    pub edge_type: String,
}

/// Edge type written for dependencies resolved from symbol dependency names
pub const DEPENDS_ON: &str = "depends_on";

/// An occurrence of a symbol inside a source unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolReference {
    pub source_unit_key: String,
    pub start_pos: u64,
    pub end_pos: u64,
    pub definition_key: String,
    pub reference_type: String,
}

/// Which files an ingestion call should consider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSelectionSpec {
    /// Explicit file list; when non-empty, include patterns are ignored
    pub explicit_files: Vec<PathBuf>,
    pub include_patterns: Vec<String>,
    /// Always applied last; wins over include
    pub exclude_patterns: Vec<String>,
    pub base_dir: PathBuf,
}

impl FileSelectionSpec {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }
}

/// Syntactic category of a top-level declaration.
///
/// Export statements are kept as their own categories so symbol derivation
/// can patch export flags of declarations they name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum DeclarationCategory {
    Function,
    Class,
    Interface,
    TypeAlias,
    Enum,
    Variable,
    Namespace,
    Module,
    /// `export { a, b as c }` - carries the local names
    NamedExports { names: Vec<String> },
    /// `export default a` or `export = a`
    DefaultExport { target: String },
    /// Anything else at the top level (imports, expressions, ...)
    Other { syntax: String },
}

impl DeclarationCategory {
    /// Symbol kind for declaration categories; `None` for everything else
    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        match self {
            DeclarationCategory::Function => Some(SymbolKind::Function),
            DeclarationCategory::Class => Some(SymbolKind::Class),
            DeclarationCategory::Interface => Some(SymbolKind::Interface),
            DeclarationCategory::TypeAlias => Some(SymbolKind::TypeAlias),
            DeclarationCategory::Enum => Some(SymbolKind::Enum),
            DeclarationCategory::Variable => Some(SymbolKind::Variable),
            DeclarationCategory::Namespace => Some(SymbolKind::Namespace),
            DeclarationCategory::Module => Some(SymbolKind::Module),
            DeclarationCategory::NamedExports { .. }
            | DeclarationCategory::DefaultExport { .. }
            | DeclarationCategory::Other { .. } => None,
        }
    }
}

/// One top-level node of a declaration tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationNode {
    #[serde(flatten)]
    pub category: DeclarationCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub exported: bool,
    #[serde(default)]
    pub default_export: bool,
    pub start: u64,
    pub end: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// Parser output: the top-level declarations of one source unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationTree {
    pub version: u32,
    pub nodes: Vec<DeclarationNode>,
}

impl DeclarationTree {
    pub fn new(nodes: Vec<DeclarationNode>) -> Self {
        Self {
            version: DECLARATION_TREE_VERSION,
            nodes,
        }
    }
}

/// A parser diagnostic with the byte span it refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    pub message: String,
    pub start: u64,
    pub end: u64,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.start, self.end)
    }
}

/// Options of the add operation
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Descend into subdirectories when the target is a directory
    pub recursive: bool,
    /// Re-parse and replace content that is already stored
    pub force: bool,
    /// Report per-file outcomes at info level
    pub verbose: bool,
    /// JSON file mapping `name` or `name:kind` to an existing symbol key
    pub symbol_map: Option<PathBuf>,
}

/// Response of the add operation, as handed to the command-line layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of the remove operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultStats {
    pub source_units: u64,
    pub symbols: u64,
    pub dependency_edges: u64,
    pub references: u64,
    pub db_size_bytes: u64,
    pub symbol_kinds: Vec<(SymbolKind, u64)>,
}
