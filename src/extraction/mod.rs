//! Declaration parsing and symbol derivation
//!
//! A [`DeclarationParser`] turns source bytes into a [`DeclarationTree`]
//! of top-level declarations. [`derive_symbols`] maps that tree to the
//! symbols of a source unit in two phases:
//! - collect a name-indexed draft of every declaration with a symbol kind
//! - patch export flags from export statements and emit the final list

mod languages;
pub mod typescript;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::types::{DeclarationCategory, DeclarationTree, SourceUnit, Symbol, SymbolKind};

pub use languages::Dialect;
pub use typescript::TypeScriptParser;

/// Name given to anonymous default-exported declarations
pub const DEFAULT_EXPORT_NAME: &str = "default";

/// Produces a declaration tree from source bytes
pub trait DeclarationParser {
    /// Parse one file. `path` selects the dialect and is used in errors.
    fn parse(&mut self, path: &Path, source: &[u8]) -> Result<DeclarationTree>;
}

/// Mapping from `name` or `name:kind` to an existing symbol key
pub type SymbolMap = HashMap<String, String>;

struct DraftSymbol {
    name: String,
    kind: SymbolKind,
    start: u64,
    end: u64,
    exported: bool,
    default_export: bool,
    dependencies: Vec<String>,
}

/// A derived symbol together with its default-export flag, which the
/// stored form does not carry
#[derive(Debug, Clone)]
pub struct DerivedSymbol {
    pub symbol: Symbol,
    pub default_export: bool,
}

/// Derive the symbols of a source unit from its declaration tree.
///
/// Declarations without a symbol kind are ignored. Declarations whose span
/// does not satisfy `start < end <= size_bytes` are dropped with a warning.
/// Every symbol gets a fresh key.
pub fn derive_symbols(tree: &DeclarationTree, unit: &SourceUnit) -> Vec<Symbol> {
    derive(tree, unit).into_iter().map(|d| d.symbol).collect()
}

/// Same as [`derive_symbols`], keeping each symbol's default-export flag
pub fn derive(tree: &DeclarationTree, unit: &SourceUnit) -> Vec<DerivedSymbol> {
    // Phase 1: draft every declaration, indexed by name
    let mut drafts: Vec<DraftSymbol> = Vec::new();
    let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

    for node in &tree.nodes {
        let Some(kind) = node.category.symbol_kind() else {
            continue;
        };
        let name = match (&node.name, node.default_export) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, true) => DEFAULT_EXPORT_NAME.to_string(),
            _ => continue,
        };
        if node.start >= node.end || node.end > unit.size_bytes {
            warn!(
                "Dropping {} {} with invalid span {}..{} in {}",
                kind, name, node.start, node.end, unit.key
            );
            continue;
        }

        by_name.entry(name.clone()).or_default().push(drafts.len());
        drafts.push(DraftSymbol {
            name,
            kind,
            start: node.start,
            end: node.end,
            exported: node.exported,
            default_export: node.default_export,
            dependencies: node.references.clone(),
        });
    }

    // Phase 2: apply export statements
    for node in &tree.nodes {
        match &node.category {
            DeclarationCategory::NamedExports { names } => {
                for name in names {
                    for &idx in by_name.get(name).into_iter().flatten() {
                        drafts[idx].exported = true;
                    }
                }
            }
            DeclarationCategory::DefaultExport { target } => {
                for &idx in by_name.get(target).into_iter().flatten() {
                    drafts[idx].exported = true;
                    drafts[idx].default_export = true;
                }
            }
            _ => {}
        }
    }

    drafts
        .into_iter()
        .map(|draft| DerivedSymbol {
            default_export: draft.default_export,
            symbol: Symbol {
                key: new_symbol_key(),
                source_unit_key: unit.key.clone(),
                start_pos: draft.start,
                end_pos: draft.end,
                description: describe_symbol(&draft),
                name: draft.name,
                kind: draft.kind,
                dependencies: draft.dependencies,
                exported: draft.exported,
            },
        })
        .collect()
}

/// Replace generated keys with keys from a symbol map.
///
/// `name:kind` entries win over bare `name` entries. A mapped key is used
/// at most once; later symbols with the same name keep their fresh key.
pub fn apply_symbol_map(symbols: Vec<Symbol>, map: &SymbolMap) -> Vec<Symbol> {
    if map.is_empty() {
        return symbols;
    }

    let mut used: HashSet<String> = HashSet::new();
    symbols
        .into_iter()
        .map(|mut symbol| {
            let composite = format!("{}:{}", symbol.name, symbol.kind);
            let mapped = map
                .get(&composite)
                .filter(|k| !used.contains(*k))
                .or_else(|| map.get(&symbol.name).filter(|k| !used.contains(*k)));
            if let Some(key) = mapped {
                used.insert(key.clone());
                symbol.key = key.clone();
            }
            symbol
        })
        .collect()
}

/// Read a symbol map from a JSON object file
pub fn load_symbol_map(path: &Path) -> Result<SymbolMap> {
    let content = std::fs::read_to_string(path).map_err(|e| VaultError::io(path, e))?;
    let map: SymbolMap = serde_json::from_str(&content)?;
    Ok(map)
}

/// Short preview of a source unit: its first three lines, at most 100 characters
pub fn describe_source(content: &str) -> String {
    const MAX_CHARS: usize = 100;

    let preview = content.split('\n').take(3).collect::<Vec<_>>().join(" ");
    let mut chars = preview.chars();
    let truncated: String = chars.by_ref().take(MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

fn describe_symbol(draft: &DraftSymbol) -> String {
    let kind = draft.kind.as_str().replace('-', " ");
    match (draft.exported, draft.default_export) {
        (_, true) => format!("default exported {} {}", kind, draft.name),
        (true, false) => format!("exported {} {}", kind, draft.name),
        (false, false) => format!("{} {}", kind, draft.name),
    }
}

fn new_symbol_key() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeclarationNode;

    fn unit(size: u64) -> SourceUnit {
        SourceUnit {
            key: "u1".to_string(),
            description: String::new(),
            size_bytes: size,
            created_at: String::new(),
        }
    }

    fn node(category: DeclarationCategory, name: Option<&str>, span: (u64, u64)) -> DeclarationNode {
        DeclarationNode {
            category,
            name: name.map(|n| n.to_string()),
            exported: false,
            default_export: false,
            start: span.0,
            end: span.1,
            references: vec![],
        }
    }

    #[test]
    fn test_derive_maps_categories_and_ignores_others() {
        let tree = DeclarationTree::new(vec![
            node(DeclarationCategory::Function, Some("hello"), (0, 10)),
            node(DeclarationCategory::TypeAlias, Some("Id"), (11, 20)),
            node(
                DeclarationCategory::Other {
                    syntax: "import_statement".to_string(),
                },
                None,
                (21, 30),
            ),
        ]);

        let symbols = derive_symbols(&tree, &unit(50));
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "hello");
        assert_eq!(symbols[0].kind, SymbolKind::Function);
        assert_eq!(symbols[0].description, "function hello");
        assert_eq!(symbols[1].kind, SymbolKind::TypeAlias);
        assert_eq!(symbols[1].description, "type alias Id");
        assert!(symbols.iter().all(|s| s.source_unit_key == "u1"));
        assert_eq!(symbols[0].key.len(), 32);
        assert_ne!(symbols[0].key, symbols[1].key);
    }

    #[test]
    fn test_derive_patches_export_flags() {
        let mut exported = node(DeclarationCategory::Class, Some("Direct"), (0, 5));
        exported.exported = true;
        let tree = DeclarationTree::new(vec![
            exported,
            node(DeclarationCategory::Function, Some("a"), (6, 10)),
            node(DeclarationCategory::Function, Some("b"), (11, 15)),
            node(DeclarationCategory::Function, Some("c"), (16, 20)),
            node(
                DeclarationCategory::NamedExports {
                    names: vec!["a".to_string()],
                },
                None,
                (21, 30),
            ),
            node(
                DeclarationCategory::DefaultExport {
                    target: "b".to_string(),
                },
                None,
                (31, 40),
            ),
        ]);

        let symbols = derive_symbols(&tree, &unit(40));
        let by_name = |n: &str| symbols.iter().find(|s| s.name == n).unwrap();
        assert!(by_name("Direct").exported);
        assert_eq!(by_name("Direct").description, "exported class Direct");
        assert!(by_name("a").exported);
        assert!(by_name("b").exported);
        assert_eq!(by_name("b").description, "default exported function b");
        assert!(!by_name("c").exported);

        let derived = derive(&tree, &unit(40));
        let defaults: Vec<&str> = derived
            .iter()
            .filter(|d| d.default_export)
            .map(|d| d.symbol.name.as_str())
            .collect();
        assert_eq!(defaults, vec!["b"]);
    }

    #[test]
    fn test_derive_drops_invalid_spans() {
        let tree = DeclarationTree::new(vec![
            node(DeclarationCategory::Function, Some("empty"), (5, 5)),
            node(DeclarationCategory::Function, Some("overflow"), (0, 100)),
            node(DeclarationCategory::Function, Some("ok"), (0, 10)),
            node(DeclarationCategory::Function, None, (0, 10)),
        ]);
        let symbols = derive_symbols(&tree, &unit(10));
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "ok");
    }

    #[test]
    fn test_anonymous_default_export_is_named_default() {
        let mut anon = node(DeclarationCategory::Class, None, (0, 20));
        anon.exported = true;
        anon.default_export = true;
        let symbols = derive_symbols(&DeclarationTree::new(vec![anon]), &unit(20));
        assert_eq!(symbols[0].name, DEFAULT_EXPORT_NAME);
        assert!(symbols[0].exported);
    }

    #[test]
    fn test_symbol_map_prefers_composite_and_assigns_once() {
        let mut duplicate = node(DeclarationCategory::Variable, Some("thing"), (0, 5));
        duplicate.references = vec!["x".to_string()];
        let tree = DeclarationTree::new(vec![
            node(DeclarationCategory::Function, Some("thing"), (6, 10)),
            duplicate,
            node(DeclarationCategory::Function, Some("other"), (11, 15)),
            node(DeclarationCategory::Function, Some("other"), (16, 20)),
        ]);
        let symbols = derive_symbols(&tree, &unit(20));

        let map: SymbolMap = [
            ("thing".to_string(), "plain-key".to_string()),
            ("thing:variable".to_string(), "var-key".to_string()),
            ("other".to_string(), "other-key".to_string()),
        ]
        .into_iter()
        .collect();

        let mapped = apply_symbol_map(symbols.clone(), &map);
        assert_eq!(mapped[0].key, "plain-key");
        assert_eq!(mapped[1].key, "var-key");
        assert_eq!(mapped[2].key, "other-key");
        assert_eq!(mapped[3].key, symbols[3].key);
    }

    #[test]
    fn test_load_symbol_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, r#"{"hello": "k1", "Config:interface": "k2"}"#).unwrap();

        let map = load_symbol_map(&path).unwrap();
        assert_eq!(map.get("hello").map(String::as_str), Some("k1"));
        assert_eq!(map.get("Config:interface").map(String::as_str), Some("k2"));

        let missing = load_symbol_map(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, VaultError::Io { .. }));
    }

    #[test]
    fn test_describe_source() {
        assert_eq!(describe_source("a\nb\nc\nd"), "a b c");
        let long = "x".repeat(150);
        let described = describe_source(&long);
        assert!(described.ends_with("..."));
        assert_eq!(described.chars().count(), 103);
        assert_eq!(describe_source("ümlaut"), "ümlaut");
    }

    #[test]
    fn test_parse_then_derive() {
        let code = "export function hello(): string { return \"hi!\"; }\n";
        let tree = TypeScriptParser::default()
            .parse(Path::new("hello.ts"), code.as_bytes())
            .unwrap();
        let symbols = derive_symbols(&tree, &unit(code.len() as u64));
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "hello");
        assert_eq!(symbols[0].description, "exported function hello");
        assert_eq!((symbols[0].start_pos, symbols[0].end_pos), (0, 49));
    }
}
