//! Dialect-specific configurations for tree-sitter declaration parsing

use std::path::Path;

use tree_sitter::Language as TsLanguage;

use crate::types::DeclarationCategory;

/// Source dialects understood by the default parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
    JavaScript,
}

impl Dialect {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(Dialect::TypeScript),
            "tsx" => Some(Dialect::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Dialect::JavaScript),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// The tree-sitter grammar for this dialect
    pub fn grammar(&self) -> TsLanguage {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }

    pub fn config(&self) -> &'static DialectConfig {
        match self {
            Dialect::TypeScript | Dialect::Tsx => &TYPESCRIPT_CONFIG,
            Dialect::JavaScript => &JAVASCRIPT_CONFIG,
        }
    }
}

/// Node types that make up top-level declarations in a dialect
pub struct DialectConfig {
    /// Node types that map to functions
    pub function_types: &'static [&'static str],
    /// Node types that map to classes
    pub class_types: &'static [&'static str],
    pub interface_types: &'static [&'static str],
    pub type_alias_types: &'static [&'static str],
    pub enum_types: &'static [&'static str],
    /// Statements holding one or more variable declarators
    pub variable_types: &'static [&'static str],
    /// `namespace X {}`
    pub namespace_types: &'static [&'static str],
    /// `module X {}` and `declare module "x" {}`
    pub module_types: &'static [&'static str],
    /// Node types that represent calls
    pub call_types: &'static [&'static str],
}

impl DialectConfig {
    /// Convert a tree-sitter node type to a declaration category
    pub fn node_type_to_category(&self, node_type: &str) -> Option<DeclarationCategory> {
        if self.function_types.contains(&node_type) {
            return Some(DeclarationCategory::Function);
        }
        if self.class_types.contains(&node_type) {
            return Some(DeclarationCategory::Class);
        }
        if self.interface_types.contains(&node_type) {
            return Some(DeclarationCategory::Interface);
        }
        if self.type_alias_types.contains(&node_type) {
            return Some(DeclarationCategory::TypeAlias);
        }
        if self.enum_types.contains(&node_type) {
            return Some(DeclarationCategory::Enum);
        }
        if self.variable_types.contains(&node_type) {
            return Some(DeclarationCategory::Variable);
        }
        if self.namespace_types.contains(&node_type) {
            return Some(DeclarationCategory::Namespace);
        }
        if self.module_types.contains(&node_type) {
            return Some(DeclarationCategory::Module);
        }
        None
    }

    /// Check if a node type represents a call
    pub fn is_call_node(&self, node_type: &str) -> bool {
        self.call_types.contains(&node_type)
    }
}

static TYPESCRIPT_CONFIG: DialectConfig = DialectConfig {
    function_types: &[
        "function_declaration",
        "generator_function_declaration",
        "function_signature",
    ],
    class_types: &["class_declaration", "abstract_class_declaration"],
    interface_types: &["interface_declaration"],
    type_alias_types: &["type_alias_declaration"],
    enum_types: &["enum_declaration"],
    variable_types: &["lexical_declaration", "variable_declaration"],
    namespace_types: &["internal_module"],
    module_types: &["module"],
    call_types: &["call_expression", "new_expression"],
};

static JAVASCRIPT_CONFIG: DialectConfig = DialectConfig {
    function_types: &["function_declaration", "generator_function_declaration"],
    class_types: &["class_declaration"],
    interface_types: &[],
    type_alias_types: &[],
    enum_types: &[],
    variable_types: &["lexical_declaration", "variable_declaration"],
    namespace_types: &[],
    module_types: &[],
    call_types: &["call_expression", "new_expression"],
};
