//! Default declaration parser for TypeScript, TSX and JavaScript
//!
//! Parses a file with the tree-sitter grammar for its dialect and reports
//! only the top-level statements: declarations with their name, export
//! flags, byte span and referenced names, plus the export statements that
//! symbol derivation uses to patch export flags.

use std::path::Path;

use tree_sitter::{Node, Parser};
use tracing::warn;

use super::languages::{Dialect, DialectConfig};
use super::DeclarationParser;
use crate::error::{Result, VaultError};
use crate::types::{DeclarationCategory, DeclarationNode, DeclarationTree, ParseDiagnostic};

/// tree-sitter backed [`DeclarationParser`]
pub struct TypeScriptParser {
    parser: Parser,
    strict: bool,
}

impl TypeScriptParser {
    /// With `strict`, any syntax error fails the parse
    pub fn new(strict: bool) -> Self {
        Self {
            parser: Parser::new(),
            strict,
        }
    }
}

impl Default for TypeScriptParser {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DeclarationParser for TypeScriptParser {
    fn parse(&mut self, path: &Path, source: &[u8]) -> Result<DeclarationTree> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let dialect = Dialect::from_path(path)
            .ok_or_else(|| VaultError::parse(path, format!("unsupported file extension: {}", ext)))?;

        let content = std::str::from_utf8(source)
            .map_err(|e| VaultError::parse(path, format!("source is not valid UTF-8: {}", e)))?;

        self.parser
            .set_language(&dialect.grammar())
            .map_err(|e| VaultError::parse(path, format!("failed to load grammar: {}", e)))?;

        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| VaultError::parse(path, "parser produced no syntax tree"))?;
        let root = tree.root_node();

        if root.has_error() {
            let mut diagnostics = Vec::new();
            collect_diagnostics(root, &mut diagnostics);
            if self.strict {
                return Err(VaultError::Parse {
                    path: path.to_path_buf(),
                    diagnostics,
                });
            }
            warn!(
                "{}: continuing past {} syntax errors",
                path.display(),
                diagnostics.len()
            );
        }

        let mut ctx = DeclarationContext {
            content,
            config: dialect.config(),
            nodes: Vec::new(),
        };
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            ctx.visit_top_level(child);
        }

        Ok(DeclarationTree::new(ctx.nodes))
    }
}

fn collect_diagnostics(node: Node, out: &mut Vec<ParseDiagnostic>) {
    if node.is_error() {
        out.push(ParseDiagnostic {
            message: "syntax error".to_string(),
            start: node.start_byte() as u64,
            end: node.end_byte() as u64,
        });
        return;
    }
    if node.is_missing() {
        out.push(ParseDiagnostic {
            message: format!("missing {}", node.kind()),
            start: node.start_byte() as u64,
            end: node.end_byte() as u64,
        });
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_diagnostics(child, out);
    }
}

struct DeclarationContext<'a> {
    content: &'a str,
    config: &'static DialectConfig,
    nodes: Vec<DeclarationNode>,
}

impl<'a> DeclarationContext<'a> {
    fn visit_top_level(&mut self, node: Node) {
        match node.kind() {
            "comment" | "hash_bang_line" => {}
            "export_statement" => self.visit_export(node),
            "ambient_declaration" => match self.inner_declaration(node) {
                Some(decl) => self.push_declaration(node, decl, false, false),
                None => self.push_other(node),
            },
            "expression_statement" => match self.inner_declaration(node) {
                Some(decl) => self.push_declaration(node, decl, false, false),
                None => self.push_other(node),
            },
            kind if self.config.node_type_to_category(kind).is_some() => {
                self.push_declaration(node, node, false, false)
            }
            _ => self.push_other(node),
        }
    }

    /// `declare ...` and namespace statements wrap the declaration one level down
    fn inner_declaration<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .find(|c| self.config.node_type_to_category(c.kind()).is_some());
        found
    }

    fn visit_export(&mut self, node: Node) {
        let is_default = has_token(node, "default");

        if let Some(decl) = node.child_by_field_name("declaration") {
            let decl = if self.config.node_type_to_category(decl.kind()).is_some() {
                Some(decl)
            } else {
                self.inner_declaration(decl)
            };
            match decl {
                Some(decl) => self.push_declaration(node, decl, true, is_default),
                None => self.push_other(node),
            }
            return;
        }

        // Re-exports name other modules' symbols, not local ones
        if node.child_by_field_name("source").is_some() {
            self.push_other(node);
            return;
        }

        let mut cursor = node.walk();
        let clause = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "export_clause");
        if let Some(clause) = clause {
            let mut names = Vec::new();
            let mut cursor = clause.walk();
            for spec in clause.named_children(&mut cursor) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                if let Some(name) = spec.child_by_field_name("name") {
                    names.push(self.text(name).to_string());
                }
            }
            self.push_node(node, DeclarationCategory::NamedExports { names }, None);
            return;
        }

        let value = if is_default {
            node.child_by_field_name("value")
        } else if has_token(node, "=") {
            // export = target
            let mut cursor = node.walk();
            let found = node.named_children(&mut cursor).find(|c| c.kind() != "comment");
            found
        } else {
            None
        };

        match value {
            Some(v) if v.kind() == "identifier" => {
                let target = self.text(v).to_string();
                self.push_node(node, DeclarationCategory::DefaultExport { target }, None);
            }
            Some(v) if matches!(v.kind(), "class" | "function_expression" | "function" | "arrow_function" | "generator_function") => {
                let category = if v.kind() == "class" {
                    DeclarationCategory::Class
                } else {
                    DeclarationCategory::Function
                };
                let name = v.child_by_field_name("name").map(|n| self.text(n).to_string());
                let references = self.dependencies(v, name.as_deref().into_iter().collect());
                self.nodes.push(DeclarationNode {
                    category,
                    name,
                    exported: true,
                    default_export: true,
                    start: node.start_byte() as u64,
                    end: node.end_byte() as u64,
                    references,
                });
            }
            _ => self.push_other(node),
        }
    }

    /// Record a declaration. `outer` supplies the span so that `export` and
    /// `declare` keywords are included.
    fn push_declaration(&mut self, outer: Node, decl: Node, exported: bool, default_export: bool) {
        let Some(category) = self.config.node_type_to_category(decl.kind()) else {
            self.push_other(outer);
            return;
        };

        if category == DeclarationCategory::Variable {
            let mut cursor = decl.walk();
            let declarators: Vec<Node> = decl
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "variable_declarator")
                .collect();
            let single = declarators.len() == 1;

            for declarator in declarators {
                let mut names = Vec::new();
                if let Some(name_node) = declarator.child_by_field_name("name") {
                    self.pattern_names(name_node, &mut names);
                }
                let span = if single { outer } else { declarator };
                let references =
                    self.dependencies(declarator, names.iter().map(String::as_str).collect());
                for name in names {
                    self.nodes.push(DeclarationNode {
                        category: DeclarationCategory::Variable,
                        name: Some(name),
                        exported,
                        default_export,
                        start: span.start_byte() as u64,
                        end: span.end_byte() as u64,
                        references: references.clone(),
                    });
                }
            }
            return;
        }

        let name = decl.child_by_field_name("name").map(|n| {
            let text = self.text(n);
            if n.kind() == "string" {
                text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
                    .to_string()
            } else {
                text.to_string()
            }
        });
        let references = self.dependencies(decl, name.as_deref().into_iter().collect());

        self.nodes.push(DeclarationNode {
            category,
            name,
            exported,
            default_export,
            start: outer.start_byte() as u64,
            end: outer.end_byte() as u64,
            references,
        });
    }

    fn push_other(&mut self, node: Node) {
        let syntax = node.kind().to_string();
        self.push_node(node, DeclarationCategory::Other { syntax }, None);
    }

    fn push_node(&mut self, node: Node, category: DeclarationCategory, name: Option<String>) {
        self.nodes.push(DeclarationNode {
            category,
            name,
            exported: false,
            default_export: false,
            start: node.start_byte() as u64,
            end: node.end_byte() as u64,
            references: Vec::new(),
        });
    }

    /// Names bound by a declarator's left-hand side
    fn pattern_names(&self, node: Node, out: &mut Vec<String>) {
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                out.push(self.text(node).to_string())
            }
            "object_pattern" | "array_pattern" | "rest_pattern" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.pattern_names(child, out);
                }
            }
            "pair_pattern" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.pattern_names(value, out);
                }
            }
            "assignment_pattern" | "object_assignment_pattern" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.pattern_names(left, out);
                }
            }
            _ => {}
        }
    }

    /// Referenced names inside a declaration, first-seen order, without
    /// the declaration's own names or its type parameters
    fn dependencies(&self, node: Node, own_names: Vec<&str>) -> Vec<String> {
        let mut found = Vec::new();
        let mut type_params = Vec::new();
        self.collect_dependencies(node, &mut found, &mut type_params);

        let mut result: Vec<String> = Vec::new();
        for name in found {
            if own_names.contains(&name.as_str())
                || type_params.contains(&name)
                || result.contains(&name)
            {
                continue;
            }
            result.push(name);
        }
        result
    }

    fn collect_dependencies(&self, node: Node, out: &mut Vec<String>, type_params: &mut Vec<String>) {
        match node.kind() {
            "type_identifier" => out.push(self.text(node).to_string()),
            "nested_type_identifier" => {
                out.push(self.text(node).to_string());
                return;
            }
            "type_parameter" => {
                if let Some(name) = node.child_by_field_name("name") {
                    type_params.push(self.text(name).to_string());
                }
            }
            "member_expression" => {
                if let (Some(object), Some(property)) = (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("property"),
                ) {
                    if object.kind() == "identifier" && property.kind() == "property_identifier" {
                        out.push(format!("{}.{}", self.text(object), self.text(property)));
                    }
                }
            }
            kind if self.config.is_call_node(kind) => {
                let callee = node
                    .child_by_field_name("function")
                    .or_else(|| node.child_by_field_name("constructor"));
                if let Some(callee) = callee {
                    if callee.kind() == "identifier" {
                        out.push(self.text(callee).to_string());
                    }
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_dependencies(child, out, type_params);
        }
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.content.as_bytes()).unwrap_or("")
    }
}

/// Whether `node` has a direct anonymous child token with this text
fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}
