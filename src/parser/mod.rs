//! Tree-sitter based Go source analysis.
//!
//! Two facts are extracted from Go sources: the line bounds of every
//! top-level function and method (used to attribute coverage blocks to
//! functions), and which `Test*` functions call `t.Parallel()` (used to
//! decide which tests may run concurrently).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tree_sitter::{Node, Parser as TsParser, Tree};

use crate::core::{Error, Result};
use crate::coverage::FunctionBounds;

/// Thread-safe Go parser.
pub struct GoParser {
    parser: Mutex<TsParser>,
}

impl GoParser {
    /// Create a new parser.
    pub fn new() -> Result<Self> {
        let mut parser = TsParser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| Error::Parse {
                path: PathBuf::new(),
                message: format!("failed to load Go grammar: {e}"),
            })?;
        Ok(Self {
            parser: Mutex::new(parser),
        })
    }

    /// Parse Go source content.
    pub fn parse(&self, content: &[u8], path: &Path) -> Result<ParsedSource> {
        let tree = self
            .parser
            .lock()
            .parse(content, None)
            .ok_or_else(|| Error::Parse {
                path: path.to_path_buf(),
                message: "Failed to parse file".to_string(),
            })?;

        Ok(ParsedSource {
            tree,
            source: content.to_vec(),
            path: path.to_path_buf(),
        })
    }

    /// Parse a file from disk.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ParsedSource> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        self.parse(&content, path)
    }
}

/// A parsed Go file.
pub struct ParsedSource {
    tree: Tree,
    source: Vec<u8>,
    path: PathBuf,
}

impl ParsedSource {
    /// Get the root node of the tree.
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Path the source was parsed from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get text for a node.
    pub fn node_text(&self, node: &Node<'_>) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Whether the parser had to recover from syntax errors.
    pub fn has_errors(&self) -> bool {
        self.root_node().has_error()
    }

    /// Top-level functions and methods, sorted by start line.
    ///
    /// Methods are named `(Recv).Name` or `(*Recv).Name`.
    pub fn functions(&self) -> Vec<FunctionBounds> {
        let root = self.root_node();
        let mut bounds: Vec<FunctionBounds> = root
            .children(&mut root.walk())
            .filter_map(|node| match node.kind() {
                "function_declaration" => {
                    let name = self.node_text(&node.child_by_field_name("name")?);
                    Some(self.bounds(&node, name.to_string()))
                }
                "method_declaration" => {
                    let name = self.node_text(&node.child_by_field_name("name")?);
                    let receiver = node
                        .child_by_field_name("receiver")
                        .and_then(|r| self.receiver_type(&r))
                        .unwrap_or_else(|| "?".to_string());
                    Some(self.bounds(&node, format!("({receiver}).{name}")))
                }
                _ => None,
            })
            .collect();
        bounds.sort_by_key(|b| b.start_line);
        bounds
    }

    /// Names of `Test*` functions whose body calls `.Parallel()`.
    pub fn parallel_tests(&self) -> BTreeSet<String> {
        let root = self.root_node();
        root.children(&mut root.walk())
            .filter(|node| node.kind() == "function_declaration")
            .filter_map(|node| {
                let name = self.node_text(&node.child_by_field_name("name")?);
                if !name.starts_with("Test") {
                    return None;
                }
                let body = node.child_by_field_name("body")?;
                has_parallel_call(&body, &self.source).then(|| name.to_string())
            })
            .collect()
    }

    fn bounds(&self, node: &Node<'_>, name: String) -> FunctionBounds {
        FunctionBounds::new(
            name,
            node.start_position().row as u32 + 1,
            node.end_position().row as u32 + 1,
        )
    }

    fn receiver_type(&self, receiver: &Node<'_>) -> Option<String> {
        let param = receiver
            .named_children(&mut receiver.walk())
            .find(|n| n.kind() == "parameter_declaration")?;
        let ty = param.child_by_field_name("type")?;
        Some(self.type_name(&ty))
    }

    fn type_name(&self, node: &Node<'_>) -> String {
        match node.kind() {
            "type_identifier" | "qualified_type" => self.node_text(node).to_string(),
            "pointer_type" => match node.named_child(0) {
                Some(inner) => format!("*{}", self.type_name(&inner)),
                None => "?".to_string(),
            },
            "parenthesized_type" => match node.named_child(0) {
                Some(inner) => self.type_name(&inner),
                None => "?".to_string(),
            },
            "generic_type" => {
                let base = node
                    .child_by_field_name("type")
                    .map(|t| self.type_name(&t))
                    .unwrap_or_else(|| "?".to_string());
                let args: Vec<Node<'_>> = node
                    .child_by_field_name("type_arguments")
                    .map(|a| a.named_children(&mut a.walk()).collect())
                    .unwrap_or_default();
                match args.as_slice() {
                    [single] => format!("{base}[{}]", self.node_text(single)),
                    _ => base,
                }
            }
            _ => "?".to_string(),
        }
    }
}

/// Whether `node` contains a call whose callee is a selector ending in `Parallel`.
pub fn has_parallel_call(node: &Node<'_>, source: &[u8]) -> bool {
    if node.kind() == "call_expression" {
        let is_parallel = node
            .child_by_field_name("function")
            .filter(|f| f.kind() == "selector_expression")
            .and_then(|f| f.child_by_field_name("field"))
            .and_then(|field| field.utf8_text(source).ok())
            .is_some_and(|name| name == "Parallel");
        if is_parallel {
            return true;
        }
    }

    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .any(|child| has_parallel_call(&child, source));
    found
}

/// Parallel-safe test names declared in a Go source string.
pub fn parallel_tests_in_source(source: &str) -> Result<BTreeSet<String>> {
    let parser = GoParser::new()?;
    let parsed = parser.parse(source.as_bytes(), Path::new("source.go"))?;
    Ok(parsed.parallel_tests())
}
