//! Mapping from source positions to enclosing functions.

use std::collections::HashMap;
use std::path::Path;

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::parser::GoParser;

/// Looks up the function enclosing a source position.
pub trait FunctionLocator: Send + Sync {
    /// Qualified name (`file:Function`) of the function containing `line`
    /// in `file`, if any.
    fn function_at(&self, file: &str, line: u32) -> Option<String>;
}

/// Line range of one function in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionBounds {
    /// Function name (e.g. `Parse` or `(*Decoder).Next`).
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl FunctionBounds {
    /// Create new function bounds.
    pub fn new(name: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            name: name.into(),
            start_line,
            end_line,
        }
    }
}

/// Function bounds per file, keyed by the path used in coverage profiles.
#[derive(Debug, Clone, Default)]
pub struct FunctionMap {
    files: HashMap<String, Vec<FunctionBounds>>,
}

impl FunctionMap {
    /// Create an empty function map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the functions of one file. Bounds are sorted by start line.
    pub fn insert(&mut self, file: impl Into<String>, mut bounds: Vec<FunctionBounds>) {
        bounds.sort_by_key(|b| b.start_line);
        self.files.insert(file.into(), bounds);
    }

    /// Number of files with at least one function.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no functions are known.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Functions registered for `file`.
    pub fn functions(&self, file: &str) -> &[FunctionBounds] {
        self.files.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build the map for a Go module rooted at `module_root`.
    ///
    /// Coverage paths are `<module path>/<relative file path>`. Test files,
    /// `vendor`, `testdata` and hidden directories are skipped, as are files
    /// that do not parse cleanly.
    pub fn build(module_root: &Path) -> Result<Self> {
        let go_mod = module_root.join("go.mod");
        let content = std::fs::read_to_string(&go_mod).map_err(|e| {
            Error::config(format!("failed to read go.mod at {}: {e}", go_mod.display()))
        })?;
        let module_path = module_path_from_go_mod(&content).ok_or_else(|| {
            Error::config(format!(
                "could not extract module path from {}",
                go_mod.display()
            ))
        })?;

        let parser = GoParser::new()?;
        let mut map = Self::new();

        let walker = WalkBuilder::new(module_root)
            .standard_filters(false)
            .hidden(true)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.depth() > 0 && (name == "vendor" || name == "testdata"))
            })
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            if !path.is_file() || !name.ends_with(".go") || name.ends_with("_test.go") {
                continue;
            }

            let parsed = match parser.parse_file(path) {
                Ok(parsed) if !parsed.has_errors() => parsed,
                Ok(parsed) => {
                    tracing::debug!("Skipping {} (syntax errors)", parsed.path().display());
                    continue;
                }
                Err(err) => {
                    tracing::debug!("Skipping {}: {err}", path.display());
                    continue;
                }
            };

            let bounds = parsed.functions();
            if bounds.is_empty() {
                continue;
            }

            let Ok(relative) = path.strip_prefix(module_root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            map.insert(format!("{module_path}/{relative}"), bounds);
        }

        Ok(map)
    }
}

impl FunctionLocator for FunctionMap {
    fn function_at(&self, file: &str, line: u32) -> Option<String> {
        let bounds = self.files.get(file)?;
        let idx = bounds.partition_point(|b| b.end_line < line);
        let candidate = bounds.get(idx)?;
        (candidate.start_line <= line && line <= candidate.end_line)
            .then(|| format!("{file}:{}", candidate.name))
    }
}

/// Extract the `module` path from go.mod content.
pub fn module_path_from_go_mod(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.trim().trim_matches('"');
        (!path.is_empty()).then(|| path.to_string())
    })
}
