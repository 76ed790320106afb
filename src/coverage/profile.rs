//! Textual coverage profiles (`mode:` line followed by block lines).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::block::{format_block, parse_block, BlockKey, CoverageBlock};
use crate::core::{Error, Result};

/// File suffixes excluded from profiles by default (generated templates).
pub const DEFAULT_EXCLUDED_SUFFIXES: &[&str] = &[".qtpl"];

/// Excludes coverage lines whose file ends with one of the configured suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFilter {
    suffixes: Vec<String>,
}

impl Default for ProfileFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_SUFFIXES.iter().copied())
    }
}

impl ProfileFilter {
    /// Create a filter excluding the given file suffixes.
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// A filter that keeps everything.
    pub fn none() -> Self {
        Self {
            suffixes: Vec::new(),
        }
    }

    /// Whether a file path is excluded.
    pub fn excludes_file(&self, file: &str) -> bool {
        self.suffixes.iter().any(|s| file.ends_with(s.as_str()))
    }

    /// Whether a raw coverage line references an excluded file.
    pub fn excludes_line(&self, line: &str) -> bool {
        match line.split_once(':') {
            Some((file, _)) => self.excludes_file(file),
            None => false,
        }
    }

    /// Configured suffixes.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

/// A parsed coverage profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// The `mode:` line, preserved verbatim.
    pub mode_line: String,
    /// Blocks in input order (or sorted after [`Profile::merge_blocks`]).
    pub blocks: Vec<CoverageBlock>,
    /// Number of malformed lines skipped while parsing.
    pub skipped: usize,
}

impl Profile {
    /// Create an empty profile with the given mode (`set`, `count` or `atomic`).
    pub fn with_mode(mode: &str) -> Self {
        Self {
            mode_line: format!("mode: {mode}"),
            blocks: Vec::new(),
            skipped: 0,
        }
    }

    /// The mode value (e.g. `set`).
    pub fn mode(&self) -> &str {
        self.mode_line
            .strip_prefix("mode:")
            .map(str::trim)
            .unwrap_or(&self.mode_line)
    }

    /// Parse profile text.
    ///
    /// The first non-empty line must be the `mode:` line. Lines for excluded
    /// files are dropped; malformed lines are skipped with a warning.
    pub fn parse(text: &str, filter: &ProfileFilter) -> Result<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let mode_line = match lines.next() {
            Some(line) if line.trim_start().starts_with("mode:") => line.trim_end().to_string(),
            Some(line) => return Err(Error::malformed(line, "missing mode line")),
            None => return Err(Error::malformed("", "empty coverage profile")),
        };

        let mut blocks = Vec::new();
        let mut skipped = 0;
        for line in lines {
            if filter.excludes_line(line) {
                continue;
            }
            match parse_block(line) {
                Ok(block) => blocks.push(block),
                Err(err) => {
                    tracing::warn!("Skipping coverage line: {err}");
                    skipped += 1;
                }
            }
        }

        Ok(Self {
            mode_line,
            blocks,
            skipped,
        })
    }

    /// Merge duplicate blocks by key, summing execution counts.
    ///
    /// The result is sorted by key so repeated merges of the same input
    /// render byte-identical output.
    pub fn merge_blocks(&mut self) {
        let mut merged: BTreeMap<BlockKey, CoverageBlock> = BTreeMap::new();
        for block in self.blocks.drain(..) {
            match merged.get_mut(&block.key) {
                Some(existing) => {
                    if existing.statements != block.statements {
                        tracing::debug!(
                            "Statement count mismatch for {}: {} vs {}",
                            block.key,
                            existing.statements,
                            block.statements
                        );
                    }
                    existing.count = existing.count.saturating_add(block.count);
                }
                None => {
                    merged.insert(block.key.clone(), block);
                }
            }
        }
        self.blocks = merged.into_values().collect();
    }

    /// Merge several profile texts into one. The first input's mode line wins.
    pub fn merge_contents<S: AsRef<str>>(contents: &[S], filter: &ProfileFilter) -> Result<Self> {
        let mut iter = contents.iter();
        let first = iter
            .next()
            .ok_or_else(|| Error::InvalidArgument("no coverage profiles to merge".to_string()))?;

        let mut merged = Self::parse(first.as_ref(), filter)?;
        for content in iter {
            let profile = Self::parse(content.as_ref(), filter)?;
            merged.skipped += profile.skipped;
            merged.blocks.extend(profile.blocks);
        }
        merged.merge_blocks();
        Ok(merged)
    }

    /// Render the profile as text, with a trailing newline.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.mode_line.len() + self.blocks.len() * 48);
        out.push_str(&self.mode_line);
        out.push('\n');
        for block in &self.blocks {
            out.push_str(&format_block(block));
            out.push('\n');
        }
        out
    }

    /// Drop excluded lines from raw profile text, preserving everything else.
    pub fn filter_text(text: &str, filter: &ProfileFilter) -> String {
        let mut out = String::with_capacity(text.len());
        for line in text.lines() {
            if line.is_empty() || filter.excludes_line(line) {
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
