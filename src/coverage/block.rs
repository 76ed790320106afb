//! Statement-range coverage blocks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Identity of a coverage block: a source range within one file.
///
/// Ordering is lexicographic by file, then start position, then end
/// position, which is the order used when profiles are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    /// File as emitted by the instrumentation (usually an import path).
    pub file: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl BlockKey {
    /// Create a new block key.
    pub fn new(
        file: impl Into<String>,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    ) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Parse a block ID like `file.go:10.5,20.15`.
    pub fn parse(id: &str) -> Result<Self> {
        let (file, range) = split_exactly_once(id, ':')
            .ok_or_else(|| Error::malformed(id, "expected exactly one ':' between file and range"))?;
        let (start, end) = split_exactly_once(range, ',')
            .ok_or_else(|| Error::malformed(id, "expected exactly one ',' in range"))?;
        let (start_line, start_col) = parse_position(id, start, "start")?;
        let (end_line, end_col) = parse_position(id, end, "end")?;

        Ok(Self {
            file: file.to_string(),
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{},{}.{}",
            self.file, self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

/// One observation of a block: its statement count and execution count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageBlock {
    pub key: BlockKey,
    /// Executable statements in the range (fixed by instrumentation).
    pub statements: u32,
    /// How many times the range executed.
    pub count: u64,
}

impl CoverageBlock {
    /// Create a new coverage block.
    pub fn new(key: BlockKey, statements: u32, count: u64) -> Self {
        Self {
            key,
            statements,
            count,
        }
    }

    /// Whether the block executed at least once.
    pub fn is_covered(&self) -> bool {
        self.count > 0
    }
}

impl fmt::Display for CoverageBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.statements, self.count)
    }
}

/// Parse a coverage line like `file.go:10.5,20.15 3 1`.
pub fn parse_block(line: &str) -> Result<CoverageBlock> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(Error::malformed(
            line,
            format!("expected 3 fields, got {}", fields.len()),
        ));
    }

    let key = BlockKey::parse(fields[0])?;
    let statements = fields[1]
        .parse::<u32>()
        .map_err(|e| Error::malformed(line, format!("invalid statement count: {e}")))?;
    let count = fields[2]
        .parse::<u64>()
        .map_err(|e| Error::malformed(line, format!("invalid execution count: {e}")))?;

    Ok(CoverageBlock::new(key, statements, count))
}

/// Format a block as a coverage line. Inverse of [`parse_block`].
pub fn format_block(block: &CoverageBlock) -> String {
    block.to_string()
}

fn split_exactly_once(s: &str, sep: char) -> Option<(&str, &str)> {
    let (head, tail) = s.split_once(sep)?;
    if tail.contains(sep) {
        return None;
    }
    Some((head, tail))
}

fn parse_position(id: &str, pos: &str, which: &str) -> Result<(u32, u32)> {
    let (line, col) = split_exactly_once(pos, '.').ok_or_else(|| {
        Error::malformed(id, format!("expected exactly one '.' in {which} position"))
    })?;
    let line = line
        .parse::<u32>()
        .map_err(|e| Error::malformed(id, format!("invalid {which} line: {e}")))?;
    let col = col
        .parse::<u32>()
        .map_err(|e| Error::malformed(id, format!("invalid {which} column: {e}")))?;
    Ok((line, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_id_valid() {
        let key = BlockKey::parse("github.com/foo/bar/file.go:10.5,20.10").unwrap();
        assert_eq!(key.file, "github.com/foo/bar/file.go");
        assert_eq!((key.start_line, key.start_col), (10, 5));
        assert_eq!((key.end_line, key.end_col), (20, 10));

        let key = BlockKey::parse("main.go:1.1,5.2").unwrap();
        assert_eq!(key, BlockKey::new("main.go", 1, 1, 5, 2));
    }

    #[test]
    fn test_parse_block_id_rejects_bad_separators() {
        for id in [
            "file.go10.5,20.10",
            "file.go:10.5-20.10",
            "file.go:10,20.10",
            "a:b:10.5,20.10",
            "file.go:10.5,20.10,30.1",
            "file.go:10.5.1,20.10",
        ] {
            let err = BlockKey::parse(id).unwrap_err();
            assert!(
                matches!(err, Error::MalformedRecord { .. }),
                "expected malformed for {id}"
            );
        }
    }

    #[test]
    fn test_parse_block_id_rejects_non_numeric() {
        assert!(BlockKey::parse("file.go:x.5,20.10").is_err());
        assert!(BlockKey::parse("file.go:10.5,20.-1").is_err());
    }

    #[test]
    fn test_parse_block_valid_line() {
        let block = parse_block("github.com/foo/bar.go:10.5,20.10 3 1").unwrap();
        assert_eq!(block.key, BlockKey::new("github.com/foo/bar.go", 10, 5, 20, 10));
        assert_eq!(block.statements, 3);
        assert_eq!(block.count, 1);
        assert!(block.is_covered());
    }

    #[test]
    fn test_parse_block_zero_count() {
        let block = parse_block("main.go:1.1,5.2 2 0").unwrap();
        assert_eq!(block.statements, 2);
        assert!(!block.is_covered());
    }

    #[test]
    fn test_parse_block_wrong_field_count() {
        assert!(parse_block("main.go:1.1,5.2 2").is_err());
        assert!(parse_block("").is_err());
        assert!(parse_block("main.go:1.1,5.2 2 1 extra").is_err());
    }

    #[test]
    fn test_format_block_is_inverse_of_parse() {
        let line = "github.com/foo/bar.go:10.5,20.10 3 7";
        let block = parse_block(line).unwrap();
        assert_eq!(format_block(&block), line);
        assert_eq!(parse_block(&format_block(&block)).unwrap(), block);
    }

    #[test]
    fn test_key_ordering_is_file_then_position() {
        let mut keys = vec![
            BlockKey::new("b.go", 1, 1, 2, 1),
            BlockKey::new("a.go", 10, 1, 12, 1),
            BlockKey::new("a.go", 2, 5, 3, 1),
            BlockKey::new("a.go", 2, 1, 9, 1),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["a.go:2.1,9.1", "a.go:2.5,3.1", "a.go:10.1,12.1", "b.go:1.1,2.1"]
        );
    }
}
