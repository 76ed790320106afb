//! In-memory coverage aggregate keyed by block identity.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::block::{BlockKey, CoverageBlock};
use super::funcmap::FunctionLocator;
use super::profile::{Profile, ProfileFilter};
use crate::core::Result;

/// Merged state of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Executable statements in the block.
    pub statements: u32,
    /// Whether any merged run executed the block.
    pub covered: bool,
}

/// Covered and total statement counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub covered: u64,
    pub total: u64,
}

impl CoverageStats {
    /// Coverage percentage, or `None` when there are no statements.
    pub fn percent(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.covered as f64 * 100.0 / self.total as f64)
        }
    }

    fn add(&mut self, info: &BlockInfo) {
        self.total += u64::from(info.statements);
        if info.covered {
            self.covered += u64::from(info.statements);
        }
    }
}

/// Union of the blocks observed by one or more test runs.
///
/// Merging is commutative, associative and idempotent: `covered` only ever
/// flips from `false` to `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSet {
    blocks: HashMap<BlockKey, BlockInfo>,
}

impl BlockSet {
    /// Create an empty block set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a block set from parsed blocks, merging duplicates.
    pub fn from_blocks<I: IntoIterator<Item = CoverageBlock>>(blocks: I) -> Self {
        let mut set = Self::new();
        for block in blocks {
            set.insert_block(block);
        }
        set
    }

    /// Parse profile text into a block set.
    pub fn load_from_record(text: &str, filter: &ProfileFilter) -> Result<Self> {
        let profile = Profile::parse(text, filter)?;
        Ok(Self::from_blocks(profile.blocks))
    }

    /// Insert one observation, OR-ing its covered flag into any existing entry.
    pub fn insert_block(&mut self, block: CoverageBlock) {
        let covered = block.is_covered();
        self.blocks
            .entry(block.key)
            .and_modify(|info| info.covered |= covered)
            .or_insert(BlockInfo {
                statements: block.statements,
                covered,
            });
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: &BlockSet) {
        for (key, info) in &other.blocks {
            match self.blocks.get_mut(key) {
                Some(existing) => existing.covered |= info.covered,
                None => {
                    self.blocks.insert(key.clone(), *info);
                }
            }
        }
    }

    /// Statements covered in `candidate` that are not yet covered here.
    pub fn count_new_statements(&self, candidate: &BlockSet) -> u64 {
        candidate
            .blocks
            .iter()
            .filter(|(_, info)| info.covered)
            .filter(|(key, _)| !self.blocks.get(*key).is_some_and(|own| own.covered))
            .map(|(_, info)| u64::from(info.statements))
            .sum()
    }

    /// Stats of `self ∪ other`, computed without building the union.
    pub fn union_stats(&self, other: &BlockSet) -> CoverageStats {
        let own = self.stats();
        let added_total: u64 = other
            .blocks
            .iter()
            .filter(|(key, _)| !self.blocks.contains_key(*key))
            .map(|(_, info)| u64::from(info.statements))
            .sum();
        CoverageStats {
            covered: own.covered + self.count_new_statements(other),
            total: own.total + added_total,
        }
    }

    /// Covered and total statements over all blocks.
    pub fn stats(&self) -> CoverageStats {
        let mut stats = CoverageStats::default();
        for info in self.blocks.values() {
            stats.add(info);
        }
        stats
    }

    /// Total statements over all blocks.
    pub fn total_statements(&self) -> u64 {
        self.stats().total
    }

    /// Statements in covered blocks.
    pub fn covered_statements(&self) -> u64 {
        self.stats().covered
    }

    /// Overall coverage percentage.
    pub fn percent(&self) -> Option<f64> {
        self.stats().percent()
    }

    /// Look up one block.
    pub fn get(&self, key: &BlockKey) -> Option<&BlockInfo> {
        self.blocks.get(key)
    }

    /// Iterate over blocks in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockKey, &BlockInfo)> {
        self.blocks.iter()
    }

    /// Number of distinct blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the set has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Per-function statement counts. Blocks outside any known function are skipped.
    pub fn function_stats<L: FunctionLocator + ?Sized>(
        &self,
        locator: &L,
    ) -> BTreeMap<String, CoverageStats> {
        let mut stats: BTreeMap<String, CoverageStats> = BTreeMap::new();
        for (key, info) in &self.blocks {
            if let Some(function) = locator.function_at(&key.file, key.start_line) {
                stats.entry(function).or_default().add(info);
            }
        }
        stats
    }

    /// Per-function coverage percentages. Functions with no statements are absent.
    pub fn function_coverage<L: FunctionLocator + ?Sized>(
        &self,
        locator: &L,
    ) -> BTreeMap<String, f64> {
        self.function_stats(locator)
            .into_iter()
            .filter_map(|(name, stats)| stats.percent().map(|p| (name, p)))
            .collect()
    }

    /// Split the set into one block set per enclosing function.
    pub fn partition_by_function<L: FunctionLocator + ?Sized>(
        &self,
        locator: &L,
    ) -> BTreeMap<String, BlockSet> {
        let mut parts: BTreeMap<String, BlockSet> = BTreeMap::new();
        for (key, info) in &self.blocks {
            if let Some(function) = locator.function_at(&key.file, key.start_line) {
                parts
                    .entry(function)
                    .or_default()
                    .blocks
                    .insert(key.clone(), *info);
            }
        }
        parts
    }

    /// Render as a sorted profile; covered blocks get count 1.
    pub fn to_profile(&self, mode: &str) -> Profile {
        let mut profile = Profile::with_mode(mode);
        let mut keys: Vec<&BlockKey> = self.blocks.keys().collect();
        keys.sort();
        profile.blocks = keys
            .into_iter()
            .map(|key| {
                let info = self.blocks[key];
                CoverageBlock::new(key.clone(), info.statements, u64::from(info.covered))
            })
            .collect();
        profile
    }
}
