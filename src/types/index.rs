use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::HashMode;
use crate::types::Node;

/// index document schema version understood by this crate
pub const INDEX_VERSION: u32 = 1;

/// conventional file name of the index document
pub const DEFAULT_INDEX_NAME: &str = "nereid.json";

/// one deduplicated chunk of file content
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composable {
    pub hash: String,
    pub size: u64,
}

/// the versioned document describing every bucket and composable of a store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub version: u32,
    pub hash_mode: HashMode,
    /// bucket name to hash tree root
    pub buckets: BTreeMap<String, Node>,
    /// union of the composables referenced by all buckets
    pub composables: Vec<Composable>,
}

impl Index {
    /// fresh index with no buckets
    pub fn new(hash_mode: HashMode) -> Self {
        Self {
            version: INDEX_VERSION,
            hash_mode,
            buckets: BTreeMap::new(),
            composables: Vec::new(),
        }
    }

    /// parse an index document, rejecting unknown schema versions
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let index: Index = serde_json::from_slice(bytes)?;
        if index.version != INDEX_VERSION {
            return Err(Error::IndexVersion(index.version));
        }
        Ok(index)
    }

    /// load an index document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_path(path)?;
        Self::from_slice(&bytes)
    }

    /// load the index at path, or start a fresh one when the file does
    /// not exist; an existing index must use the requested hash mode
    pub fn load_or_new(path: &Path, hash_mode: HashMode) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(hash_mode));
        }
        let index = Self::load(path)?;
        if index.hash_mode != hash_mode {
            return Err(Error::HashModeMismatch {
                expected: hash_mode,
                found: index.hash_mode,
            });
        }
        Ok(index)
    }

    /// write the whole document, replacing any previous content
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json).with_path(path)
    }
}

/// in-memory dedup table for composables, keyed by chunk hash
#[derive(Debug, Default)]
pub struct ComposableTable {
    entries: BTreeMap<String, u64>,
}

impl ComposableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// seed the table with the composables an index already knows
    pub fn from_index(index: &Index) -> Self {
        let entries = index
            .composables
            .iter()
            .map(|c| (c.hash.clone(), c.size))
            .collect();
        Self { entries }
    }

    /// record one chunk; a hash already present keeps its first size
    pub fn record(&mut self, hash: &str, size: u64) {
        if !self.entries.contains_key(hash) {
            self.entries.insert(hash.to_string(), size);
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// drain into a composable list sorted by hash
    pub fn into_composables(self) -> Vec<Composable> {
        self.entries
            .into_iter()
            .map(|(hash, size)| Composable { hash, size })
            .collect()
    }
}
