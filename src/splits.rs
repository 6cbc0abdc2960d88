//! Named splits and per-split metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A named dataset split.
///
/// The three conventional splits have constants; arbitrary names are allowed
/// for custom splits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Split(String);

impl Split {
    pub const TRAIN: &'static str = "train";
    pub const TEST: &'static str = "test";
    pub const VALIDATION: &'static str = "validation";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn train() -> Self {
        Self(Self::TRAIN.to_string())
    }

    pub fn test() -> Self {
        Self(Self::TEST.to_string())
    }

    pub fn validation() -> Self {
        Self(Self::VALIDATION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Maps common aliases onto canonical split names. Unknown names pass
    /// through unchanged.
    pub fn normalize(name: &str) -> Split {
        match name.to_ascii_lowercase().as_str() {
            "train" | "training" => Split::train(),
            "test" | "testing" => Split::test(),
            "validation" | "valid" | "val" | "dev" => Split::validation(),
            _ => Split::new(name),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Split {
    fn from(name: &str) -> Self {
        Split::new(name)
    }
}

/// What `DatasetBuilder::split_generators` returns: one entry per split with
/// the local files whose rows make up that split.
#[derive(Clone, Debug)]
pub struct SplitGenerator {
    pub split: Split,
    pub files: Vec<PathBuf>,
}

impl SplitGenerator {
    pub fn new(split: Split, files: Vec<PathBuf>) -> Self {
        Self { split, files }
    }
}

/// Recorded (or expected) size of one materialized split.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInfo {
    pub num_examples: u64,
    pub num_bytes: u64,
}

/// Known canonical split names, used when inferring splits from file names.
const KNOWN_SPLITS: &[&str] = &[
    "train",
    "training",
    "test",
    "testing",
    "validation",
    "valid",
    "val",
    "dev",
];

fn known_split(name: &str) -> Option<Split> {
    let lowered = name.to_ascii_lowercase();
    KNOWN_SPLITS
        .iter()
        .find(|known| **known == lowered)
        .map(|known| Split::normalize(known))
}

/// Infers a split from a file path.
///
/// Handles shard-style file names (`train-00000-of-00002.parquet`), plain
/// stems (`test.csv`), and split-named parent directories
/// (`validation/rows.jsonl`). Returns `None` when nothing matches.
pub fn infer_split_from_path(path: &Path) -> Option<Split> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_ascii_lowercase());

    if let Some(file_name) = file_name {
        if let Some((prefix, _)) = file_name.split_once('-') {
            if let Some(split) = known_split(prefix) {
                return Some(split);
            }
        }
        if let Some((stem, _)) = file_name.rsplit_once('.') {
            if let Some(split) = known_split(stem) {
                return Some(split);
            }
        }
    }

    for component in path.components().rev() {
        let Some(name) = component.as_os_str().to_str() else {
            continue;
        };
        if let Some(split) = known_split(name) {
            return Some(split);
        }
    }

    None
}
