//! Builder configuration and data-file resolution.
//!
//! A [`BuilderConfig`] parameterizes a dataset builder: a short name, a
//! version, an optional base directory, the raw data files (literal paths or
//! glob patterns, flat or keyed by split), and a free-form description.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use walkdir::WalkDir;

use crate::error::GranaryError;
use crate::splits::{infer_split_from_path, Split};

/// A `major.minor.patch` dataset version.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::new(1, 0, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = GranaryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || GranaryError::InvalidVersion {
            input: input.to_string(),
        };

        let mut parts = input.trim().split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let patch = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Version::new(major, minor, patch))
    }
}

impl TryFrom<String> for Version {
    type Error = GranaryError;

    fn try_from(input: String) -> Result<Self, Self::Error> {
        input.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// Raw data files for a builder: either a flat pattern list (splits inferred
/// from matched file names, defaulting to `train`) or an explicit map from
/// split name to patterns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataFiles {
    Patterns(Vec<String>),
    PerSplit(BTreeMap<String, Vec<String>>),
}

impl DataFiles {
    pub fn single(pattern: impl Into<String>) -> Self {
        DataFiles::Patterns(vec![pattern.into()])
    }

    /// Resolves patterns against `base_dir` into concrete files per split.
    ///
    /// Matches are sorted for determinism. A pattern matching no files and a
    /// literal path that does not exist are both errors.
    pub fn resolve(&self, base_dir: &Path) -> Result<BTreeMap<Split, Vec<PathBuf>>, GranaryError> {
        let mut resolved: BTreeMap<Split, Vec<PathBuf>> = BTreeMap::new();

        match self {
            DataFiles::Patterns(patterns) => {
                for pattern in patterns {
                    for path in resolve_pattern(base_dir, pattern)? {
                        let split = infer_split_from_path(&path).unwrap_or_else(Split::train);
                        resolved.entry(split).or_default().push(path);
                    }
                }
            }
            DataFiles::PerSplit(per_split) => {
                for (split_name, patterns) in per_split {
                    let split = Split::normalize(split_name);
                    for pattern in patterns {
                        resolved
                            .entry(split.clone())
                            .or_default()
                            .extend(resolve_pattern(base_dir, pattern)?);
                    }
                }
            }
        }

        for files in resolved.values_mut() {
            files.sort();
            files.dedup();
        }
        Ok(resolved)
    }
}

fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

fn resolve_pattern(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, GranaryError> {
    if !is_glob_pattern(pattern) {
        let path = {
            let literal = Path::new(pattern);
            if literal.is_absolute() {
                literal.to_path_buf()
            } else {
                base_dir.join(literal)
            }
        };
        if !path.is_file() {
            return Err(GranaryError::MissingDataFile { path });
        }
        return Ok(vec![path]);
    }

    let mut matches = Vec::new();
    for entry in WalkDir::new(base_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
    {
        let entry = entry.map_err(|source| GranaryError::Io(source.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base_dir) else {
            continue;
        };
        let relative = path_to_slash_string(relative);
        if glob_match(pattern, &relative) {
            matches.push(entry.path().to_path_buf());
        }
    }

    if matches.is_empty() {
        return Err(GranaryError::EmptyPattern {
            pattern: pattern.to_string(),
        });
    }
    matches.sort();
    Ok(matches)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn path_to_slash_string(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Matches a glob pattern against a `/`-separated relative path.
///
/// `*` matches within one path component, `?` matches a single non-separator
/// character, and `**` matches across components.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    if pattern.is_empty() {
        return text.is_empty();
    }

    if pattern.starts_with(b"**") {
        let rest = &pattern[2..];
        // `**/` may consume zero components.
        if let Some(after_slash) = rest.strip_prefix(b"/") {
            if match_bytes(after_slash, text) {
                return true;
            }
        }
        let mut offset = 0;
        loop {
            if match_bytes(rest, &text[offset..]) {
                return true;
            }
            if offset >= text.len() {
                return false;
            }
            offset += 1;
        }
    }

    match pattern[0] {
        b'*' => {
            let mut offset = 0;
            loop {
                if match_bytes(&pattern[1..], &text[offset..]) {
                    return true;
                }
                if offset >= text.len() || text[offset] == b'/' {
                    return false;
                }
                offset += 1;
            }
        }
        b'?' => {
            !text.is_empty() && text[0] != b'/' && match_bytes(&pattern[1..], &text[1..])
        }
        byte => !text.is_empty() && text[0] == byte && match_bytes(&pattern[1..], &text[1..]),
    }
}

/// Configuration for a dataset builder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Config name; becomes a directory component in the cache layout.
    pub name: String,

    /// Dataset version; also a directory component in the cache layout.
    #[serde(default)]
    pub version: Version,

    /// Base directory for relative data file patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Raw data files. When absent, packaged builders scan `data_dir` for
    /// files of their format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_files: Option<DataFiles>,

    /// Free-form description carried into the dataset info.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            version: Version::default(),
            data_dir: None,
            data_files: None,
            description: None,
        }
    }
}

impl BuilderConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The directory relative patterns resolve against.
    pub fn base_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Checks that the config name is usable as a directory component.
    pub fn validate(&self) -> Result<(), GranaryError> {
        if self.name.is_empty() {
            return Err(GranaryError::InvalidConfig {
                message: "config name must not be empty".to_string(),
            });
        }
        if self.name == "." || self.name == ".." {
            return Err(GranaryError::InvalidConfig {
                message: format!("config name '{}' is reserved", self.name),
            });
        }
        const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
        if let Some(bad) = self
            .name
            .chars()
            .find(|c| FORBIDDEN.contains(c) || c.is_control())
        {
            return Err(GranaryError::InvalidConfig {
                message: format!("config name contains forbidden character '{bad}'"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn glob_star_stays_within_a_component() {
        assert!(glob_match("*.csv", "rows.csv"));
        assert!(!glob_match("*.csv", "data/rows.csv"));
        assert!(glob_match("data/*.csv", "data/rows.csv"));
        assert!(!glob_match("data/*.csv", "data/deep/rows.csv"));
    }

    #[test]
    fn glob_double_star_crosses_components() {
        assert!(glob_match("**/*.csv", "rows.csv"));
        assert!(glob_match("**/*.csv", "data/deep/rows.csv"));
        assert!(glob_match("data/**", "data/deep/rows.csv"));
        assert!(!glob_match("data/**", "other/rows.csv"));
    }

    #[test]
    fn glob_question_mark_matches_one_character() {
        assert!(glob_match("row?.csv", "rows.csv"));
        assert!(!glob_match("row?.csv", "row/a.csv"));
        assert!(!glob_match("row?.csv", "row.csv"));
    }

    #[test]
    fn version_parses_and_displays() {
        let version: Version = "2.10.3".parse().expect("parse");
        assert_eq!(version, Version::new(2, 10, 3));
        assert_eq!(version.to_string(), "2.10.3");
        assert!("2.10".parse::<Version>().is_err());
        assert!("a.b.c".parse::<Version>().is_err());
    }

    #[test]
    fn config_name_validation() {
        assert!(BuilderConfig::named("default").validate().is_ok());
        assert!(BuilderConfig::named("en-v1_0").validate().is_ok());
        assert!(BuilderConfig::named("").validate().is_err());
        assert!(BuilderConfig::named("a/b").validate().is_err());
        assert!(BuilderConfig::named("..").validate().is_err());
    }

    #[test]
    fn flat_patterns_infer_splits_from_file_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("train.csv"), "a\n1\n").expect("write");
        fs::write(dir.path().join("test.csv"), "a\n2\n").expect("write");
        fs::write(dir.path().join("extra.csv"), "a\n3\n").expect("write");

        let files = DataFiles::single("*.csv");
        let resolved = files.resolve(dir.path()).expect("resolve");

        assert_eq!(resolved[&Split::train()].len(), 2); // train.csv + extra.csv
        assert_eq!(resolved[&Split::test()].len(), 1);
    }

    #[test]
    fn per_split_patterns_do_not_infer() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.csv"), "x\n1\n").expect("write");

        let mut per_split = BTreeMap::new();
        per_split.insert("holdout".to_string(), vec!["a.csv".to_string()]);
        let resolved = DataFiles::PerSplit(per_split)
            .resolve(dir.path())
            .expect("resolve");

        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key(&Split::new("holdout")));
    }

    #[test]
    fn unmatched_pattern_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = DataFiles::single("*.parquet")
            .resolve(dir.path())
            .expect_err("no matches");
        match err {
            GranaryError::EmptyPattern { pattern } => assert_eq!(pattern, "*.parquet"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn hidden_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(".cache")).expect("mkdir");
        fs::write(dir.path().join(".cache").join("x.csv"), "a\n1\n").expect("write");
        fs::write(dir.path().join("x.csv"), "a\n1\n").expect("write");

        let resolved = DataFiles::single("**/*.csv")
            .resolve(dir.path())
            .expect("resolve");
        let all: Vec<_> = resolved.values().flatten().collect();
        assert_eq!(all.len(), 1);
    }
}
