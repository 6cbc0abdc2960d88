//! Cache layout.
//!
//! Downloads land under `<cache>/downloads/`; prepared datasets under
//! `<cache>/datasets/<builder>/<config>/<version>/`.

use std::env;
use std::path::{Path, PathBuf};

use crate::config::Version;

/// Resolves the cache root: `$GRANARY_HOME`, else `$XDG_CACHE_HOME/granary`,
/// else `~/.cache/granary`, else `./.granary`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(home) = env::var("GRANARY_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    if let Ok(xdg) = env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return Path::new(&xdg).join("granary");
        }
    }
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Path::new(&home).join(".cache").join("granary");
        }
    }
    PathBuf::from(".granary")
}

pub fn downloads_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join("downloads")
}

/// Directory a prepared dataset materializes into.
pub fn dataset_dir(
    cache_dir: &Path,
    builder_name: &str,
    config_name: &str,
    version: &Version,
) -> PathBuf {
    cache_dir
        .join("datasets")
        .join(builder_name)
        .join(config_name)
        .join(version.to_string())
}

/// Stable cache file name for a URL: a crc32c fingerprint of the URL plus a
/// sanitized version of its final path segment.
pub fn url_cache_name(url: &str) -> String {
    let fingerprint = crc32c::crc32c(url.as_bytes());

    let file_name = url
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        format!("{fingerprint:08x}-download")
    } else {
        format!("{fingerprint:08x}-{sanitized}")
    }
}

/// Shard file name for one materialized split.
pub fn shard_file_name(split: &str, index: usize, total: usize) -> String {
    format!("{split}-{index:05}-of-{total:05}.parquet")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_cache_names_are_stable_and_distinct() {
        let a = url_cache_name("https://example.com/data/train.csv");
        let b = url_cache_name("https://example.com/data/train.csv");
        let c = url_cache_name("https://example.com/other/train.csv");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.ends_with("-train.csv"));
    }

    #[test]
    fn query_strings_are_stripped_from_the_name() {
        let name = url_cache_name("https://example.com/rows.jsonl?token=abc");
        assert!(name.ends_with("-rows.jsonl"), "got: {name}");
    }

    #[test]
    fn shard_names_follow_the_shard_grammar() {
        assert_eq!(shard_file_name("train", 0, 1), "train-00000-of-00001.parquet");
        assert_eq!(shard_file_name("test", 3, 12), "test-00003-of-00012.parquet");
    }

    #[test]
    fn dataset_dir_layers_builder_config_version() {
        let dir = dataset_dir(
            Path::new("/tmp/cache"),
            "csv",
            "default",
            &Version::new(1, 0, 0),
        );
        assert_eq!(
            dir,
            Path::new("/tmp/cache/datasets/csv/default/1.0.0")
        );
    }
}
