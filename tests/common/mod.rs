//! Shared helpers for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use granary::builder::PrepareOptions;

/// Writes a small two-split CSV dataset into `dir` and returns its paths.
pub fn write_csv_dataset(dir: &Path) -> (PathBuf, PathBuf) {
    let train = dir.join("train.csv");
    let test = dir.join("test.csv");
    fs::write(
        &train,
        "id,name,score\n1,alice,0.5\n2,bob,1.5\n3,carol,2.5\n",
    )
    .expect("write train.csv");
    fs::write(&test, "id,name,score\n10,dave,9.5\n").expect("write test.csv");
    (train, test)
}

/// Prepare options that keep everything inside the given temp directory.
pub fn sandboxed_options(root: &Path) -> PrepareOptions {
    PrepareOptions {
        cache_dir: root.join("cache"),
        ..PrepareOptions::default()
    }
}
