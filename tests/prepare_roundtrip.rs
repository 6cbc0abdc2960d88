//! End-to-end prepare tests for the CSV builder: materialize, verify, and
//! read splits back.

mod common;

use std::collections::BTreeMap;

use granary::builder::packaged::CsvBuilder;
use granary::builder::{download_and_prepare, DatasetBuilder, PrepareOptions};
use granary::config::BuilderConfig;
use granary::download::{DownloadManager, VerificationMode};
use granary::error::GranaryError;
use granary::info::{DatasetInfo, FileChecksum};
use granary::splits::{Split, SplitGenerator, SplitInfo};
use granary::table::{DataType, ExampleStream, Schema, Value};

use common::{sandboxed_options, write_csv_dataset};

fn csv_config(data_dir: &std::path::Path) -> BuilderConfig {
    BuilderConfig {
        data_dir: Some(data_dir.to_path_buf()),
        description: Some("two-split fixture".to_string()),
        ..BuilderConfig::default()
    }
}

#[test]
fn prepare_materializes_inferred_splits() {
    let root = tempfile::tempdir().expect("tempdir");
    let data = root.path().join("data");
    std::fs::create_dir(&data).expect("mkdir");
    write_csv_dataset(&data);

    let builder = CsvBuilder::new(csv_config(&data));
    let prepared =
        download_and_prepare(&builder, &sandboxed_options(root.path())).expect("prepare");

    assert_eq!(prepared.info.builder_name, "csv");
    assert_eq!(prepared.info.splits.len(), 2);
    assert_eq!(prepared.info.splits["train"].num_examples, 3);
    assert_eq!(prepared.info.splits["test"].num_examples, 1);

    // Both raw files got checksum records.
    assert_eq!(prepared.info.download_checksums.len(), 2);
    for record in prepared.info.download_checksums.values() {
        assert!(record.num_bytes > 0);
        assert!(record.checksum.is_some());
    }

    // The inferred schema is pinned into the info.
    let features = prepared.info.features.as_ref().expect("features");
    assert_eq!(features.field("id").unwrap().data_type, DataType::Int64);
    assert_eq!(features.field("name").unwrap().data_type, DataType::Utf8);
    assert_eq!(
        features.field("score").unwrap().data_type,
        DataType::Float64
    );

    // Shards carry HF-style names.
    assert!(prepared.dir.join("train-00000-of-00001.parquet").is_file());
    assert!(prepared.dir.join("test-00000-of-00001.parquet").is_file());

    // Rows read back with their types.
    let train = prepared.load_split(&Split::train()).expect("load train");
    assert_eq!(train.len(), 3);
    assert_eq!(train.get(0).unwrap().get("id"), Some(&Value::Int(1)));
    assert_eq!(
        train.get(2).unwrap().get("name"),
        Some(&Value::Str("carol".to_string()))
    );
    assert_eq!(train.get(1).unwrap().get("score"), Some(&Value::Float(1.5)));
}

#[test]
fn prepare_reuses_an_existing_materialization() {
    let root = tempfile::tempdir().expect("tempdir");
    let data = root.path().join("data");
    std::fs::create_dir(&data).expect("mkdir");
    write_csv_dataset(&data);

    let builder = CsvBuilder::new(csv_config(&data));
    let options = sandboxed_options(root.path());

    let first = download_and_prepare(&builder, &options).expect("first prepare");
    let marker = first.dir.join("marker");
    std::fs::write(&marker, "untouched").expect("marker");

    let second = download_and_prepare(&builder, &options).expect("second prepare");
    assert_eq!(second.dir, first.dir);
    // Reuse must not regenerate the directory.
    assert!(marker.is_file());

    let forced = download_and_prepare(
        &builder,
        &PrepareOptions {
            force_prepare: true,
            ..options
        },
    )
    .expect("forced prepare");
    assert_eq!(forced.info.splits["train"].num_examples, 3);
}

/// A builder wrapping the CSV builder with explicit integrity expectations.
struct ExpectingBuilder {
    inner: CsvBuilder,
    expected_checksums: BTreeMap<String, FileChecksum>,
    expected_splits: BTreeMap<String, SplitInfo>,
}

impl DatasetBuilder for ExpectingBuilder {
    fn builder_name(&self) -> &'static str {
        "csv"
    }

    fn config(&self) -> &BuilderConfig {
        self.inner.config()
    }

    fn info(&self) -> DatasetInfo {
        DatasetInfo {
            download_checksums: self.expected_checksums.clone(),
            splits: self.expected_splits.clone(),
            ..self.inner.info()
        }
    }

    fn split_generators(
        &self,
        dl: &mut DownloadManager,
    ) -> Result<Vec<SplitGenerator>, GranaryError> {
        self.inner.split_generators(dl)
    }

    fn generate_examples(
        &self,
        files: &[std::path::PathBuf],
        features: Option<&Schema>,
    ) -> Result<ExampleStream, GranaryError> {
        self.inner.generate_examples(files, features)
    }
}

#[test]
fn checksum_expectations_gate_the_run() {
    let root = tempfile::tempdir().expect("tempdir");
    let data = root.path().join("data");
    std::fs::create_dir(&data).expect("mkdir");
    let (train, _) = write_csv_dataset(&data);

    let mut expected = BTreeMap::new();
    expected.insert(
        train.to_string_lossy().to_string(),
        FileChecksum {
            num_bytes: 1, // deliberately wrong
            checksum: Some("00000000".to_string()),
        },
    );

    let builder = ExpectingBuilder {
        inner: CsvBuilder::new(csv_config(&data)),
        expected_checksums: expected,
        expected_splits: BTreeMap::new(),
    };

    let err = download_and_prepare(&builder, &sandboxed_options(root.path()))
        .expect_err("mismatched checksum");
    assert!(matches!(err, GranaryError::ChecksumMismatch { .. }));
    assert!(err.is_verification_failure());

    // The documented bypass.
    let prepared = download_and_prepare(
        &builder,
        &PrepareOptions {
            verification: VerificationMode::NoChecks,
            ..sandboxed_options(root.path())
        },
    )
    .expect("bypassed");
    assert_eq!(prepared.info.splits["train"].num_examples, 3);
}

#[test]
fn split_expectations_gate_the_run() {
    let root = tempfile::tempdir().expect("tempdir");
    let data = root.path().join("data");
    std::fs::create_dir(&data).expect("mkdir");
    write_csv_dataset(&data);

    let mut expected_splits = BTreeMap::new();
    expected_splits.insert(
        "train".to_string(),
        SplitInfo {
            num_examples: 99,
            num_bytes: 0,
        },
    );
    expected_splits.insert(
        "test".to_string(),
        SplitInfo {
            num_examples: 1,
            num_bytes: 0,
        },
    );

    let builder = ExpectingBuilder {
        inner: CsvBuilder::new(csv_config(&data)),
        expected_checksums: BTreeMap::new(),
        expected_splits,
    };

    // BasicChecks still verifies split sizes.
    let err = download_and_prepare(
        &builder,
        &PrepareOptions {
            verification: VerificationMode::BasicChecks,
            ..sandboxed_options(root.path())
        },
    )
    .expect_err("split mismatch");
    assert!(matches!(err, GranaryError::SplitsMismatch { .. }));

    let prepared = download_and_prepare(
        &builder,
        &PrepareOptions {
            verification: VerificationMode::NoChecks,
            ..sandboxed_options(root.path())
        },
    )
    .expect("bypassed");
    assert_eq!(prepared.info.splits["train"].num_examples, 3);
}

#[test]
fn explicit_split_map_overrides_inference() {
    let root = tempfile::tempdir().expect("tempdir");
    let data = root.path().join("data");
    std::fs::create_dir(&data).expect("mkdir");
    write_csv_dataset(&data);

    let mut per_split = BTreeMap::new();
    per_split.insert("everything".to_string(), vec!["*.csv".to_string()]);

    let config = BuilderConfig {
        data_dir: Some(data.clone()),
        data_files: Some(granary::config::DataFiles::PerSplit(per_split)),
        ..BuilderConfig::default()
    };

    let builder = CsvBuilder::new(config);
    let prepared =
        download_and_prepare(&builder, &sandboxed_options(root.path())).expect("prepare");

    assert_eq!(prepared.info.splits.len(), 1);
    assert_eq!(prepared.info.splits["everything"].num_examples, 4);
}
