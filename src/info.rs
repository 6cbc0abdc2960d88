//! Dataset metadata and the on-disk `dataset_info.json` file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::config::Version;
use crate::error::GranaryError;
use crate::splits::SplitInfo;
use crate::table::Schema;

/// File name of the metadata document written next to the materialized
/// splits.
pub const DATASET_INFO_FILENAME: &str = "dataset_info.json";

/// Size and checksum of one downloaded file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksum {
    pub num_bytes: u64,
    /// crc32c of the file contents, lower-hex. `None` when the checksum was
    /// not computed (for example an expectation that only pins the size).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Metadata describing a dataset: what `DatasetBuilder::info` returns, and
/// what `download_and_prepare` persists next to the data.
///
/// Before preparation, `splits` and `download_checksums` hold expectations
/// (when known) that integrity verification checks against; afterwards they
/// hold what was actually recorded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatasetInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,

    #[serde(default)]
    pub builder_name: String,

    #[serde(default)]
    pub config_name: String,

    #[serde(default)]
    pub version: Version,

    /// Pinned schema. When present, generation validates and coerces against
    /// it instead of inferring from the data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Schema>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub splits: BTreeMap<String, SplitInfo>,

    /// Per-source size/checksum records, keyed by the original source string
    /// (URL or local path).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub download_checksums: BTreeMap<String, FileChecksum>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_size: Option<u64>,
}

impl DatasetInfo {
    /// Reads `dataset_info.json` from a prepared dataset directory.
    pub fn read_from_dir(dir: &Path) -> Result<Self, GranaryError> {
        let path = dir.join(DATASET_INFO_FILENAME);
        let file = File::open(&path).map_err(GranaryError::Io)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|source| GranaryError::InfoJsonParse {
            path,
            source,
        })
    }

    /// Writes `dataset_info.json` into a prepared dataset directory.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), GranaryError> {
        let path = dir.join(DATASET_INFO_FILENAME);
        let file = File::create(&path).map_err(GranaryError::Io)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(|source| GranaryError::InfoJsonWrite {
            path,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{DataType, Field};

    #[test]
    fn info_roundtrips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut info = DatasetInfo {
            description: Some("test data".to_string()),
            builder_name: "csv".to_string(),
            config_name: "default".to_string(),
            version: "2.1.0".parse().expect("version"),
            features: Some(
                Schema::new(vec![Field::new("id", DataType::Int64)]).expect("schema"),
            ),
            ..Default::default()
        };
        info.splits.insert(
            "train".to_string(),
            SplitInfo {
                num_examples: 10,
                num_bytes: 123,
            },
        );
        info.download_checksums.insert(
            "data/train.csv".to_string(),
            FileChecksum {
                num_bytes: 64,
                checksum: Some("deadbeef".to_string()),
            },
        );

        info.write_to_dir(dir.path()).expect("write");
        let read = DatasetInfo::read_from_dir(dir.path()).expect("read");

        assert_eq!(read.builder_name, "csv");
        assert_eq!(read.version, info.version);
        assert_eq!(read.splits["train"].num_examples, 10);
        assert_eq!(
            read.download_checksums["data/train.csv"].checksum.as_deref(),
            Some("deadbeef")
        );
        assert_eq!(read.features, info.features);
    }

    #[test]
    fn schema_serializes_with_flattened_dtype() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new(
                "label",
                DataType::ClassLabel {
                    names: vec!["a".to_string()],
                },
            ),
        ])
        .expect("schema");

        let json = serde_json::to_value(&schema).expect("json");
        assert_eq!(json["fields"][0]["dtype"], "int64");
        assert_eq!(json["fields"][1]["dtype"], "class_label");
        assert_eq!(json["fields"][1]["names"][0], "a");
    }
}
