//! The builder lifecycle: `info`, `split_generators`, `generate_examples`,
//! and the `download_and_prepare` driver that runs them.
//!
//! A builder describes a dataset in three steps: metadata, the splits and
//! the raw files behind them (acquired through a [`DownloadManager`] so
//! integrity records exist), and a stream of examples per split. The driver
//! materializes each split into a Parquet shard, verifies the run against
//! the builder's expectations, and persists the final metadata.

pub mod packaged;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BuilderConfig;
use crate::dataset::Dataset;
use crate::download::{
    cache, verify_checksums, verify_splits, DownloadConfig, DownloadManager, VerificationMode,
};
use crate::error::GranaryError;
use crate::info::{DatasetInfo, DATASET_INFO_FILENAME};
use crate::splits::{Split, SplitGenerator, SplitInfo};
use crate::table::{ExampleStream, Schema, SchemaBuilder};
use crate::writer::{TableWriter, DEFAULT_WRITER_BATCH_SIZE};

/// A dataset builder: configuration in, materialized typed splits out.
pub trait DatasetBuilder {
    /// Short name of the builder kind; a directory component in the cache
    /// layout.
    fn builder_name(&self) -> &'static str;

    fn config(&self) -> &BuilderConfig;

    /// Dataset metadata, including any expectations (pinned schema, expected
    /// split sizes, expected download checksums) to verify a run against.
    fn info(&self) -> DatasetInfo;

    /// Acquires raw files and declares the splits they belong to. Every file
    /// must be routed through the download manager so its checksum is
    /// recorded.
    fn split_generators(
        &self,
        dl: &mut DownloadManager,
    ) -> Result<Vec<SplitGenerator>, GranaryError>;

    /// Streams the examples of one split. `features` is the pinned or
    /// already-inferred schema; `None` means the caller is still inferring.
    fn generate_examples(
        &self,
        files: &[PathBuf],
        features: Option<&Schema>,
    ) -> Result<ExampleStream, GranaryError>;
}

/// Options for [`download_and_prepare`].
#[derive(Clone, Debug)]
pub struct PrepareOptions {
    pub cache_dir: PathBuf,
    /// Materialize here instead of the cache layout.
    pub output_dir: Option<PathBuf>,
    pub verification: VerificationMode,
    pub writer_batch_size: usize,
    /// Regenerate even when the target directory is already prepared.
    pub force_prepare: bool,
    pub force_download: bool,
    pub token: Option<String>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            cache_dir: cache::default_cache_dir(),
            output_dir: None,
            verification: VerificationMode::default(),
            writer_batch_size: DEFAULT_WRITER_BATCH_SIZE,
            force_prepare: false,
            force_download: false,
            token: None,
        }
    }
}

/// A materialized dataset directory: Parquet shards plus
/// `dataset_info.json`.
#[derive(Clone, Debug)]
pub struct PreparedDataset {
    pub dir: PathBuf,
    pub info: DatasetInfo,
}

impl PreparedDataset {
    /// Opens an already-prepared directory.
    pub fn open(dir: &Path) -> Result<Self, GranaryError> {
        let info = DatasetInfo::read_from_dir(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            info,
        })
    }

    pub fn splits(&self) -> Vec<Split> {
        self.info.splits.keys().map(|name| Split::new(name.clone())).collect()
    }

    /// The shard files of one split, in shard order.
    pub fn split_files(&self, split: &Split) -> Result<Vec<PathBuf>, GranaryError> {
        let prefix = format!("{split}-");
        let mut shards = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(GranaryError::Io)? {
            let entry = entry.map_err(GranaryError::Io)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".parquet") {
                shards.push(entry.path());
            }
        }
        if shards.is_empty() {
            return Err(GranaryError::MissingSplit {
                dir: self.dir.clone(),
                split: split.to_string(),
            });
        }
        shards.sort();
        Ok(shards)
    }

    /// Reads one split back into memory.
    pub fn load_split(&self, split: &Split) -> Result<Dataset, GranaryError> {
        let mut builder = SchemaBuilder::new();
        let mut rows = Vec::new();
        for shard in self.split_files(split)? {
            let (shard_schema, shard_rows) = crate::table::io_parquet::read_parquet(&shard)?;
            for field in &shard_schema.fields {
                // Seed inference with the shard schema so empty shards still
                // contribute their columns.
                builder.observe_value(&field.name, &crate::table::Value::Null);
            }
            for row in &shard_rows {
                builder.observe(row);
            }
            rows.extend(shard_rows);
        }

        let schema = match &self.info.features {
            Some(features) => features.clone(),
            None => builder.finish(),
        };
        Ok(Dataset::new(schema, rows))
    }

    /// Reads every split back into memory.
    pub fn load_all(&self) -> Result<BTreeMap<Split, Dataset>, GranaryError> {
        let mut datasets = BTreeMap::new();
        for split in self.splits() {
            let dataset = self.load_split(&split)?;
            datasets.insert(split, dataset);
        }
        Ok(datasets)
    }
}

/// Runs the full builder lifecycle and materializes the dataset.
///
/// Already-prepared directories are reused unless `force_prepare` is set;
/// integrity verification runs per `options.verification` and its failures
/// abort the run before any metadata is persisted.
pub fn download_and_prepare(
    builder: &dyn DatasetBuilder,
    options: &PrepareOptions,
) -> Result<PreparedDataset, GranaryError> {
    let config = builder.config();
    config.validate()?;

    let dir = options.output_dir.clone().unwrap_or_else(|| {
        cache::dataset_dir(
            &options.cache_dir,
            builder.builder_name(),
            &config.name,
            &config.version,
        )
    });

    if dir.join(DATASET_INFO_FILENAME).is_file() && !options.force_prepare {
        eprintln!("Note: reusing prepared dataset at {}", dir.display());
        return PreparedDataset::open(&dir);
    }
    fs::create_dir_all(&dir).map_err(GranaryError::Io)?;

    let mut info = builder.info();
    info.builder_name = builder.builder_name().to_string();
    info.config_name = config.name.clone();
    info.version = config.version.clone();
    if info.description.is_none() {
        info.description = config.description.clone();
    }

    let mut dl = DownloadManager::new(DownloadConfig {
        cache_dir: options.cache_dir.clone(),
        force_download: options.force_download,
        token: options.token.clone(),
    });
    let generators = builder.split_generators(&mut dl)?;

    verify_checksums(
        &info.download_checksums,
        dl.recorded_checksums(),
        options.verification,
    )?;

    // Without a pinned schema, make one inference pass over every split so
    // all shards share the same columns.
    let features = match info.features.clone() {
        Some(features) => features,
        None => {
            let mut schema_builder = SchemaBuilder::new();
            for generator in &generators {
                for example in builder.generate_examples(&generator.files, None)? {
                    schema_builder.observe(&example?);
                }
            }
            schema_builder.finish()
        }
    };

    let expected_splits = info.splits.clone();
    let mut recorded_splits: BTreeMap<String, SplitInfo> = BTreeMap::new();

    for generator in &generators {
        let shard = cache::shard_file_name(generator.split.as_str(), 0, 1);
        let staging = dir.join(format!("{shard}.incomplete"));

        let mut writer =
            TableWriter::create(&staging, features.clone(), options.writer_batch_size)?;
        for example in builder.generate_examples(&generator.files, Some(&features))? {
            writer.write(example?)?;
        }
        let split_info = writer.finish()?;

        fs::rename(&staging, dir.join(&shard)).map_err(GranaryError::Io)?;
        eprintln!(
            "Generated split '{}': {} example(s), {} byte(s)",
            generator.split, split_info.num_examples, split_info.num_bytes
        );
        recorded_splits.insert(generator.split.to_string(), split_info);
    }

    verify_splits(&expected_splits, &recorded_splits, options.verification)?;

    info.dataset_size = Some(recorded_splits.values().map(|split| split.num_bytes).sum());
    info.download_size = Some(dl.download_size());
    info.splits = recorded_splits;
    info.download_checksums = dl.recorded_checksums().clone();
    info.features = Some(features);
    info.write_to_dir(&dir)?;

    Ok(PreparedDataset { dir, info })
}
