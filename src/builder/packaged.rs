//! Packaged builders for plain tabular files, dispatched by extension.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{BuilderConfig, DataFiles};
use crate::dataset::Dataset;
use crate::download::{is_remote, DownloadManager};
use crate::error::GranaryError;
use crate::info::DatasetInfo;
use crate::splits::{infer_split_from_path, Split, SplitGenerator};
use crate::table::{io_csv, io_jsonl, io_parquet, ExampleStream, Schema};

use super::{download_and_prepare, DatasetBuilder, PrepareOptions};

/// Raw file formats the packaged builders understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
    Parquet,
}

impl FileFormat {
    /// Extension-based dispatch.
    pub fn from_path(path: &Path) -> Option<FileFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "tsv" => Some(FileFormat::Csv),
            "json" | "jsonl" | "ndjson" => Some(FileFormat::Json),
            "parquet" => Some(FileFormat::Parquet),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Parquet => "parquet",
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileFormat::Csv => &["csv", "tsv"],
            FileFormat::Json => &["json", "jsonl", "ndjson"],
            FileFormat::Parquet => &["parquet"],
        }
    }
}

impl std::str::FromStr for FileFormat {
    type Err = GranaryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "csv" | "tsv" => Ok(FileFormat::Csv),
            "json" | "jsonl" | "ndjson" => Ok(FileFormat::Json),
            "parquet" => Ok(FileFormat::Parquet),
            other => Err(GranaryError::UnsupportedFormat(format!(
                "'{other}' (supported: csv, json, parquet)"
            ))),
        }
    }
}

fn scan_dir_for(format: FileFormat, dir: &Path) -> Result<Vec<PathBuf>, GranaryError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .file_name()
                    .to_str()
                    .map(|name| !name.starts_with('.'))
                    .unwrap_or(true)
        })
    {
        let entry = entry.map_err(|source| GranaryError::Io(source.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                format.extensions().contains(&ext.as_str())
            })
            .unwrap_or(false);
        if matches {
            files.push(entry.path().to_path_buf());
        }
    }

    if files.is_empty() {
        return Err(GranaryError::EmptyPattern {
            pattern: format!("**/*.{{{}}}", format.extensions().join(",")),
        });
    }
    files.sort();
    Ok(files)
}

/// Resolves a config's data files into per-split sources, downloading remote
/// URLs and recording a checksum for every local file.
fn resolve_split_files(
    config: &BuilderConfig,
    format: FileFormat,
    dl: &mut DownloadManager,
) -> Result<Vec<SplitGenerator>, GranaryError> {
    let base_dir = config.base_dir();
    let mut per_split: BTreeMap<Split, Vec<PathBuf>> = BTreeMap::new();

    match &config.data_files {
        None => {
            for path in scan_dir_for(format, &base_dir)? {
                let split = infer_split_from_path(&path).unwrap_or_else(Split::train);
                let local = dl.record_local(&path)?;
                per_split.entry(split).or_default().push(local);
            }
        }
        Some(DataFiles::Patterns(patterns)) => {
            for pattern in patterns {
                if is_remote(pattern) {
                    let local = dl.download(pattern)?;
                    let split =
                        infer_split_from_path(Path::new(pattern)).unwrap_or_else(Split::train);
                    per_split.entry(split).or_default().push(local);
                } else {
                    let resolved = DataFiles::Patterns(vec![pattern.clone()]).resolve(&base_dir)?;
                    for (split, files) in resolved {
                        for path in files {
                            let local = dl.record_local(&path)?;
                            per_split.entry(split.clone()).or_default().push(local);
                        }
                    }
                }
            }
        }
        Some(DataFiles::PerSplit(map)) => {
            for (split_name, patterns) in map {
                let split = Split::normalize(split_name);
                for pattern in patterns {
                    if is_remote(pattern) {
                        let local = dl.download(pattern)?;
                        per_split.entry(split.clone()).or_default().push(local);
                    } else {
                        let resolved =
                            DataFiles::Patterns(vec![pattern.clone()]).resolve(&base_dir)?;
                        for (_, files) in resolved {
                            for path in files {
                                let local = dl.record_local(&path)?;
                                per_split.entry(split.clone()).or_default().push(local);
                            }
                        }
                    }
                }
            }
        }
    }

    let mut generators = Vec::new();
    for (split, mut files) in per_split {
        files.sort();
        files.dedup();
        generators.push(SplitGenerator::new(split, files));
    }
    Ok(generators)
}

fn base_info(config: &BuilderConfig) -> DatasetInfo {
    DatasetInfo {
        description: config.description.clone(),
        config_name: config.name.clone(),
        version: config.version.clone(),
        ..DatasetInfo::default()
    }
}

macro_rules! packaged_builder {
    ($name:ident, $format:expr, $builder_name:literal) => {
        pub struct $name {
            config: BuilderConfig,
        }

        impl $name {
            pub fn new(config: BuilderConfig) -> Self {
                Self { config }
            }
        }

        impl DatasetBuilder for $name {
            fn builder_name(&self) -> &'static str {
                $builder_name
            }

            fn config(&self) -> &BuilderConfig {
                &self.config
            }

            fn info(&self) -> DatasetInfo {
                base_info(&self.config)
            }

            fn split_generators(
                &self,
                dl: &mut DownloadManager,
            ) -> Result<Vec<SplitGenerator>, GranaryError> {
                resolve_split_files(&self.config, $format, dl)
            }

            fn generate_examples(
                &self,
                files: &[PathBuf],
                features: Option<&Schema>,
            ) -> Result<ExampleStream, GranaryError> {
                stream_files($format, files, features)
            }
        }
    };
}

packaged_builder!(CsvBuilder, FileFormat::Csv, "csv");
packaged_builder!(JsonBuilder, FileFormat::Json, "json");
packaged_builder!(ParquetBuilder, FileFormat::Parquet, "parquet");

pub(crate) fn stream_files(
    format: FileFormat,
    files: &[PathBuf],
    features: Option<&Schema>,
) -> Result<ExampleStream, GranaryError> {
    let mut streams: Vec<ExampleStream> = Vec::with_capacity(files.len());
    for path in files {
        if FileFormat::from_path(path) != Some(format) {
            return Err(GranaryError::UnsupportedFormat(format!(
                "'{}' is not a {} file",
                path.display(),
                format.name()
            )));
        }
        let stream: ExampleStream = match format {
            FileFormat::Csv => match features {
                Some(schema) => {
                    Box::new(io_csv::read_csv_with_schema(path, schema.clone())?)
                }
                None => Box::new(io_csv::read_csv(path)?.1),
            },
            FileFormat::Json => Box::new(io_jsonl::read_json_examples(path)?),
            FileFormat::Parquet => Box::new(io_parquet::read_parquet_examples(path)?),
        };
        streams.push(stream);
    }
    Ok(Box::new(streams.into_iter().flatten()))
}

/// Picks the builder for a format.
pub fn builder_for(format: FileFormat, config: BuilderConfig) -> Box<dyn DatasetBuilder> {
    match format {
        FileFormat::Csv => Box::new(CsvBuilder::new(config)),
        FileFormat::Json => Box::new(JsonBuilder::new(config)),
        FileFormat::Parquet => Box::new(ParquetBuilder::new(config)),
    }
}

/// Infers the single format a set of resolved files share. Mixed formats
/// are an error; so is a file with no recognized extension.
pub fn infer_format(files: &[PathBuf]) -> Result<FileFormat, GranaryError> {
    let mut inferred: Option<FileFormat> = None;
    for path in files {
        let Some(format) = FileFormat::from_path(path) else {
            return Err(GranaryError::UnsupportedFormat(format!(
                "'{}' has no recognized tabular extension",
                path.display()
            )));
        };
        match inferred {
            None => inferred = Some(format),
            Some(existing) if existing != format => {
                return Err(GranaryError::UnsupportedFormat(
                    "mixed data file formats in one dataset".to_string(),
                ));
            }
            Some(_) => {}
        }
    }
    inferred.ok_or_else(|| GranaryError::UnsupportedFormat("no data files resolved".to_string()))
}

/// Options for [`load_dataset`].
#[derive(Debug, Default)]
pub struct LoadOptions {
    pub prepare: PrepareOptions,
    /// Force a format instead of inferring from extensions.
    pub format: Option<FileFormat>,
    /// Config to use; `data_dir`/`data_files` are filled in from the source
    /// argument when absent.
    pub config: BuilderConfig,
}

/// One-call entry point: point it at a file or directory, get typed splits
/// back.
pub fn load_dataset(
    source: &str,
    options: LoadOptions,
) -> Result<BTreeMap<Split, Dataset>, GranaryError> {
    let mut config = options.config;

    let source_path = Path::new(source);
    if config.data_files.is_none() && config.data_dir.is_none() {
        if is_remote(source) {
            config.data_files = Some(DataFiles::single(source));
        } else if source_path.is_dir() {
            config.data_dir = Some(source_path.to_path_buf());
        } else if source_path.is_file() {
            config.data_dir = source_path.parent().map(Path::to_path_buf);
            let file_name = source_path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| GranaryError::MissingDataFile {
                    path: source_path.to_path_buf(),
                })?;
            config.data_files = Some(DataFiles::single(file_name));
        } else {
            return Err(GranaryError::MissingDataFile {
                path: source_path.to_path_buf(),
            });
        }
    }

    let format = match options.format {
        Some(format) => format,
        None => infer_load_format(source_path, &config)?,
    };

    let builder = builder_for(format, config);
    let prepared = download_and_prepare(builder.as_ref(), &options.prepare)?;
    prepared.load_all()
}

fn infer_load_format(source: &Path, config: &BuilderConfig) -> Result<FileFormat, GranaryError> {
    if source.is_file() {
        return infer_format(std::slice::from_ref(&source.to_path_buf()));
    }
    // Directory or remote source: resolve what we can see locally.
    if let Some(files) = &config.data_files {
        if let DataFiles::Patterns(patterns) = files {
            let paths: Vec<PathBuf> = patterns.iter().map(PathBuf::from).collect();
            if patterns.iter().all(|pattern| FileFormat::from_path(Path::new(pattern)).is_some()) {
                return infer_format(&paths);
            }
        }
    }
    if let Some(dir) = &config.data_dir {
        for format in [FileFormat::Csv, FileFormat::Json, FileFormat::Parquet] {
            if scan_dir_for(format, dir).is_ok() {
                return Ok(format);
            }
        }
    }
    Err(GranaryError::UnsupportedFormat(
        "could not infer a data format; pass one explicitly".to_string(),
    ))
}
