//! Granary: download, verify, and materialize tabular datasets.
//!
//! Granary turns raw tabular files (CSV, JSON Lines, Parquet) into typed,
//! verified Parquet materializations through a builder lifecycle: a
//! [`config::BuilderConfig`] parameterizes a [`builder::DatasetBuilder`],
//! whose three methods describe the dataset (`info`), acquire and split the
//! raw files (`split_generators`), and stream rows (`generate_examples`).
//! The prepare driver checks every download against expected checksums and
//! every generated split against expected sizes, and both checks can be
//! relaxed through [`download::VerificationMode`].
//!
//! # Modules
//!
//! - [`table`]: the typed tabular model and the raw-format readers
//! - [`builder`]: the builder trait, prepare driver, and packaged builders
//! - [`download`]: acquisition, caching, and integrity verification
//! - [`writer`]: the batched Parquet writer
//! - [`error`]: error types for granary operations

pub mod builder;
pub mod card;
pub mod config;
pub mod dataset;
pub mod download;
pub mod error;
#[cfg(feature = "hub")]
pub mod hub;
pub mod info;
pub mod splits;
pub mod table;
pub mod writer;

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use builder::packaged::{builder_for, FileFormat};
use builder::{download_and_prepare, DatasetBuilder, PrepareOptions, PreparedDataset};
use config::{BuilderConfig, DataFiles, Version};
use download::VerificationMode;
use splits::Split;

pub use error::GranaryError;

/// The granary CLI application.
#[derive(Parser)]
#[command(name = "granary")]
#[command(version, author, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Materialize a dataset as verified Parquet splits.
    Prepare(PrepareArgs),
    /// Show the schema, splits, and first rows of a prepared dataset.
    Inspect(InspectArgs),
    /// Re-check a prepared dataset against its recorded metadata.
    Verify(VerifyArgs),
    /// Write a dataset card stub for a prepared dataset.
    Card(CardArgs),
}

/// Arguments for the prepare subcommand.
#[derive(clap::Args)]
struct PrepareArgs {
    /// Data file, data directory, or (with the 'hub' feature) a hub repo
    /// id or dataset URL.
    input: String,

    /// Config name for the cache layout.
    #[arg(long, default_value = "default")]
    name: String,

    /// Dataset version ('major.minor.patch').
    #[arg(long, default_value = "1.0.0")]
    version: String,

    /// Input format ('csv', 'json', or 'parquet'); inferred from file
    /// extensions when omitted.
    #[arg(long)]
    format: Option<String>,

    /// Per-split data file pattern, repeatable (e.g. 'train=data/tr-*.csv').
    #[arg(long = "split", value_name = "NAME=PATTERN")]
    splits: Vec<String>,

    /// Cache root (defaults to $GRANARY_HOME, then ~/.cache/granary).
    #[arg(long, env = "GRANARY_HOME")]
    cache_dir: Option<PathBuf>,

    /// Materialize into this directory instead of the cache layout.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Integrity checking: 'all', 'basic', or 'none'.
    #[arg(long, default_value = "all")]
    verification: String,

    /// Rows buffered per written record batch.
    #[arg(long, default_value_t = writer::DEFAULT_WRITER_BATCH_SIZE)]
    batch_size: usize,

    /// Regenerate even when the dataset is already prepared.
    #[arg(long)]
    force: bool,

    /// Bearer token for authorized downloads.
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    /// Prepared dataset directory.
    dir: PathBuf,

    /// Split to sample rows from (defaults to 'train', then the first).
    #[arg(long)]
    split: Option<String>,

    /// Number of rows to show.
    #[arg(long, default_value_t = 5)]
    rows: usize,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the verify subcommand.
#[derive(clap::Args)]
struct VerifyArgs {
    /// Prepared dataset directory.
    dir: PathBuf,
}

/// Arguments for the card subcommand.
#[derive(clap::Args)]
struct CardArgs {
    /// Prepared dataset directory.
    dir: PathBuf,

    /// Display name for the card front matter.
    #[arg(long)]
    pretty_name: Option<String>,

    /// License identifier for the card front matter.
    #[arg(long)]
    license: Option<String>,
}

/// Run the granary CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), GranaryError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Prepare(args)) => run_prepare(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Verify(args)) => run_verify(args),
        Some(Commands::Card(args)) => run_card(args),
        None => {
            // No subcommand: just print help hint and exit successfully
            println!("granary {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Download, verify, and materialize tabular datasets.");
            println!();
            println!("Run 'granary --help' for usage information.");
            Ok(())
        }
    }
}

fn parse_split_overrides(overrides: &[String]) -> Result<Option<DataFiles>, GranaryError> {
    if overrides.is_empty() {
        return Ok(None);
    }
    let mut per_split: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in overrides {
        let Some((split, pattern)) = entry.split_once('=') else {
            return Err(GranaryError::InvalidConfig {
                message: format!("--split '{entry}' is not in NAME=PATTERN form"),
            });
        };
        per_split
            .entry(split.trim().to_string())
            .or_default()
            .push(pattern.trim().to_string());
    }
    Ok(Some(DataFiles::PerSplit(per_split)))
}

/// Builds the right dataset builder for a prepare invocation.
fn builder_for_input(
    input: &str,
    config: BuilderConfig,
    format: Option<FileFormat>,
) -> Result<Box<dyn DatasetBuilder>, GranaryError> {
    let path = std::path::Path::new(input);

    if path.exists() || download::is_remote(input) {
        let mut config = config;
        if config.data_files.is_none() {
            if download::is_remote(input) {
                config.data_files = Some(DataFiles::single(input));
            } else if path.is_dir() {
                config.data_dir = Some(path.to_path_buf());
            } else {
                config.data_dir = path.parent().map(std::path::Path::to_path_buf);
                config.data_files = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(DataFiles::single);
            }
        } else if config.data_dir.is_none() && path.is_dir() {
            config.data_dir = Some(path.to_path_buf());
        }

        let format = match format {
            Some(format) => format,
            None if path.is_file() => builder::packaged::infer_format(std::slice::from_ref(
                &path.to_path_buf(),
            ))?,
            None if download::is_remote(input) => builder::packaged::infer_format(
                std::slice::from_ref(&PathBuf::from(input)),
            )?,
            None => infer_dir_format(&config)?,
        };
        return Ok(builder_for(format, config));
    }

    hub_builder_for(input, config)
}

#[cfg(feature = "hub")]
fn hub_builder_for(
    input: &str,
    config: BuilderConfig,
) -> Result<Box<dyn DatasetBuilder>, GranaryError> {
    let repo = hub::parse_hub_input(input, None, None, None)?;
    Ok(Box::new(hub::HubBuilder::new(repo, config)))
}

#[cfg(not(feature = "hub"))]
fn hub_builder_for(
    input: &str,
    _config: BuilderConfig,
) -> Result<Box<dyn DatasetBuilder>, GranaryError> {
    Err(GranaryError::MissingDataFile {
        path: PathBuf::from(input),
    })
}

fn infer_dir_format(config: &BuilderConfig) -> Result<FileFormat, GranaryError> {
    if let Some(DataFiles::PerSplit(map)) = &config.data_files {
        let patterns: Vec<PathBuf> = map
            .values()
            .flatten()
            .map(PathBuf::from)
            .collect();
        if !patterns.is_empty() {
            return builder::packaged::infer_format(&patterns);
        }
    }
    let base_dir = config.base_dir();
    for format in [FileFormat::Csv, FileFormat::Json, FileFormat::Parquet] {
        let found = walkdir::WalkDir::new(&base_dir)
            .into_iter()
            .filter_map(Result::ok)
            .any(|entry| {
                entry.file_type().is_file()
                    && FileFormat::from_path(entry.path()) == Some(format)
            });
        if found {
            return Ok(format);
        }
    }
    Err(GranaryError::UnsupportedFormat(
        "could not infer a data format; pass --format".to_string(),
    ))
}

/// Execute the prepare subcommand.
fn run_prepare(args: PrepareArgs) -> Result<(), GranaryError> {
    let version: Version = args.version.parse()?;
    let format = args
        .format
        .as_deref()
        .map(str::parse::<FileFormat>)
        .transpose()?;

    let config = BuilderConfig {
        name: args.name.clone(),
        version,
        data_dir: None,
        data_files: parse_split_overrides(&args.splits)?,
        description: None,
    };

    let options = PrepareOptions {
        cache_dir: args
            .cache_dir
            .unwrap_or_else(download::default_cache_dir),
        output_dir: args.output_dir,
        verification: args.verification.parse::<VerificationMode>()?,
        writer_batch_size: args.batch_size,
        force_prepare: args.force,
        force_download: args.force,
        token: args.token,
    };

    let dataset_builder = builder_for_input(&args.input, config, format)?;
    let prepared = download_and_prepare(dataset_builder.as_ref(), &options)?;

    println!("Prepared dataset at {}", prepared.dir.display());
    print_split_table(&prepared);
    Ok(())
}

fn print_split_table(prepared: &PreparedDataset) {
    println!("{:<16} {:>12} {:>14}", "split", "examples", "bytes");
    for (split, info) in &prepared.info.splits {
        println!(
            "{:<16} {:>12} {:>14}",
            split, info.num_examples, info.num_bytes
        );
    }
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), GranaryError> {
    let prepared = PreparedDataset::open(&args.dir)?;

    let split = match args.split {
        Some(name) => Split::normalize(&name),
        None => {
            if prepared.info.splits.contains_key(Split::TRAIN) {
                Split::train()
            } else {
                prepared
                    .splits()
                    .into_iter()
                    .next()
                    .ok_or_else(|| GranaryError::MissingSplit {
                        dir: prepared.dir.clone(),
                        split: Split::TRAIN.to_string(),
                    })?
            }
        }
    };

    let mut rows = Vec::new();
    for shard in prepared.split_files(&split)? {
        for example in table::io_parquet::read_parquet_examples(&shard)? {
            if rows.len() >= args.rows {
                break;
            }
            rows.push(example?);
        }
        if rows.len() >= args.rows {
            break;
        }
    }

    match args.output.as_str() {
        "json" => {
            let report = serde_json::json!({
                "config_name": prepared.info.config_name,
                "version": prepared.info.version.to_string(),
                "features": prepared.info.features,
                "splits": prepared.info.splits,
                "rows": rows.iter().map(table::Example::to_json).collect::<Vec<_>>(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).map_err(|source| {
                    GranaryError::InfoJsonWrite {
                        path: prepared.dir.clone(),
                        source,
                    }
                })?
            );
        }
        _ => {
            println!(
                "{} (config '{}', version {})",
                prepared.info.builder_name, prepared.info.config_name, prepared.info.version
            );
            if let Some(features) = &prepared.info.features {
                println!("columns:");
                for field in &features.fields {
                    println!("  {:<20} {:?}", field.name, field.data_type);
                }
            }
            print_split_table(&prepared);
            println!();
            println!("first {} row(s) of '{}':", rows.len(), split);
            for row in &rows {
                println!("  {}", row.to_json());
            }
        }
    }
    Ok(())
}

/// Execute the verify subcommand.
fn run_verify(args: VerifyArgs) -> Result<(), GranaryError> {
    let prepared = PreparedDataset::open(&args.dir)?;

    let mut failures = Vec::new();
    for (split_name, expected) in &prepared.info.splits {
        let split = Split::new(split_name.clone());
        let shards = match prepared.split_files(&split) {
            Ok(shards) => shards,
            Err(_) => {
                failures.push(format!("  {split_name}: split files are missing"));
                continue;
            }
        };

        let mut num_examples = 0u64;
        let mut num_bytes = 0u64;
        let mut unreadable = false;
        for shard in &shards {
            match table::io_parquet::parquet_row_count(shard) {
                Ok(count) => num_examples += count,
                Err(error) => {
                    failures.push(format!(
                        "  {split_name}: unreadable shard {}: {error}",
                        shard.display()
                    ));
                    unreadable = true;
                }
            }
            num_bytes += std::fs::metadata(shard).map_err(GranaryError::Io)?.len();
        }
        if unreadable {
            continue;
        }

        if num_examples != expected.num_examples {
            failures.push(format!(
                "  {split_name}: example count mismatch (recorded {}, found {})",
                expected.num_examples, num_examples
            ));
        }
        if num_bytes != expected.num_bytes {
            failures.push(format!(
                "  {split_name}: size mismatch (recorded {} byte(s), found {})",
                expected.num_bytes, num_bytes
            ));
        }
    }

    if failures.is_empty() {
        println!(
            "Verification passed: {} split(s) match their recorded metadata.",
            prepared.info.splits.len()
        );
        Ok(())
    } else {
        Err(GranaryError::SplitsMismatch { failures })
    }
}

/// Execute the card subcommand.
fn run_card(args: CardArgs) -> Result<(), GranaryError> {
    let prepared = PreparedDataset::open(&args.dir)?;

    let total_examples: u64 = prepared
        .info
        .splits
        .values()
        .map(|split| split.num_examples)
        .sum();

    let pretty_name = args
        .pretty_name
        .unwrap_or_else(|| prepared.info.config_name.clone());
    let metadata = card::CardMetadata {
        pretty_name: Some(pretty_name.clone()),
        license: args.license.or_else(|| prepared.info.license.clone()),
        size_categories: vec![card::size_category_for(total_examples).to_string()],
        ..card::CardMetadata::default()
    };

    let mut content = format!("# {pretty_name}\n");
    if let Some(description) = &prepared.info.description {
        content.push_str("\n");
        content.push_str(description);
        content.push('\n');
    }

    let dataset_card = card::DatasetCard { metadata, content };
    for warning in dataset_card.validate() {
        eprintln!("Warning: {warning}");
    }

    let path = prepared.dir.join("README.md");
    std::fs::write(&path, dataset_card.render()?).map_err(GranaryError::Io)?;
    println!("Wrote dataset card to {}", path.display());
    Ok(())
}
