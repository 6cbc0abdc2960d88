use std::path::PathBuf;
use thiserror::Error;

/// The main error type for granary operations.
#[derive(Debug, Error)]
pub enum GranaryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse dataset info from {path}: {source}")]
    InfoJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write dataset info to {path}: {source}")]
    InfoJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse CSV from {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    #[error("Failed to parse {path} line {line}: {message}")]
    JsonlParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Failed to read Parquet from {path}: {message}")]
    ParquetParse { path: PathBuf, message: String },

    #[error("Failed to write Parquet to {path}: {message}")]
    ParquetWrite { path: PathBuf, message: String },

    #[error("Type mismatch in column '{column}': {message}")]
    TypeMismatch { column: String, message: String },

    #[error("Unsupported value in column '{column}': {message}")]
    UnsupportedValue { column: String, message: String },

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Column '{0}' is not part of the schema")]
    UnknownColumn(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Data file pattern '{pattern}' matched no files")]
    EmptyPattern { pattern: String },

    #[error("Data file not found: {path}")]
    MissingDataFile { path: PathBuf },

    #[error("Invalid builder config: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid version string '{input}' (expected 'major.minor.patch')")]
    InvalidVersion { input: String },

    #[error(
        "Checksum verification failed for {} file(s):\n{}\nPass --verification none to bypass integrity checks.",
        failures.len(),
        failures.join("\n")
    )]
    ChecksumMismatch { failures: Vec<String> },

    #[error(
        "Generated splits do not match expected splits:\n{}\nPass --verification none to bypass integrity checks.",
        failures.join("\n")
    )]
    SplitsMismatch { failures: Vec<String> },

    #[error("Failed to download '{source_url}': {message}")]
    DownloadFailed { source_url: String, message: String },

    #[error("Cannot fetch remote source '{url}': granary was built without the 'hub' feature")]
    RemoteDisabled { url: String },

    #[error("Failed to extract archive {path}: {message}")]
    ExtractFailed { path: PathBuf, message: String },

    #[error("Prepared dataset at {dir} has no split '{split}'")]
    MissingSplit { dir: PathBuf, split: String },

    #[error("Invalid split parameters: {message}")]
    InvalidSplitParams { message: String },

    #[error("Row index {index} out of range for dataset of {len} row(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Failed to parse dataset card: {message}")]
    CardParse { message: String },

    #[cfg(feature = "hub")]
    #[error("Failed to resolve hub reference '{input}': {message}")]
    HubResolve { input: String, message: String },

    #[cfg(feature = "hub")]
    #[error("Hub API error for '{repo_id}': {message}")]
    HubApi { repo_id: String, message: String },

    #[cfg(feature = "hub")]
    #[error("Failed to acquire dataset '{repo_id}': {message}")]
    HubAcquire { repo_id: String, message: String },
}

impl GranaryError {
    /// True when the error is an integrity-verification failure that can be
    /// bypassed by lowering the verification mode.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            GranaryError::ChecksumMismatch { .. } | GranaryError::SplitsMismatch { .. }
        )
    }
}
