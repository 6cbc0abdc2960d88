//! Download orchestration: acquisition, checksum recording, and archive
//! extraction.
//!
//! Every file that passes through the manager gets a size/crc32c record
//! keyed by its original source string; the prepare driver verifies those
//! records against expectations and persists them into the dataset info.

pub mod cache;
pub mod verify;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::GranaryError;
use crate::info::FileChecksum;

pub use cache::default_cache_dir;
pub use verify::{verify_checksums, verify_splits, VerificationMode};

/// Options controlling acquisition.
#[derive(Clone, Debug)]
pub struct DownloadConfig {
    pub cache_dir: PathBuf,
    /// Re-fetch remote files even when a cached copy exists.
    pub force_download: bool,
    /// Bearer token for authorized downloads.
    pub token: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            cache_dir: cache::default_cache_dir(),
            force_download: false,
            token: None,
        }
    }
}

/// Computes the size and streaming crc32c of a file.
pub fn file_checksum(path: &Path) -> Result<FileChecksum, GranaryError> {
    let mut file = File::open(path).map_err(GranaryError::Io)?;
    let mut buffer = [0u8; 64 * 1024];
    let mut crc = 0u32;
    let mut num_bytes = 0u64;

    loop {
        let read = file.read(&mut buffer).map_err(GranaryError::Io)?;
        if read == 0 {
            break;
        }
        crc = crc32c::crc32c_append(crc, &buffer[..read]);
        num_bytes += read as u64;
    }

    Ok(FileChecksum {
        num_bytes,
        checksum: Some(format!("{crc:08x}")),
    })
}

/// True for sources the manager must fetch over the network.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Acquires raw data files and records their checksums.
pub struct DownloadManager {
    config: DownloadConfig,
    recorded: BTreeMap<String, FileChecksum>,
}

impl DownloadManager {
    pub fn new(config: DownloadConfig) -> Self {
        Self {
            config,
            recorded: BTreeMap::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    pub fn token(&self) -> Option<&str> {
        self.config.token.as_deref()
    }

    /// Size/checksum records for everything downloaded so far, keyed by the
    /// original source string.
    pub fn recorded_checksums(&self) -> &BTreeMap<String, FileChecksum> {
        &self.recorded
    }

    /// Total bytes acquired so far.
    pub fn download_size(&self) -> u64 {
        self.recorded.values().map(|record| record.num_bytes).sum()
    }

    /// Fetches one source. Local paths are used in place; remote URLs land
    /// in the download cache. Either way the file's checksum is recorded.
    pub fn download(&mut self, source: &str) -> Result<PathBuf, GranaryError> {
        let path = if is_remote(source) {
            self.fetch_remote(source)?
        } else {
            let path = PathBuf::from(source);
            if !path.is_file() {
                return Err(GranaryError::MissingDataFile { path });
            }
            path
        };
        self.record(source, &path)?;
        Ok(path)
    }

    /// Fetches a source and, when it is a zip archive, extracts it; returns
    /// the extraction directory (or the file itself for non-archives).
    pub fn download_and_extract(&mut self, source: &str) -> Result<PathBuf, GranaryError> {
        let path = self.download(source)?;
        self.extract(&path)
    }

    /// Records an already-local file under an explicit source key, so
    /// acquisition layers with their own transfer mechanism still feed
    /// verification.
    pub fn record_source(&mut self, source: &str, path: &Path) -> Result<(), GranaryError> {
        if !path.is_file() {
            return Err(GranaryError::MissingDataFile {
                path: path.to_path_buf(),
            });
        }
        self.record(source, path)
    }

    /// Records a local file the builder resolved on its own, so it still
    /// participates in verification.
    pub fn record_local(&mut self, path: &Path) -> Result<PathBuf, GranaryError> {
        if !path.is_file() {
            return Err(GranaryError::MissingDataFile {
                path: path.to_path_buf(),
            });
        }
        self.record(&path.to_string_lossy(), path)?;
        Ok(path.to_path_buf())
    }

    fn record(&mut self, source: &str, path: &Path) -> Result<(), GranaryError> {
        let record = file_checksum(path)?;
        self.recorded.insert(source.to_string(), record);
        Ok(())
    }

    /// Unpacks a `.zip` archive into a sibling `-extracted` directory.
    /// Non-archives pass through unchanged.
    pub fn extract(&mut self, path: &Path) -> Result<PathBuf, GranaryError> {
        let is_zip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if !is_zip {
            return Ok(path.to_path_buf());
        }

        let target = extraction_dir(path);
        if target.is_dir() && !self.config.force_download {
            return Ok(target);
        }
        fs::create_dir_all(&target).map_err(GranaryError::Io)?;

        let file = File::open(path).map_err(GranaryError::Io)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|source| GranaryError::ExtractFailed {
                path: path.to_path_buf(),
                message: source.to_string(),
            })?;

        for index in 0..archive.len() {
            let mut entry =
                archive
                    .by_index(index)
                    .map_err(|source| GranaryError::ExtractFailed {
                        path: path.to_path_buf(),
                        message: source.to_string(),
                    })?;

            // Entries that escape the target directory are hostile.
            let Some(relative) = entry.enclosed_name() else {
                return Err(GranaryError::ExtractFailed {
                    path: path.to_path_buf(),
                    message: format!("archive entry '{}' escapes the target directory", entry.name()),
                });
            };
            let destination = target.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&destination).map_err(GranaryError::Io)?;
                continue;
            }
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(GranaryError::Io)?;
            }
            let mut output = File::create(&destination).map_err(GranaryError::Io)?;
            std::io::copy(&mut entry, &mut output).map_err(GranaryError::Io)?;
        }

        Ok(target)
    }

    #[cfg(feature = "hub")]
    fn fetch_remote(&mut self, url: &str) -> Result<PathBuf, GranaryError> {
        use std::io::Write;
        use std::time::Duration;

        let downloads = cache::downloads_dir(&self.config.cache_dir);
        fs::create_dir_all(&downloads).map_err(GranaryError::Io)?;
        let target = downloads.join(cache::url_cache_name(url));

        if target.is_file() && !self.config.force_download {
            return Ok(target);
        }

        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(60)))
            .build();
        let agent: ureq::Agent = agent_config.into();

        let mut request = agent.get(url);
        if let Some(token) = self.config.token.as_deref() {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }

        let mut response = request
            .call()
            .map_err(|source| GranaryError::DownloadFailed {
                source_url: url.to_string(),
                message: source.to_string(),
            })?;

        // Stage into a temp name so an interrupted fetch never looks cached.
        let staging = target.with_extension("incomplete");
        {
            let mut output = File::create(&staging).map_err(GranaryError::Io)?;
            let mut reader = response.body_mut().as_reader();
            std::io::copy(&mut reader, &mut output).map_err(GranaryError::Io)?;
            output.flush().map_err(GranaryError::Io)?;
        }
        fs::rename(&staging, &target).map_err(GranaryError::Io)?;

        Ok(target)
    }

    #[cfg(not(feature = "hub"))]
    fn fetch_remote(&mut self, url: &str) -> Result<PathBuf, GranaryError> {
        Err(GranaryError::RemoteDisabled {
            url: url.to_string(),
        })
    }
}

fn extraction_dir(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("archive");
    path.with_file_name(format!("{stem}-extracted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn manager_in(dir: &Path) -> DownloadManager {
        DownloadManager::new(DownloadConfig {
            cache_dir: dir.to_path_buf(),
            force_download: false,
            token: None,
        })
    }

    #[test]
    fn local_downloads_record_checksums() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rows.csv");
        fs::write(&path, "a,b\n1,2\n").expect("write");

        let mut manager = manager_in(dir.path());
        let resolved = manager.download(path.to_str().unwrap()).expect("download");
        assert_eq!(resolved, path);

        let records = manager.recorded_checksums();
        assert_eq!(records.len(), 1);
        let record = records.values().next().unwrap();
        assert_eq!(record.num_bytes, 8);
        assert!(record.checksum.is_some());
        assert_eq!(manager.download_size(), 8);
    }

    #[test]
    fn checksums_are_content_addressed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let c = dir.path().join("c.bin");
        fs::write(&a, b"same").expect("write");
        fs::write(&b, b"same").expect("write");
        fs::write(&c, b"diff").expect("write");

        let sum_a = file_checksum(&a).expect("a");
        let sum_b = file_checksum(&b).expect("b");
        let sum_c = file_checksum(&c).expect("c");
        assert_eq!(sum_a.checksum, sum_b.checksum);
        assert_ne!(sum_a.checksum, sum_c.checksum);
    }

    #[test]
    fn missing_local_files_are_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut manager = manager_in(dir.path());
        let err = manager
            .download(dir.path().join("absent.csv").to_str().unwrap())
            .expect_err("missing");
        assert!(matches!(err, GranaryError::MissingDataFile { .. }));
    }

    #[test]
    fn zip_archives_extract_next_to_themselves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("bundle.zip");

        let file = File::create(&archive_path).expect("create");
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("inner/rows.csv", options).expect("entry");
        writer.write_all(b"a\n1\n").expect("payload");
        writer.finish().expect("finish");

        let mut manager = manager_in(dir.path());
        let extracted = manager
            .download_and_extract(archive_path.to_str().unwrap())
            .expect("extract");

        assert!(extracted.ends_with("bundle-extracted"));
        let inner = extracted.join("inner").join("rows.csv");
        assert_eq!(fs::read_to_string(inner).expect("read"), "a\n1\n");
    }

    #[test]
    fn non_archives_pass_through_extract() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rows.csv");
        fs::write(&path, "a\n1\n").expect("write");

        let mut manager = manager_in(dir.path());
        let resolved = manager
            .download_and_extract(path.to_str().unwrap())
            .expect("passthrough");
        assert_eq!(resolved, path);
    }
}
