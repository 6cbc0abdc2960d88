use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};

use crate::builder::packaged::{infer_format, stream_files, FileFormat};
use crate::builder::DatasetBuilder;
use crate::config::BuilderConfig;
use crate::download::DownloadManager;
use crate::error::GranaryError;
use crate::info::DatasetInfo;
use crate::splits::{infer_split_from_path, Split, SplitGenerator};
use crate::table::{ExampleStream, Schema};

use super::HubRepoRef;

/// Picks the tabular data files of a repository, grouped by split.
///
/// Only one raw format is ever selected; when a repository carries several,
/// Parquet wins over CSV, which wins over JSON. Files whose path encodes no
/// split fall into `train`.
pub fn select_data_files(
    paths: &[String],
    requested_split: Option<&str>,
) -> Result<BTreeMap<Split, Vec<String>>, GranaryError> {
    let tabular: Vec<(&String, FileFormat)> = paths
        .iter()
        .filter_map(|path| FileFormat::from_path(Path::new(path)).map(|format| (path, format)))
        .collect();

    let chosen_format = [FileFormat::Parquet, FileFormat::Csv, FileFormat::Json]
        .into_iter()
        .find(|format| tabular.iter().any(|(_, found)| found == format))
        .ok_or_else(|| {
            GranaryError::UnsupportedFormat(
                "repository contains no tabular data files (csv, json, or parquet)".to_string(),
            )
        })?;

    let mut per_split: BTreeMap<Split, Vec<String>> = BTreeMap::new();
    for (path, format) in tabular {
        if format != chosen_format {
            continue;
        }
        let split = infer_split_from_path(Path::new(path)).unwrap_or_else(Split::train);
        per_split.entry(split).or_default().push(path.clone());
    }

    if let Some(requested) = requested_split {
        let normalized = Split::normalize(requested);
        per_split.retain(|split, _| *split == normalized);
        if per_split.is_empty() {
            return Err(GranaryError::UnsupportedFormat(format!(
                "repository has no data files for split '{requested}'"
            )));
        }
    }

    for files in per_split.values_mut() {
        files.sort();
    }
    Ok(per_split)
}

/// Downloads the selected data files of a repository, recording a checksum
/// for each under its `<repo_id>/<path>` key.
pub fn acquire(
    repo_ref: &HubRepoRef,
    dl: &mut DownloadManager,
) -> Result<Vec<SplitGenerator>, GranaryError> {
    let mut builder = ApiBuilder::new().with_progress(false);

    let token_from_env = std::env::var("HF_TOKEN").ok();
    let effective_token = dl.token().map(str::to_string).or(token_from_env);
    if effective_token.is_some() {
        builder = builder.with_token(effective_token);
    }

    let api = builder.build().map_err(|source| GranaryError::HubApi {
        repo_id: repo_ref.repo_id.clone(),
        message: source.to_string(),
    })?;

    let repo = if let Some(revision) = repo_ref.revision.as_ref() {
        api.repo(Repo::with_revision(
            repo_ref.repo_id.clone(),
            RepoType::Dataset,
            revision.clone(),
        ))
    } else {
        api.dataset(repo_ref.repo_id.clone())
    };

    let repo_info = repo.info().map_err(|source| GranaryError::HubApi {
        repo_id: repo_ref.repo_id.clone(),
        message: source.to_string(),
    })?;

    let sibling_paths: Vec<String> = repo_info
        .siblings
        .iter()
        .map(|sibling| sibling.rfilename.clone())
        .collect();

    let selected = select_data_files(&sibling_paths, repo_ref.split.as_deref())?;

    let mut generators = Vec::new();
    for (split, remote_paths) in selected {
        let mut files = Vec::with_capacity(remote_paths.len());
        for remote_path in remote_paths {
            let local =
                repo.download(&remote_path)
                    .map_err(|source| GranaryError::HubAcquire {
                        repo_id: repo_ref.repo_id.clone(),
                        message: format!("failed downloading '{}': {}", remote_path, source),
                    })?;
            dl.record_source(&format!("{}/{}", repo_ref.repo_id, remote_path), &local)?;
            files.push(local);
        }
        generators.push(SplitGenerator::new(split, files));
    }
    Ok(generators)
}

/// A dataset builder over a hub repository.
pub struct HubBuilder {
    config: BuilderConfig,
    repo: HubRepoRef,
}

impl HubBuilder {
    pub fn new(repo: HubRepoRef, mut config: BuilderConfig) -> Self {
        if config.name == "default" {
            if let Some(repo_config) = repo.config.as_deref() {
                config.name = repo_config.to_string();
            }
        }
        Self { config, repo }
    }

    pub fn repo(&self) -> &HubRepoRef {
        &self.repo
    }
}

impl DatasetBuilder for HubBuilder {
    fn builder_name(&self) -> &'static str {
        "hub"
    }

    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn info(&self) -> DatasetInfo {
        DatasetInfo {
            description: self.config.description.clone(),
            homepage: Some(format!(
                "https://huggingface.co/datasets/{}",
                self.repo.repo_id
            )),
            config_name: self.config.name.clone(),
            version: self.config.version.clone(),
            ..DatasetInfo::default()
        }
    }

    fn split_generators(
        &self,
        dl: &mut DownloadManager,
    ) -> Result<Vec<SplitGenerator>, GranaryError> {
        acquire(&self.repo, dl)
    }

    fn generate_examples(
        &self,
        files: &[PathBuf],
        features: Option<&Schema>,
    ) -> Result<ExampleStream, GranaryError> {
        let format = infer_format(files)?;
        stream_files(format, files, features)
    }
}
