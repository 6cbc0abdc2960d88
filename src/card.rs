//! Dataset cards: a `README.md` with a YAML front matter block.

use serde::{Deserialize, Serialize};

use crate::error::GranaryError;

/// Front matter metadata of a dataset card.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CardMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub size_categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A dataset card: front matter plus markdown body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetCard {
    pub metadata: CardMetadata,
    pub content: String,
}

/// Licenses commonly accepted in dataset card metadata.
pub const VALID_LICENSES: &[&str] = &[
    "apache-2.0",
    "mit",
    "bsd-3-clause",
    "cc0-1.0",
    "cc-by-4.0",
    "cc-by-sa-4.0",
    "cc-by-nc-4.0",
    "odc-by",
    "gpl-3.0",
    "unlicense",
    "other",
];

/// Size buckets used in card metadata.
pub const VALID_SIZE_CATEGORIES: &[&str] = &[
    "n<1K",
    "1K<n<10K",
    "10K<n<100K",
    "100K<n<1M",
    "1M<n<10M",
    "10M<n<100M",
    "100M<n<1B",
    "n>1B",
];

/// Maps an example count onto its size-category bucket.
pub fn size_category_for(num_examples: u64) -> &'static str {
    const BUCKETS: &[(u64, &str)] = &[
        (1_000, "n<1K"),
        (10_000, "1K<n<10K"),
        (100_000, "10K<n<100K"),
        (1_000_000, "100K<n<1M"),
        (10_000_000, "1M<n<10M"),
        (100_000_000, "10M<n<100M"),
        (1_000_000_000, "100M<n<1B"),
    ];
    for (limit, category) in BUCKETS {
        if num_examples < *limit {
            return category;
        }
    }
    "n>1B"
}

impl DatasetCard {
    /// Parses a card out of README text. Text without a front matter block
    /// becomes a card with empty metadata.
    pub fn parse(text: &str) -> Result<Self, GranaryError> {
        let Some(rest) = text.strip_prefix("---\n") else {
            return Ok(DatasetCard {
                metadata: CardMetadata::default(),
                content: text.to_string(),
            });
        };

        let Some((front_matter, content)) = rest.split_once("\n---\n") else {
            return Err(GranaryError::CardParse {
                message: "unterminated front matter block (missing closing '---')".to_string(),
            });
        };

        let metadata =
            serde_yaml::from_str(front_matter).map_err(|source| GranaryError::CardParse {
                message: source.to_string(),
            })?;

        Ok(DatasetCard {
            metadata,
            content: content.trim_start_matches('\n').to_string(),
        })
    }

    /// Renders the card back to README text.
    pub fn render(&self) -> Result<String, GranaryError> {
        let front_matter =
            serde_yaml::to_string(&self.metadata).map_err(|source| GranaryError::CardParse {
                message: source.to_string(),
            })?;
        Ok(format!("---\n{front_matter}---\n\n{}", self.content))
    }

    /// Checks metadata values against the known vocabularies. Returns
    /// warnings rather than failing: cards evolve faster than validators.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(license) = self.metadata.license.as_deref() {
            if !VALID_LICENSES.contains(&license) {
                warnings.push(format!("unknown license '{license}'"));
            }
        }
        for category in &self.metadata.size_categories {
            if !VALID_SIZE_CATEGORIES.contains(&category.as_str()) {
                warnings.push(format!("unknown size category '{category}'"));
            }
        }
        warnings
    }
}
