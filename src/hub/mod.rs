//! Hugging Face Hub acquisition.
//!
//! This module owns remote-specific concerns (repo resolution and
//! acquisition). Pure file parsing stays in `crate::table::io_*`.

pub mod acquire;
pub mod resolve;

pub use acquire::HubBuilder;
pub use resolve::parse_hub_input;

/// Canonical reference to a hub dataset repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubRepoRef {
    pub repo_id: String,
    pub revision: Option<String>,
    pub config: Option<String>,
    pub split: Option<String>,
}
