//! Tabular data model and format readers.
//!
//! This module defines the canonical representation of tabular data
//! ([`Schema`], [`Example`], [`Value`]) plus one reader module per raw
//! format. All readers produce the same shape: a schema and a fallible
//! iterator of examples, which the prepare driver streams into the columnar
//! writer.

pub mod io_csv;
pub mod io_jsonl;
pub mod io_parquet;
mod model;

pub use model::{
    class_label_index, unify_types, DataType, Example, Field, Schema, SchemaBuilder, Value,
};

use crate::error::GranaryError;

/// A fallible stream of examples, as produced by the format readers and
/// consumed by the prepare driver.
pub type ExampleStream = Box<dyn Iterator<Item = Result<Example, GranaryError>>>;
