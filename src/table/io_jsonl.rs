//! JSON Lines and JSON-array reader.
//!
//! `.jsonl` / `.ndjson` files are read line by line (blank lines skipped);
//! `.json` files must hold a top-level array of objects. Every row must be a
//! JSON object with scalar values.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::GranaryError;
use crate::table::{Example, Schema, SchemaBuilder};

fn is_array_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn parse_object_row(
    path: &Path,
    line: usize,
    value: &serde_json::Value,
) -> Result<Example, GranaryError> {
    let object = value.as_object().ok_or_else(|| GranaryError::JsonlParse {
        path: path.to_path_buf(),
        line,
        message: "expected a JSON object row".to_string(),
    })?;
    Example::from_json_object(object)
}

/// Streaming example reader over one JSONL or JSON-array file.
pub enum JsonExamples {
    Lines {
        path: PathBuf,
        lines: std::io::Lines<BufReader<File>>,
        line: usize,
    },
    Array(std::vec::IntoIter<Example>),
}

impl Iterator for JsonExamples {
    type Item = Result<Example, GranaryError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            JsonExamples::Array(examples) => examples.next().map(Ok),
            JsonExamples::Lines { path, lines, line } => loop {
                let text = match lines.next()? {
                    Ok(text) => text,
                    Err(source) => return Some(Err(GranaryError::Io(source))),
                };
                *line += 1;
                if text.trim().is_empty() {
                    continue;
                }
                let parsed: serde_json::Value = match serde_json::from_str(&text) {
                    Ok(parsed) => parsed,
                    Err(source) => {
                        return Some(Err(GranaryError::JsonlParse {
                            path: path.clone(),
                            line: *line,
                            message: source.to_string(),
                        }));
                    }
                };
                return Some(parse_object_row(path, *line, &parsed));
            },
        }
    }
}

fn read_array_file(path: &Path) -> Result<Vec<Example>, GranaryError> {
    let file = File::open(path).map_err(GranaryError::Io)?;
    let reader = BufReader::new(file);
    let value: serde_json::Value =
        serde_json::from_reader(reader).map_err(|source| GranaryError::JsonlParse {
            path: path.to_path_buf(),
            line: 1,
            message: source.to_string(),
        })?;

    let rows = value.as_array().ok_or_else(|| GranaryError::JsonlParse {
        path: path.to_path_buf(),
        line: 1,
        message: "expected a top-level JSON array of objects".to_string(),
    })?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| parse_object_row(path, index + 1, row))
        .collect()
}

/// Opens a JSON/JSONL file for streaming reads.
pub fn read_json_examples(path: &Path) -> Result<JsonExamples, GranaryError> {
    if is_array_file(path) {
        return Ok(JsonExamples::Array(read_array_file(path)?.into_iter()));
    }
    let file = File::open(path).map_err(GranaryError::Io)?;
    Ok(JsonExamples::Lines {
        path: path.to_path_buf(),
        lines: BufReader::new(file).lines(),
        line: 0,
    })
}

/// Infers the schema by scanning the entire file.
pub fn infer_json_schema(path: &Path) -> Result<Schema, GranaryError> {
    let mut builder = SchemaBuilder::new();
    for example in read_json_examples(path)? {
        builder.observe(&example?);
    }
    Ok(builder.finish())
}

/// Infers the schema, then opens the file for reading.
pub fn read_json(path: &Path) -> Result<(Schema, JsonExamples), GranaryError> {
    let schema = infer_json_schema(path)?;
    let examples = read_json_examples(path)?;
    Ok((schema, examples))
}
