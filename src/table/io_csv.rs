//! CSV and TSV reader.
//!
//! Headers are required. Schema inference scans the whole file so later rows
//! cannot invalidate an inferred column type; reading then coerces each cell
//! to the (inferred or caller-provided) column type.

use std::path::{Path, PathBuf};

use crate::error::GranaryError;
use crate::table::{DataType, Example, Schema, SchemaBuilder, Value};

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, GranaryError> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .from_path(path)
        .map_err(|source| GranaryError::CsvParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })
}

fn read_headers(
    reader: &mut csv::Reader<std::fs::File>,
    path: &Path,
) -> Result<Vec<String>, GranaryError> {
    let headers = reader
        .headers()
        .map_err(|source| GranaryError::CsvParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut seen = std::collections::HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(GranaryError::DuplicateColumn(header.clone()));
        }
    }
    Ok(headers)
}

/// Classifies a raw CSV cell into the narrowest value that represents it.
pub fn parse_csv_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match cell {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = cell.parse::<f64>() {
        return Value::Float(float);
    }
    Value::Str(cell.to_string())
}

/// Infers the schema by scanning the entire file.
pub fn infer_csv_schema(path: &Path) -> Result<Schema, GranaryError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;

    let mut builder = SchemaBuilder::new();
    for header in &headers {
        builder.observe_value(header, &Value::Null);
    }

    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|source| GranaryError::CsvParse {
            path: path.to_path_buf(),
            message: format!("row {}: {}", index + 1, source),
        })?;
        check_width(path, index + 1, record.len(), headers.len())?;
        for (header, cell) in headers.iter().zip(record.iter()) {
            builder.observe_value(header, &parse_csv_cell(cell));
        }
    }

    Ok(builder.finish())
}

fn check_width(
    path: &Path,
    row: usize,
    found: usize,
    expected: usize,
) -> Result<(), GranaryError> {
    if found != expected {
        return Err(GranaryError::CsvParse {
            path: path.to_path_buf(),
            message: format!("row {row}: expected {expected} field(s), found {found}"),
        });
    }
    Ok(())
}

/// Streaming example reader over one CSV file.
pub struct CsvExamples {
    path: PathBuf,
    headers: Vec<String>,
    schema: Schema,
    records: csv::StringRecordsIntoIter<std::fs::File>,
    row: usize,
}

impl std::fmt::Debug for CsvExamples {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvExamples")
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("schema", &self.schema)
            .field("row", &self.row)
            .finish_non_exhaustive()
    }
}

impl Iterator for CsvExamples {
    type Item = Result<Example, GranaryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(source) => {
                self.row += 1;
                return Some(Err(GranaryError::CsvParse {
                    path: self.path.clone(),
                    message: format!("row {}: {}", self.row, source),
                }));
            }
        };
        self.row += 1;

        if let Err(error) = check_width(&self.path, self.row, record.len(), self.headers.len()) {
            return Some(Err(error));
        }

        let mut example = Example::new();
        for (header, cell) in self.headers.iter().zip(record.iter()) {
            let value = match cell_to_value(header, cell, &self.schema) {
                Ok(value) => value,
                Err(error) => {
                    return Some(Err(GranaryError::CsvParse {
                        path: self.path.clone(),
                        message: format!("row {}: {}", self.row, error),
                    }));
                }
            };
            example.set(header.clone(), value);
        }
        Some(Ok(example))
    }
}

fn cell_to_value(header: &str, cell: &str, schema: &Schema) -> Result<Value, GranaryError> {
    let Some(field) = schema.field(header) else {
        return Err(GranaryError::UnknownColumn(header.to_string()));
    };

    if cell.is_empty() {
        return Ok(Value::Null);
    }

    // String-typed columns keep the raw text so stringified numbers survive
    // verbatim ("1.50" stays "1.50").
    match &field.data_type {
        DataType::Utf8 => Ok(Value::Str(cell.to_string())),
        DataType::ClassLabel { .. } => {
            if let Ok(int) = cell.parse::<i64>() {
                Value::Int(int).coerce_to(header, &field.data_type)
            } else {
                Value::Str(cell.to_string()).coerce_to(header, &field.data_type)
            }
        }
        data_type => parse_csv_cell(cell).coerce_to(header, data_type),
    }
}

/// Opens a CSV file with an explicit schema.
pub fn read_csv_with_schema(path: &Path, schema: Schema) -> Result<CsvExamples, GranaryError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    Ok(CsvExamples {
        path: path.to_path_buf(),
        headers,
        schema,
        records: reader.into_records(),
        row: 0,
    })
}

/// Infers the schema, then opens the file for reading.
pub fn read_csv(path: &Path) -> Result<(Schema, CsvExamples), GranaryError> {
    let schema = infer_csv_schema(path)?;
    let examples = read_csv_with_schema(path, schema.clone())?;
    Ok((schema, examples))
}
