//! Parquet reader.
//!
//! Rows are decoded through `parquet`'s serialized row iterator and
//! converted to JSON values, then normalized through the same row
//! conversion the JSON path uses. Nested Parquet groups are therefore
//! rejected the same way nested JSON is.

use std::fs::File;
use std::path::{Path, PathBuf};

use parquet::file::reader::{FileReader, SerializedFileReader};

use crate::error::GranaryError;
use crate::table::{Example, Schema, SchemaBuilder};

fn parquet_error(path: &Path, source: impl std::fmt::Display) -> GranaryError {
    GranaryError::ParquetParse {
        path: path.to_path_buf(),
        message: source.to_string(),
    }
}

/// Streaming example reader over one Parquet file.
pub struct ParquetExamples {
    path: PathBuf,
    rows: parquet::record::reader::RowIter<'static>,
    row: usize,
}

impl Iterator for ParquetExamples {
    type Item = Result<Example, GranaryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(source) => return Some(Err(parquet_error(&self.path, source))),
        };
        self.row += 1;

        let value = row.to_json_value();
        let object = match value.as_object() {
            Some(object) => object,
            None => {
                return Some(Err(parquet_error(
                    &self.path,
                    format!("row {}: expected an object row", self.row),
                )));
            }
        };
        Some(
            Example::from_json_object(object).map_err(|error| {
                parquet_error(&self.path, format!("row {}: {}", self.row, error))
            }),
        )
    }
}

/// Opens a Parquet file for streaming reads.
pub fn read_parquet_examples(path: &Path) -> Result<ParquetExamples, GranaryError> {
    let file = File::open(path).map_err(GranaryError::Io)?;
    let reader = SerializedFileReader::new(file).map_err(|source| parquet_error(path, source))?;
    let rows = parquet::record::reader::RowIter::from_file_into(Box::new(reader));

    Ok(ParquetExamples {
        path: path.to_path_buf(),
        rows,
        row: 0,
    })
}

/// Number of rows recorded in the file footer, without decoding any data.
pub fn parquet_row_count(path: &Path) -> Result<u64, GranaryError> {
    let file = File::open(path).map_err(GranaryError::Io)?;
    let reader = SerializedFileReader::new(file).map_err(|source| parquet_error(path, source))?;
    Ok(reader.metadata().file_metadata().num_rows().max(0) as u64)
}

/// Reads a whole file, inferring the schema from its rows.
pub fn read_parquet(path: &Path) -> Result<(Schema, Vec<Example>), GranaryError> {
    let mut builder = SchemaBuilder::new();
    let mut examples = Vec::new();
    for example in read_parquet_examples(path)? {
        let example = example?;
        builder.observe(&example);
        examples.push(example);
    }
    Ok((builder.finish(), examples))
}
