//! Batched columnar materialization.
//!
//! [`TableWriter`] buffers examples and flushes them to a Parquet file in
//! Arrow record batches, so generation stays memory-bounded regardless of
//! split size.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType as ArrowDataType, Field as ArrowField, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::GranaryError;
use crate::splits::SplitInfo;
use crate::table::{DataType, Example, Schema, Value};

/// Rows buffered before each record-batch flush.
pub const DEFAULT_WRITER_BATCH_SIZE: usize = 1000;

fn arrow_type_for(data_type: &DataType) -> ArrowDataType {
    match data_type {
        DataType::Bool => ArrowDataType::Boolean,
        DataType::Int64 => ArrowDataType::Int64,
        DataType::Float64 => ArrowDataType::Float64,
        DataType::Utf8 => ArrowDataType::Utf8,
        // Class labels are integer-coded on disk.
        DataType::ClassLabel { .. } => ArrowDataType::Int64,
    }
}

/// Converts a granary schema into its Arrow equivalent.
pub fn schema_to_arrow(schema: &Schema) -> ArrowSchema {
    let fields: Vec<ArrowField> = schema
        .fields
        .iter()
        .map(|field| ArrowField::new(&field.name, arrow_type_for(&field.data_type), true))
        .collect();
    ArrowSchema::new(fields)
}

/// Writes examples into one Parquet file, flushing a record batch every
/// `batch_size` rows.
pub struct TableWriter {
    path: PathBuf,
    schema: Schema,
    arrow_schema: Arc<ArrowSchema>,
    writer: ArrowWriter<File>,
    batch_size: usize,
    buffer: Vec<Example>,
    num_examples: u64,
}

impl TableWriter {
    pub fn create(path: &Path, schema: Schema, batch_size: usize) -> Result<Self, GranaryError> {
        let arrow_schema = Arc::new(schema_to_arrow(&schema));
        let file = File::create(path).map_err(GranaryError::Io)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, arrow_schema.clone(), Some(props)).map_err(
            |source| GranaryError::ParquetWrite {
                path: path.to_path_buf(),
                message: source.to_string(),
            },
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            schema,
            arrow_schema,
            writer,
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
            num_examples: 0,
        })
    }

    /// Buffers one example. Columns missing from the example become nulls;
    /// columns the schema does not know are an error.
    pub fn write(&mut self, example: Example) -> Result<(), GranaryError> {
        for (column, _) in example.columns() {
            if self.schema.field(column).is_none() {
                return Err(GranaryError::UnknownColumn(column.clone()));
            }
        }

        self.buffer.push(example);
        self.num_examples += 1;
        if self.buffer.len() >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn flush_batch(&mut self) -> Result<(), GranaryError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.buffer);
        let batch = build_record_batch(&self.path, &self.schema, self.arrow_schema.clone(), &rows)?;
        self.writer
            .write(&batch)
            .map_err(|source| GranaryError::ParquetWrite {
                path: self.path.clone(),
                message: source.to_string(),
            })
    }

    /// Flushes the tail batch, closes the file, and reports the recorded
    /// split size.
    pub fn finish(mut self) -> Result<SplitInfo, GranaryError> {
        self.flush_batch()?;
        let Self {
            path,
            writer,
            num_examples,
            ..
        } = self;
        writer.close().map_err(|source| GranaryError::ParquetWrite {
            path: path.clone(),
            message: source.to_string(),
        })?;

        let num_bytes = std::fs::metadata(&path).map_err(GranaryError::Io)?.len();
        Ok(SplitInfo {
            num_examples,
            num_bytes,
        })
    }
}

fn build_record_batch(
    path: &Path,
    schema: &Schema,
    arrow_schema: Arc<ArrowSchema>,
    rows: &[Example],
) -> Result<RecordBatch, GranaryError> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields.len());

    for field in &schema.fields {
        let mut cells = Vec::with_capacity(rows.len());
        for row in rows {
            let value = row.get(&field.name).cloned().unwrap_or(Value::Null);
            cells.push(value.coerce_to(&field.name, &field.data_type)?);
        }
        columns.push(build_array(field.data_type.clone(), &field.name, cells)?);
    }

    RecordBatch::try_new(arrow_schema, columns).map_err(|source| GranaryError::ParquetWrite {
        path: path.to_path_buf(),
        message: source.to_string(),
    })
}

fn build_array(
    data_type: DataType,
    column: &str,
    cells: Vec<Value>,
) -> Result<ArrayRef, GranaryError> {
    let unexpected = |value: &Value| GranaryError::TypeMismatch {
        column: column.to_string(),
        message: format!("cannot store {value:?} in a {data_type:?} column"),
    };

    match &data_type {
        DataType::Bool => {
            let mut values = Vec::with_capacity(cells.len());
            for cell in &cells {
                values.push(match cell {
                    Value::Null => None,
                    Value::Bool(flag) => Some(*flag),
                    other => return Err(unexpected(other)),
                });
            }
            Ok(Arc::new(BooleanArray::from(values)))
        }
        DataType::Int64 | DataType::ClassLabel { .. } => {
            let mut values = Vec::with_capacity(cells.len());
            for cell in &cells {
                values.push(match cell {
                    Value::Null => None,
                    Value::Int(int) => Some(*int),
                    other => return Err(unexpected(other)),
                });
            }
            Ok(Arc::new(Int64Array::from(values)))
        }
        DataType::Float64 => {
            let mut values = Vec::with_capacity(cells.len());
            for cell in &cells {
                values.push(match cell {
                    Value::Null => None,
                    Value::Float(float) => Some(*float),
                    other => return Err(unexpected(other)),
                });
            }
            Ok(Arc::new(Float64Array::from(values)))
        }
        DataType::Utf8 => {
            let mut values = Vec::with_capacity(cells.len());
            for cell in &cells {
                values.push(match cell {
                    Value::Null => None,
                    Value::Str(text) => Some(text.clone()),
                    other => return Err(unexpected(other)),
                });
            }
            Ok(Arc::new(StringArray::from(values)))
        }
    }
}
