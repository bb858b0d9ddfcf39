//! In-memory tabular results.

use std::fs::File;
use std::path::Path;

use arrow::csv;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::errors::{Result, SlingError};

/// A fully materialized query result: a schema plus the record batches
/// holding the rows.
#[derive(Debug, Clone)]
pub struct DataFrame {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl DataFrame {
    /// Build a frame from batches. All batches must share `schema`.
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<DataFrame> {
        for batch in &batches {
            if batch.schema() != schema {
                return Err(SlingError::SchemaMismatch);
            }
        }
        Ok(DataFrame { schema, batches })
    }

    pub fn empty(schema: SchemaRef) -> DataFrame {
        DataFrame {
            schema,
            batches: Vec::new(),
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Serialize to a delimited text file with a header row.
    pub fn write_csv(&self, path: &Path, separator: u8) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .with_header(true)
            .with_delimiter(separator)
            .build(file);
        for batch in &self.batches {
            writer.write(batch)?;
        }
        Ok(())
    }

    /// Serialize to a Parquet file.
    pub fn write_parquet(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, self.schema.clone(), None)?;
        for batch in &self.batches {
            writer.write(batch)?;
        }
        writer.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use super::*;

    fn sample_frame() -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(2)])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("a"), None])) as ArrayRef,
            ],
        )
        .unwrap();
        DataFrame::try_new(schema, vec![batch]).unwrap()
    }

    #[test]
    fn dimensions() {
        let df = sample_frame();
        assert_eq!(df.num_rows(), 2);
        assert_eq!(df.num_columns(), 2);
        assert_eq!(df.column_names(), vec!["id", "name"]);
    }

    #[test]
    fn mismatched_batch_schema_rejected() {
        let df = sample_frame();
        let other = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(
            other,
            vec![Arc::new(Int64Array::from(vec![Some(1)])) as ArrayRef],
        )
        .unwrap();
        let res = DataFrame::try_new(df.schema(), vec![batch]);
        assert!(matches!(res, Err(SlingError::SchemaMismatch)));
    }

    #[test]
    fn csv_uses_separator_and_header() {
        let df = sample_frame();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        df.write_csv(&path, b';').unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("id;name"));
        assert_eq!(lines.next(), Some("1;a"));
        assert_eq!(lines.next(), Some("2;"));
    }

    #[test]
    fn parquet_round_trip() {
        let df = sample_frame();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        df.write_parquet(&path).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
    }
}
