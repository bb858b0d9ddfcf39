//! Conversion from REST query results to Arrow record batches.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde_json::Value;

use crate::errors::{Result, SlingError};
use crate::frame::DataFrame;

/// Build a frame from the pages returned by `jobs.getQueryResults`, one
/// record batch per non-empty page.
pub(crate) fn frame_from_pages(pages: &[Value]) -> Result<DataFrame> {
    let first = pages
        .first()
        .ok_or_else(|| SlingError::MalformedResponse("no result pages".to_string()))?;
    let schema = schema_from_response(first)?;

    let mut batches = Vec::new();
    for page in pages {
        if let Some(rows) = page["rows"].as_array() {
            if !rows.is_empty() {
                batches.push(rows_to_batch(schema.clone(), rows)?);
            }
        }
    }

    if batches.is_empty() {
        return Ok(DataFrame::empty(schema));
    }
    DataFrame::try_new(schema, batches)
}

/// Map the response schema to Arrow. Values arrive as JSON strings through
/// the record-based API, so only scalar booleans, integers, and floats get
/// native Arrow types; everything else stays textual.
fn schema_from_response(page: &Value) -> Result<SchemaRef> {
    let fields = page["schema"]["fields"].as_array().ok_or_else(|| {
        SlingError::MalformedResponse("query response missing schema".to_string())
    })?;

    let mut arrow_fields = Vec::with_capacity(fields.len());
    for field in fields {
        let name = field["name"].as_str().ok_or_else(|| {
            SlingError::MalformedResponse("schema field missing name".to_string())
        })?;
        let repeated = field["mode"].as_str() == Some("REPEATED");
        let data_type = if repeated {
            DataType::Utf8
        } else {
            match field["type"].as_str() {
                Some("BOOL") | Some("BOOLEAN") => DataType::Boolean,
                Some("INTEGER") | Some("INT64") => DataType::Int64,
                Some("FLOAT") | Some("FLOAT64") => DataType::Float64,
                _ => DataType::Utf8,
            }
        };
        arrow_fields.push(Field::new(name, data_type, true));
    }
    Ok(Arc::new(Schema::new(arrow_fields)))
}

fn rows_to_batch(schema: SchemaRef, rows: &[Value]) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (idx, field) in schema.fields().iter().enumerate() {
        let cells = rows.iter().map(|row| &row["f"][idx]["v"]);
        let array: ArrayRef = match field.data_type() {
            DataType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(rows.len());
                for cell in cells {
                    builder.append_option(cell.as_str().map(|v| v == "true"));
                }
                Arc::new(builder.finish())
            }
            DataType::Int64 => {
                let mut builder = Int64Builder::with_capacity(rows.len());
                for cell in cells {
                    builder.append_option(cell.as_str().and_then(|v| v.parse::<i64>().ok()));
                }
                Arc::new(builder.finish())
            }
            DataType::Float64 => {
                let mut builder = Float64Builder::with_capacity(rows.len());
                for cell in cells {
                    builder.append_option(cell.as_str().and_then(|v| v.parse::<f64>().ok()));
                }
                Arc::new(builder.finish())
            }
            _ => {
                let mut builder = StringBuilder::new();
                for cell in cells {
                    match cell {
                        Value::String(v) => builder.append_value(v),
                        Value::Null => builder.append_null(),
                        other => builder.append_value(other.to_string()),
                    }
                }
                Arc::new(builder.finish())
            }
        };
        columns.push(array);
    }
    Ok(RecordBatch::try_new(schema, columns)?)
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, BooleanArray, Float64Array, Int64Array, StringArray};
    use serde_json::json;

    use super::*;

    fn page(rows: Value) -> Value {
        json!({
            "jobComplete": true,
            "schema": {
                "fields": [
                    {"name": "id", "type": "INTEGER"},
                    {"name": "name", "type": "STRING"},
                    {"name": "score", "type": "FLOAT"},
                    {"name": "active", "type": "BOOLEAN"},
                    {"name": "ts", "type": "TIMESTAMP"},
                ]
            },
            "rows": rows,
        })
    }

    fn row(values: &[Value]) -> Value {
        json!({ "f": values.iter().map(|v| json!({"v": v})).collect::<Vec<_>>() })
    }

    #[test]
    fn typed_columns() {
        let rows = json!([
            row(&[json!("1"), json!("a"), json!("1.5"), json!("true"), json!("1.7e9")]),
            row(&[json!("2"), json!(null), json!(null), json!("false"), json!(null)]),
        ]);
        let df = frame_from_pages(&[page(rows)]).unwrap();

        assert_eq!(df.num_rows(), 2);
        assert_eq!(df.column_names(), vec!["id", "name", "score", "active", "ts"]);

        let batch = &df.batches()[0];
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ids.value(0), 1);
        assert_eq!(ids.value(1), 2);

        let names = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(names.value(0), "a");
        assert!(names.is_null(1));

        let scores = batch
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(scores.value(0), 1.5);
        assert!(scores.is_null(1));

        let active = batch
            .column(3)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap();
        assert!(active.value(0));
        assert!(!active.value(1));

        // Timestamps stay textual through the record-based API.
        let ts = batch
            .column(4)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(ts.value(0), "1.7e9");
        assert!(ts.is_null(1));
    }

    #[test]
    fn one_batch_per_page() {
        let first = page(json!([row(&[
            json!("1"),
            json!("a"),
            json!("1.0"),
            json!("true"),
            json!("t"),
        ])]));
        let second = page(json!([row(&[
            json!("2"),
            json!("b"),
            json!("2.0"),
            json!("false"),
            json!("t"),
        ])]));

        let df = frame_from_pages(&[first, second]).unwrap();
        assert_eq!(df.batches().len(), 2);
        assert_eq!(df.num_rows(), 2);
    }

    #[test]
    fn empty_result_set() {
        let df = frame_from_pages(&[page(json!([]))]).unwrap();
        assert_eq!(df.num_rows(), 0);
        assert_eq!(df.num_columns(), 5);
    }

    #[test]
    fn missing_schema_is_malformed() {
        let res = frame_from_pages(&[json!({"jobComplete": true})]);
        assert!(matches!(res, Err(SlingError::MalformedResponse(_))));
    }

    #[test]
    fn no_pages_is_malformed() {
        assert!(matches!(
            frame_from_pages(&[]),
            Err(SlingError::MalformedResponse(_))
        ));
    }
}
