//! Conversions between samples and record batches, plus column edits

use std::sync::Arc;

use arrow::array::{new_null_array, ArrayRef};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::error::ArrowError;
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::writer::JsonArray;
use arrow::json::{ReaderBuilder, WriterBuilder};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde_json::Value;

use datalab_core::{Error, Result, Sample};

/// Type tag recorded in the schema side-car for a column type
pub fn type_tag(data_type: &DataType) -> String {
    match data_type {
        DataType::Null => "null".into(),
        DataType::Boolean => "bool".into(),
        DataType::Int8 => "int8".into(),
        DataType::Int16 => "int16".into(),
        DataType::Int32 => "int32".into(),
        DataType::Int64 => "int64".into(),
        DataType::UInt8 => "uint8".into(),
        DataType::UInt16 => "uint16".into(),
        DataType::UInt32 => "uint32".into(),
        DataType::UInt64 => "uint64".into(),
        DataType::Float16 => "float16".into(),
        DataType::Float32 => "float32".into(),
        DataType::Float64 => "float64".into(),
        DataType::Utf8 => "string".into(),
        DataType::LargeUtf8 => "large_string".into(),
        DataType::Binary => "binary".into(),
        DataType::LargeBinary => "large_binary".into(),
        DataType::List(item) | DataType::LargeList(item) => {
            format!("list<{}>", type_tag(item.data_type()))
        }
        DataType::Struct(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|field| format!("{}: {}", field.name(), type_tag(field.data_type())))
                .collect();
            format!("struct<{}>", inner.join(", "))
        }
        other => other.to_string().to_lowercase(),
    }
}

/// Decode JSON objects into one batch with an inferred schema
fn decode_objects(objects: &[Value]) -> Result<RecordBatch> {
    let schema = infer_json_schema_from_iterator(objects.iter().map(Ok::<_, ArrowError>))?;
    let schema = Arc::new(schema);

    if schema.fields().is_empty() {
        let options = RecordBatchOptions::new().with_row_count(Some(objects.len()));
        return Ok(RecordBatch::try_new_with_options(schema, vec![], &options)?);
    }

    let mut decoder = ReaderBuilder::new(schema.clone())
        .with_batch_size(objects.len().max(1))
        .build_decoder()?;
    decoder.serialize(objects)?;

    match decoder.flush()? {
        Some(batch) => Ok(batch),
        None => Ok(RecordBatch::new_empty(schema)),
    }
}

/// Build a typed column named `field` from one value per row.
///
/// The element type is inferred from the values; integers become `int64`,
/// mixed integers and floats become `float64`, arrays become lists and
/// objects become structs. All-null input yields a null-typed column.
pub fn column_from_values(field: &str, values: &[Value]) -> Result<(Field, ArrayRef)> {
    if values.iter().all(Value::is_null) {
        return Ok((
            Field::new(field, DataType::Null, true),
            new_null_array(&DataType::Null, values.len()),
        ));
    }

    let objects: Vec<Value> = values
        .iter()
        .map(|value| {
            let mut object = Sample::new();
            object.insert(field.to_string(), value.clone());
            Value::Object(object)
        })
        .collect();

    let batch = decode_objects(&objects)?;
    let index = batch.schema().index_of(field)?;
    let column = batch.column(index).clone();
    let field = batch.schema().field(index).clone();

    Ok((field, column))
}

/// Build a batch from samples; the schema is the union of their fields
pub fn batch_from_samples(samples: &[Sample]) -> Result<RecordBatch> {
    let objects: Vec<Value> = samples.iter().cloned().map(Value::Object).collect();
    decode_objects(&objects)
}

/// Whether `batch` has a column named `name`
pub fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema().index_of(name).is_ok()
}

/// Copy of `batch` without column `name`
pub fn drop_column(batch: &RecordBatch, name: &str) -> Result<RecordBatch> {
    let index = batch
        .schema()
        .index_of(name)
        .map_err(|_| Error::field_not_found(name, None))?;

    let mut batch = batch.clone();
    batch.remove_column(index);
    Ok(batch)
}

/// Copy of `batch` with `column` appended as `field`.
///
/// The column must have one value per row and its name must not be taken.
pub fn append_column(batch: &RecordBatch, field: Field, column: ArrayRef) -> Result<RecordBatch> {
    if column.len() != batch.num_rows() {
        return Err(Error::SchemaMismatch(format!(
            "column '{}' has {} values but the table has {} rows",
            field.name(),
            column.len(),
            batch.num_rows()
        )));
    }
    if has_column(batch, field.name()) {
        return Err(Error::SchemaMismatch(format!(
            "column '{}' already exists",
            field.name()
        )));
    }

    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    fields.push(Arc::new(field));
    let mut columns = batch.columns().to_vec();
    columns.push(column);

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// Drop `field.name()` if present, then append `column`
pub fn replace_column(batch: &RecordBatch, field: Field, column: ArrayRef) -> Result<RecordBatch> {
    if has_column(batch, field.name()) {
        let dropped = drop_column(batch, field.name())?;
        append_column(&dropped, field, column)
    } else {
        append_column(batch, field, column)
    }
}

/// Every row of `batch` as a sample; nulls are kept as explicit `null`s
pub fn rows(batch: &RecordBatch) -> Result<Vec<Sample>> {
    if batch.num_rows() == 0 {
        return Ok(Vec::new());
    }
    if batch.num_columns() == 0 {
        return Ok(vec![Sample::new(); batch.num_rows()]);
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    writer.write(batch)?;
    writer.finish()?;

    Ok(serde_json::from_slice(&writer.into_inner())?)
}

/// Row `index` of `batch`
pub fn row(batch: &RecordBatch, index: usize) -> Result<Sample> {
    if index >= batch.num_rows() {
        return Err(Error::IndexOutOfBounds {
            index,
            len: batch.num_rows(),
        });
    }

    rows(&batch.slice(index, 1))?
        .pop()
        .ok_or(Error::IndexOutOfBounds {
            index,
            len: batch.num_rows(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn samples(values: Value) -> Vec<Sample> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test_case(json!([4, 5]), "int64" ; "integers")]
    #[test_case(json!([1, 2.5]), "float64" ; "mixed numbers")]
    #[test_case(json!(["a", "b"]), "string" ; "strings")]
    #[test_case(json!([true, null]), "bool" ; "nullable bools")]
    #[test_case(json!([["a", "b"], []]), "list<string>" ; "lists")]
    #[test_case(json!([null, null]), "null" ; "all null")]
    fn test_inferred_type_tag(values: Value, expected: &str) {
        let values = values.as_array().unwrap().clone();
        let (field, column) = column_from_values("f", &values).unwrap();

        assert_eq!(type_tag(field.data_type()), expected);
        assert_eq!(column.len(), values.len());
    }

    #[test]
    fn test_struct_type_tag() {
        let (field, _) = column_from_values("f", &[json!({"a": 1, "b": "x"})]).unwrap();
        assert_eq!(type_tag(field.data_type()), "struct<a: int64, b: string>");
    }

    #[test]
    fn test_empty_column() {
        let (field, column) = column_from_values("f", &[]).unwrap();
        assert_eq!(field.data_type(), &DataType::Null);
        assert_eq!(column.len(), 0);
    }

    #[test]
    fn test_batch_rows_round_trip() {
        let input = samples(json!([
            {"text": "I love this movie", "label": 1},
            {"text": "do you love this movie", "label": null}
        ]));

        let batch = batch_from_samples(&input).unwrap();
        let output = rows(&batch).unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(output[0]["text"], json!("I love this movie"));
        assert_eq!(output[1]["label"], Value::Null);
        assert_eq!(row(&batch, 1).unwrap()["text"], json!("do you love this movie"));
        assert!(matches!(
            row(&batch, 2),
            Err(Error::IndexOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_replace_column_keeps_single_copy() {
        let batch = batch_from_samples(&samples(json!([{"text": "a b"}, {"text": "c"}]))).unwrap();
        let (field, column) = column_from_values("length", &[json!(2), json!(1)]).unwrap();
        let batch = append_column(&batch, field, column).unwrap();

        let (field, column) = column_from_values("length", &[json!(20), json!(10)]).unwrap();
        let batch = replace_column(&batch, field, column).unwrap();

        let names: Vec<_> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, ["text", "length"]);
        assert_eq!(rows(&batch).unwrap()[0]["length"], json!(20));
    }

    #[test]
    fn test_append_wrong_length_rejected() {
        let batch = batch_from_samples(&samples(json!([{"text": "a"}, {"text": "b"}]))).unwrap();
        let (field, column) = column_from_values("length", &[json!(1)]).unwrap();

        let err = append_column(&batch, field, column).unwrap_err();

        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn test_drop_missing_column() {
        let batch = batch_from_samples(&samples(json!([{"text": "a"}]))).unwrap();
        assert!(matches!(
            drop_column(&batch, "length"),
            Err(Error::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_rows_without_columns() {
        let batch = batch_from_samples(&samples(json!([{}, {}]))).unwrap();
        assert_eq!(rows(&batch).unwrap(), vec![Sample::new(), Sample::new()]);
    }
}
