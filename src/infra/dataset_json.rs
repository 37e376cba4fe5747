use crate::dataset::{CellValue, ColumnTable, ColumnType};
use crate::error::{EnricherError, Result};
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;

/// Load a dataset from a JSON array of records. Column order follows the
/// first appearance of each key; a column's dtype is inferred from its
/// values (all-integer, all-numeric, otherwise text).
pub fn load_dataset(path: &Path) -> Result<ColumnTable> {
    let content = fs::read_to_string(path)?;
    let rows: Vec<Map<String, Value>> = serde_json::from_str(&content)?;

    let mut order: Vec<String> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !order.iter().any(|k| k == key) {
                order.push(key.clone());
            }
        }
    }

    let null = Value::Null;
    let mut table = ColumnTable::new();
    for name in &order {
        let raw_values: Vec<&Value> = rows
            .iter()
            .map(|row| row.get(name).unwrap_or(&null))
            .collect();
        let dtype = infer_dtype(&raw_values);
        let values = raw_values
            .into_iter()
            .map(|value| to_cell(value, dtype))
            .collect();
        table.add_column(name, dtype, values)?;
    }
    Ok(table)
}

/// Save a dataset as a JSON array of records, preserving column order.
pub fn save_dataset(table: &ColumnTable, path: &Path) -> Result<()> {
    let mut rows: Vec<Value> = Vec::with_capacity(table.row_count());
    for idx in 0..table.row_count() {
        let mut row = Map::new();
        for name in table.column_names() {
            row.insert(name.to_string(), from_cell(table.cell(idx, name)?)?);
        }
        rows.push(Value::Object(row));
    }

    let json_content = serde_json::to_string_pretty(&rows)?;
    fs::write(path, json_content)?;
    Ok(())
}

fn infer_dtype(values: &[&Value]) -> ColumnType {
    let mut all_int = true;
    let mut any_value = false;
    for value in values {
        match value {
            Value::Null => {}
            Value::Number(n) => {
                any_value = true;
                if n.as_i64().is_none() {
                    all_int = false;
                }
            }
            _ => return ColumnType::Text,
        }
    }
    if !any_value {
        ColumnType::Text
    } else if all_int {
        ColumnType::Int
    } else {
        ColumnType::Float
    }
}

fn to_cell(value: &Value, dtype: ColumnType) -> CellValue {
    match (value, dtype) {
        (Value::Null, _) => CellValue::Null,
        (Value::String(s), _) => CellValue::Text(s.clone()),
        (Value::Number(n), ColumnType::Int) => {
            n.as_i64().map(CellValue::Int).unwrap_or(CellValue::Null)
        }
        (Value::Number(n), ColumnType::Float) => {
            n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Null)
        }
        (other, _) => CellValue::Text(other.to_string()),
    }
}

fn from_cell(cell: &CellValue) -> Result<Value> {
    Ok(match cell {
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Int(i) => Value::Number((*i).into()),
        CellValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| EnricherError::Config(format!("non-finite float in dataset: {f}")))?,
        CellValue::Null => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn round_trips_text_and_numeric_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"Organisation Name": "Aero Academy", "Fleet Size": 12}},
                {{"Organisation Name": "Cloudbase", "Fleet Size": null}}
            ]"#
        )
        .unwrap();

        let table = load_dataset(file.path()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["Organisation Name", "Fleet Size"]);
        assert_eq!(table.cell(0, "Fleet Size").unwrap(), &CellValue::Int(12));
        assert_eq!(table.cell(1, "Fleet Size").unwrap(), &CellValue::Null);

        let out = tempfile::NamedTempFile::new().unwrap();
        save_dataset(&table, out.path()).unwrap();
        let reloaded = load_dataset(out.path()).unwrap();
        assert_eq!(reloaded.cell(0, "Fleet Size").unwrap(), &CellValue::Int(12));
        assert_eq!(
            reloaded.text(1, "Organisation Name").unwrap(),
            "Cloudbase"
        );
    }

    #[test]
    fn mixed_columns_read_as_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"Notes": "a"}}, {{"Notes": 3}}]"#
        )
        .unwrap();

        let table = load_dataset(file.path()).unwrap();
        assert_eq!(table.text(1, "Notes").unwrap(), "3");
    }
}
