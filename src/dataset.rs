use crate::constants::{
    COL_CONTACT_EMAIL, COL_CONTACT_NUMBER, COL_CONTACT_PERSON, COL_PROVINCE, COL_STATUS,
    COL_WEBSITE, REQUIRED_COLUMNS,
};
use crate::error::{EnricherError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single typed cell. Null reads as the empty string; writes never change
/// a column's dtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Float(f64),
    Null,
}

impl CellValue {
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Null => String::new(),
        }
    }
}

/// Declared dtype of a column; fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Int,
    Float,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub values: Vec<CellValue>,
}

/// Column-addressable tabular dataset: ordered columns, each holding one
/// typed value per row. The orchestrator is the single writer.
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    row_count: usize,
}

/// Unnormalized string snapshot of one row's display columns, captured
/// before processing. Change descriptions compare against this, not against
/// the parsed record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub province: String,
    pub status: String,
    pub website_url: String,
    pub contact_person: String,
    pub contact_number: String,
    pub contact_email: String,
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. The first column fixes the row count; later columns
    /// must match it.
    pub fn add_column(&mut self, name: &str, dtype: ColumnType, values: Vec<CellValue>) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(EnricherError::Config(format!(
                "Duplicate column name: {name}"
            )));
        }
        if self.columns.is_empty() {
            self.row_count = values.len();
        } else if values.len() != self.row_count {
            return Err(EnricherError::Config(format!(
                "Column '{}' has {} rows, expected {}",
                name,
                values.len(),
                self.row_count
            )));
        }
        self.index.insert(name.to_string(), self.columns.len());
        self.columns.push(Column {
            name: name.to_string(),
            dtype,
            values,
        });
        Ok(())
    }

    /// Convenience constructor for an all-text table.
    pub fn from_text_columns(columns: Vec<(&str, Vec<&str>)>) -> Result<Self> {
        let mut table = Self::new();
        for (name, values) in columns {
            let cells = values
                .into_iter()
                .map(|v| CellValue::Text(v.to_string()))
                .collect();
            table.add_column(name, ColumnType::Text, cells)?;
        }
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Fatal schema check, run before any row processing begins.
    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        for name in required {
            if !self.has_column(name) {
                return Err(EnricherError::MissingColumn(name.to_string()));
            }
        }
        Ok(())
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| EnricherError::MissingColumn(name.to_string()))
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| EnricherError::MissingColumn(name.to_string()))?;
        Ok(&mut self.columns[idx])
    }

    pub fn cell(&self, row: usize, name: &str) -> Result<&CellValue> {
        Ok(&self.column(name)?.values[row])
    }

    /// String form of a cell; Null reads as "".
    pub fn text(&self, row: usize, name: &str) -> Result<String> {
        Ok(self.cell(row, name)?.display())
    }

    /// Write a text value. Refuses to write into a non-text column so a
    /// run can never coerce a numeric column into strings (or vice versa).
    pub fn set_text(&mut self, row: usize, name: &str, value: &str) -> Result<()> {
        let column = self.column_mut(name)?;
        if column.dtype != ColumnType::Text {
            return Err(EnricherError::ColumnType {
                column: name.to_string(),
                expected: "text".to_string(),
            });
        }
        column.values[row] = CellValue::Text(value.to_string());
        Ok(())
    }

    /// Blank a cell without changing the column dtype.
    pub fn blank(&mut self, row: usize, name: &str) -> Result<()> {
        let column = self.column_mut(name)?;
        column.values[row] = match column.dtype {
            ColumnType::Text => CellValue::Text(String::new()),
            _ => CellValue::Null,
        };
        Ok(())
    }

    /// Snapshot the display columns of a row before processing.
    pub fn raw_row(&self, row: usize) -> Result<RawRow> {
        Ok(RawRow {
            province: self.text(row, COL_PROVINCE)?,
            status: self.text(row, COL_STATUS)?,
            website_url: self.text(row, COL_WEBSITE)?,
            contact_person: self.text(row, COL_CONTACT_PERSON)?,
            contact_number: self.text(row, COL_CONTACT_NUMBER)?,
            contact_email: self.text(row, COL_CONTACT_EMAIL)?,
        })
    }
}

/// Required-column check against the organisation schema.
pub fn check_schema(table: &ColumnTable) -> Result<()> {
    table.require_columns(&REQUIRED_COLUMNS)
}
