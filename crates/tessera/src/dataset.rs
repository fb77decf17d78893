// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! In-memory tabular datasets and the loaders that build them.
//!
//! Every cell is a [`Scalar`]. Loaders normalise rows so that each row holds
//! exactly the dataset's columns, in column order; a column that is absent
//! from a source record becomes [`Scalar::Null`].

use crate::error::{DataError, DataResult};
use crate::relationship::Relationship;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Null,
}

/// Strict numeric parse shared by classification and aggregation.
///
/// Surrounding whitespace is ignored; empty strings and non-finite results
/// (`NaN`, `inf`) do not count as numbers.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Number(_) | Scalar::Null => None,
            Scalar::Text(s) => parse_number(s),
        }
    }
    /// Numeric coercion used by every aggregation: anything that is not a
    /// clean number counts as zero.
    pub fn to_number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }
    /// Grouping key for this cell; `None` for nulls.
    pub fn label(&self) -> Option<String> {
        match self {
            Scalar::Number(n) => Some(n.to_string()),
            Scalar::Text(s) => Some(s.clone()),
            Scalar::Null => None,
        }
    }
    /// Dynamic typing for raw text cells.
    pub fn from_cell(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Scalar::Null
        } else if let Some(n) = parse_number(raw) {
            Scalar::Number(n)
        } else {
            Scalar::Text(raw.to_string())
        }
    }
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Number(n) => n.as_f64().map_or(Scalar::Null, Scalar::Number),
            Value::String(s) => Scalar::Text(s.clone()),
            Value::Bool(b) => Scalar::Text(b.to_string()),
            other => Scalar::Text(other.to_string()),
        }
    }
}
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => write!(f, "{s}"),
            Scalar::Null => write!(f, "null"),
        }
    }
}
impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}
impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Number(v as f64)
    }
}
impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}
impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

pub type Row = IndexMap<String, Scalar>;

static NULL: Scalar = Scalar::Null;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}
impl Dataset {
    /// Builds a dataset with a fresh id. Rows are reshaped to `columns`:
    /// missing cells become null, keys outside `columns` are dropped.
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> DataResult<Self> {
        let name = name.into();
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(DataError::DuplicateColumn {
                    dataset: name,
                    column: column.clone(),
                });
            }
        }
        let rows = rows
            .into_iter()
            .map(|mut row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.swap_remove(c).unwrap_or(Scalar::Null)))
                    .collect()
            })
            .collect();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            columns,
            rows,
            relationships: Vec::new(),
        })
    }
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
    pub fn from_csv_reader<R: Read>(name: impl Into<String>, reader: R) -> DataResult<Self> {
        let name = name.into();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if columns.iter().all(String::is_empty) {
            return Err(DataError::EmptyDataset { dataset: name });
        }
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let row: Row = columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let cell = record.get(i).map_or(Scalar::Null, Scalar::from_cell);
                    (column.clone(), cell)
                })
                .collect();
            rows.push(row);
        }
        debug!(dataset = %name, columns = columns.len(), rows = rows.len(), "Loaded CSV dataset");
        Self::new(name, columns, rows)
    }
    /// Loads a CSV file, naming the dataset after the file name.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> DataResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| DataError::DataFileError {
            path: path.display().to_string(),
            source: csv::Error::from(e),
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self::from_csv_reader(name, file)
    }
    /// Loads a JSON array of flat objects. Columns are the union of keys in
    /// first-seen order.
    pub fn from_json_records(name: impl Into<String>, records: &Value) -> DataResult<Self> {
        let Value::Array(items) = records else {
            return Err(DataError::NotARecordArray {
                found: json_kind(records).to_string(),
            });
        };
        let mut columns: IndexSet<String> = IndexSet::new();
        let mut rows = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let Value::Object(map) = item else {
                return Err(DataError::NotARecord { index });
            };
            let row: Row = map
                .iter()
                .map(|(k, v)| {
                    columns.insert(k.clone());
                    (k.clone(), Scalar::from_json(v))
                })
                .collect();
            rows.push(row);
        }
        Self::new(name, columns.into_iter().collect(), rows)
    }
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
    pub fn require_column(&self, column: &str) -> DataResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(DataError::ColumnNotFound {
                dataset: self.name.clone(),
                column: column.to_string(),
            })
        }
    }
    /// Cells of `column` in row order; rows lacking the key yield null.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Scalar> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&NULL))
    }
    /// Copy of this dataset with its relationship list replaced wholesale.
    pub fn with_relationships(&self, relationships: Vec<Relationship>) -> Self {
        Self {
            relationships,
            ..self.clone()
        }
    }
    /// Relationships that still point at existing columns of existing
    /// datasets. Datasets can be edited after detection, so consumers should
    /// read relationships through this rather than the raw list.
    pub fn live_relationships<'a>(&'a self, datasets: &'a [Dataset]) -> Vec<&'a Relationship> {
        self.relationships
            .iter()
            .filter(|rel| {
                rel.source_dataset_id == self.id
                    && self.has_column(&rel.source_column)
                    && datasets
                        .iter()
                        .find(|d| d.id == rel.target_dataset_id)
                        .is_some_and(|target| target.has_column(&rel.target_column))
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_number_is_strict() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number(" -1.5 "), Some(-1.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn coercion_substitutes_zero() {
        assert_eq!(Scalar::from("7").to_number_or_zero(), 7.0);
        assert_eq!(Scalar::from("seven").to_number_or_zero(), 0.0);
        assert_eq!(Scalar::Null.to_number_or_zero(), 0.0);
        assert_eq!(Scalar::Number(f64::NAN).to_number_or_zero(), 0.0);
    }

    #[test]
    fn labels_render_whole_numbers_without_fraction() {
        assert_eq!(Scalar::Number(10.0).label().as_deref(), Some("10"));
        assert_eq!(Scalar::Number(2.5).label().as_deref(), Some("2.5"));
        assert_eq!(Scalar::Null.label(), None);
    }

    #[test]
    fn csv_cells_are_typed_dynamically() {
        let data = "region, sales,note\nNorth,10,\nSouth,abc,hi\nEast\n";
        let ds = Dataset::from_csv_reader("sales.csv", data.as_bytes()).unwrap();
        assert_eq!(ds.columns, vec!["region", "sales", "note"]);
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.rows[0]["sales"], Scalar::Number(10.0));
        assert_eq!(ds.rows[0]["note"], Scalar::Null);
        assert_eq!(ds.rows[1]["sales"], Scalar::Text("abc".into()));
        assert_eq!(ds.rows[2]["sales"], Scalar::Null);
    }

    #[test]
    fn json_records_take_union_of_keys() {
        let records = json!([
            {"id": 1, "name": "a"},
            {"id": 2, "active": true},
        ]);
        let ds = Dataset::from_json_records("users", &records).unwrap();
        assert_eq!(ds.columns, vec!["id", "name", "active"]);
        assert_eq!(ds.rows[0]["active"], Scalar::Null);
        assert_eq!(ds.rows[1]["active"], Scalar::Text("true".into()));
        assert_eq!(ds.rows[1].len(), 3);

        assert!(matches!(
            Dataset::from_json_records("bad", &json!({"id": 1})),
            Err(DataError::NotARecordArray { .. })
        ));
        assert!(matches!(
            Dataset::from_json_records("bad", &json!([1])),
            Err(DataError::NotARecord { index: 0 })
        ));
    }

    #[test]
    fn csv_without_header_is_empty() {
        assert!(matches!(
            Dataset::from_csv_reader("blank.csv", "".as_bytes()),
            Err(DataError::EmptyDataset { .. })
        ));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = Dataset::new("d", vec!["a".into(), "a".into()], vec![]).unwrap_err();
        assert!(matches!(err, DataError::DuplicateColumn { .. }));
    }

    #[test]
    fn csv_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        std::fs::write(&path, "order_id,total\n1,9.5\n").unwrap();
        let ds = Dataset::from_csv_path(&path).unwrap();
        assert_eq!(ds.name, "orders.csv");
        assert!(ds.require_column("total").is_ok());
        assert!(ds.require_column("missing").is_err());
    }
}
