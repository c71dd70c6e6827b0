//! Dynamically typed query results.
//!
//! Every row of a [`ResultSet`] shares one column list, so the key set is
//! identical across rows by construction.

use std::borrow::Cow;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::decode::decode_if_encoded;

/// A single database value of unknown static type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Turn `Bytes` into `Text` (lossy UTF-8); every other variant is unchanged.
    pub fn bytes_to_text(self) -> Self {
        match self {
            SqlValue::Bytes(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
            other => other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<Option<SqlValue>> for SqlValue {
    fn from(v: Option<SqlValue>) -> Self {
        v.unwrap_or(SqlValue::Null)
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_owned())
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Int(n)
    }
}

impl From<f64> for SqlValue {
    fn from(n: f64) -> Self {
        SqlValue::Float(n)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Bool(b)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(b: Vec<u8>) -> Self {
        SqlValue::Bytes(b)
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_unit(),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Int(n) => serializer.serialize_i64(*n),
            SqlValue::Float(n) => serializer.serialize_f64(*n),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// One row: column name → value, in result-set column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl ResultRow {
    /// `values` must hold exactly one entry per column.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len(), "one value per column");
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut SqlValue> {
        self.values.iter_mut()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Ordered rows of one query; possibly empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<ResultRow>,
}

impl ResultSet {
    /// Assemble rows that all share `columns` as their keys.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        let columns: Arc<[String]> = columns.into();
        let rows = rows
            .into_iter()
            .map(|values| ResultRow::new(Arc::clone(&columns), values))
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    /// Trim trailing whitespace from every text value (e.g. `CHAR(n)` padding).
    pub fn trim_trailing_whitespace(&mut self) {
        self.for_each_text(|s| {
            let trimmed = s.trim_end().len();
            s.truncate(trimmed);
        });
    }

    /// Replace text values that look like base64-encoded text with their
    /// decoded form.
    pub fn decode_base64_text(&mut self) {
        self.for_each_text(|s| {
            let decoded = match decode_if_encoded(s) {
                Cow::Owned(decoded) => Some(decoded),
                Cow::Borrowed(_) => None,
            };
            if let Some(decoded) = decoded {
                *s = decoded;
            }
        });
    }

    fn for_each_text(&mut self, mut f: impl FnMut(&mut String)) {
        for row in &mut self.rows {
            for value in row.values_mut() {
                if let SqlValue::Text(s) = value {
                    f(s);
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}
