//! Filter values and predicates.
//!
//! A [`Filter`] is used in two places: as the standing query filter attached to a
//! view mapping, and as the ad-hoc condition a caller adds to a single view query.
//! Filters render to parameterized SQL and can also be evaluated against an
//! in-memory [`Row`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::sql::DatabaseType;

/// A row of column values, in column order.
pub type Row = IndexMap<String, FilterValue>;

/// A value that can be compared in a filter or bound as a SQL parameter.
///
/// `Null` doubles as the SQL null sentinel for parameter bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// JSON value.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// SQL-style comparison. Null never compares.
    fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Json(a), Self::Json(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(f)) if n.is_f64() => Self::Float(f),
                // u64 above i64::MAX stays exact
                _ => Self::Json(Value::Number(n)),
            },
            Value::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// A predicate over a single row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,
    /// Equals comparison.
    Equals(String, FilterValue),
    /// Not equals comparison.
    NotEquals(String, FilterValue),
    /// Less than comparison.
    Lt(String, FilterValue),
    /// Greater than comparison.
    Gt(String, FilterValue),
    /// In a list of values.
    In(String, Vec<FilterValue>),
    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),
    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an equality filter.
    pub fn equals(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Equals(column.into(), value.into())
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Create an AND filter.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    pub fn and_then(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Evaluate the filter against a row. Missing columns read as null.
    pub fn matches(&self, row: &Row) -> bool {
        let get = |col: &str| row.get(col).unwrap_or(&FilterValue::Null);
        match self {
            Self::None => true,
            Self::Equals(col, val) => {
                if val.is_null() {
                    get(col).is_null()
                } else {
                    get(col).compare(val) == Some(Ordering::Equal)
                }
            }
            Self::NotEquals(col, val) => {
                if val.is_null() {
                    !get(col).is_null()
                } else {
                    matches!(
                        get(col).compare(val),
                        Some(Ordering::Less | Ordering::Greater)
                    )
                }
            }
            Self::Lt(col, val) => get(col).compare(val) == Some(Ordering::Less),
            Self::Gt(col, val) => get(col).compare(val) == Some(Ordering::Greater),
            Self::In(col, values) => {
                let current = get(col);
                values.iter().any(|v| current.compare(v) == Some(Ordering::Equal))
            }
            Self::IsNull(col) => get(col).is_null(),
            Self::IsNotNull(col) => !get(col).is_null(),
            Self::And(filters) => filters.iter().all(|f| f.matches(row)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(row)),
            Self::Not(filter) => !filter.matches(row),
        }
    }

    /// Generate SQL for this filter with parameter placeholders.
    ///
    /// `param_offset` is the number of parameters already bound before this filter.
    /// Returns (sql, params) where params are the values to bind.
    pub fn to_sql(&self, param_offset: usize, db_type: DatabaseType) -> (String, Vec<FilterValue>) {
        let mut params = Vec::new();
        let sql = self.to_sql_with_params(param_offset, db_type, &mut params);
        (sql, params)
    }

    fn to_sql_with_params(
        &self,
        offset: usize,
        db_type: DatabaseType,
        params: &mut Vec<FilterValue>,
    ) -> String {
        let bind = |val: &FilterValue, params: &mut Vec<FilterValue>| {
            params.push(val.clone());
            db_type.placeholder(offset + params.len())
        };

        match self {
            Self::None => "1 = 1".to_string(),
            Self::Equals(col, val) => {
                if val.is_null() {
                    format!("{} IS NULL", col)
                } else {
                    format!("{} = {}", col, bind(val, params))
                }
            }
            Self::NotEquals(col, val) => {
                if val.is_null() {
                    format!("{} IS NOT NULL", col)
                } else {
                    format!("{} <> {}", col, bind(val, params))
                }
            }
            Self::Lt(col, val) => format!("{} < {}", col, bind(val, params)),
            Self::Gt(col, val) => format!("{} > {}", col, bind(val, params)),
            Self::In(col, values) => {
                if values.is_empty() {
                    return "1 = 0".to_string();
                }
                let placeholders: Vec<_> = values.iter().map(|v| bind(v, params)).collect();
                format!("{} IN ({})", col, placeholders.join(", "))
            }
            Self::IsNull(col) => format!("{} IS NULL", col),
            Self::IsNotNull(col) => format!("{} IS NOT NULL", col),
            Self::And(filters) => {
                let parts: Vec<_> = filters
                    .iter()
                    .map(|f| f.to_sql_with_params(offset, db_type, params))
                    .collect();
                format!("({})", parts.join(" AND "))
            }
            Self::Or(filters) => {
                let parts: Vec<_> = filters
                    .iter()
                    .map(|f| f.to_sql_with_params(offset, db_type, params))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
            Self::Not(filter) => {
                format!("NOT ({})", filter.to_sql_with_params(offset, db_type, params))
            }
        }
    }
}
