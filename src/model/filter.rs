// src/model/filter.rs
//! Bitable filter formulas.
//!
//! Records are filtered with formula strings such as
//! `AND(CurrentValue.[Status].contains("Open"),CurrentValue.[Owner]!="")`.
//! Clauses are emitted in the order keys were inserted.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// Comparison applied to each value of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterOperator {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    #[default]
    Contains,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Ge => "=>",
            Self::Gt => ">",
            Self::Contains => "contains",
        }
    }
}

/// How clauses are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterRelation {
    #[default]
    And,
    Or,
}

impl fmt::Display for FilterRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

/// The value(s) one key is matched against.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    One(Value),
    /// One clause per value.
    Many(Vec<Value>),
    /// Contributes no clause.
    Null,
}

impl FilterValue {
    fn values(&self) -> &[Value] {
        match self {
            Self::One(Value::Null) | Self::Null => &[],
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::One(Value::from(value))
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::One(Value::from(value))
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::One(Value::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::One(Value::from(value))
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::One(Value::from(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Key to value(s) criteria, kept in insertion order.
pub type FilterMap = IndexMap<String, FilterValue>;

/// Builds a [`FilterMap`] from `(key, value)` pairs.
pub fn filter_map<K, V, I>(entries: I) -> FilterMap
where
    K: Into<String>,
    V: Into<FilterValue>,
    I: IntoIterator<Item = (K, V)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn contains_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Encodes `data` as one formula.
///
/// Each value of each key becomes one clause. A single clause is returned
/// bare; several are wrapped as `RELATION(c1,c2,...)`. `None` when no
/// clause was produced.
pub fn make_simple_filter(
    data: &FilterMap,
    operator: FilterOperator,
    relation: FilterRelation,
) -> Option<String> {
    let clauses: Vec<String> = data
        .iter()
        .flat_map(|(key, value)| {
            value.values().iter().map(move |item| match operator {
                FilterOperator::Contains => {
                    format!("CurrentValue.[{}].contains(\"{}\")", key, contains_text(item))
                }
                _ => format!("CurrentValue.[{}]{}{}", key, operator.as_str(), item),
            })
        })
        .collect();

    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => Some(format!("{}({})", relation, clauses.join(","))),
    }
}

/// Combines a required-keys guard with the caller's criteria.
///
/// The guard (`key != ""` for every required key) always comes first;
/// the two parts are joined with `&&`.
pub fn make_filter(required_keys: &[String], filter: &FilterMap) -> Option<String> {
    let guard: FilterMap = required_keys
        .iter()
        .map(|key| (key.clone(), FilterValue::from("")))
        .collect();
    let parts: Vec<String> = [
        make_simple_filter(&guard, FilterOperator::Ne, FilterRelation::And),
        make_simple_filter(filter, FilterOperator::Contains, FilterRelation::And),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("&&"))
    }
}
