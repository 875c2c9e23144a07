//! Record filters for `Store::list`.
//!
//! A filter is plain data: a map from field name to a list of
//! `{value, operator}` items that must all hold for a record to match.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Comparison operators accepted by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    InList,
    NotInList,
}

impl Operator {
    /// Evaluate `field <op> operand`.
    ///
    /// Ordering operators only compare numbers with numbers and strings with
    /// strings; any other pairing is false.
    pub fn apply(self, field: &Value, operand: &Value) -> bool {
        match self {
            Operator::EqualTo => values_equal(field, operand),
            Operator::NotEqualTo => !values_equal(field, operand),
            Operator::GreaterThan => compare(field, operand) == Some(Ordering::Greater),
            Operator::GreaterThanOrEqual => matches!(
                compare(field, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::LessThan => compare(field, operand) == Some(Ordering::Less),
            Operator::LessThanOrEqual => matches!(
                compare(field, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::InList => operand
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(field, item))),
            Operator::NotInList => operand
                .as_array()
                .is_some_and(|items| !items.iter().any(|item| values_equal(field, item))),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A single condition on a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    pub value: Value,
    pub operator: Operator,
}

/// Conditions keyed by field name. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(BTreeMap<String, Vec<FilterItem>>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on `field`. Multiple conditions on one field are ANDed.
    pub fn with(mut self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.0.entry(field.into()).or_default().push(FilterItem {
            value: value.into(),
            operator,
        });
        self
    }

    /// Shorthand for an `EQUAL_TO` condition.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Operator::EqualTo, value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check a record against every condition. A record missing a filtered
    /// field does not match.
    pub fn matches(&self, record: &Value) -> bool {
        self.0.iter().all(|(field, items)| match record.get(field) {
            Some(value) if !value.is_null() => {
                items.iter().all(|item| item.operator.apply(value, &item.value))
            }
            _ => false,
        })
    }
}
