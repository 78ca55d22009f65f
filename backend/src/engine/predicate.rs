//! Turns client filters into a conjunctive, schema-restricted predicate.
//!
//! Only field names declared by the dataset survive; the filter shape decides
//! the operator:
//!
//! - range `{start, end}` becomes `>=` / `<=` bounds, with a date-only end
//!   widened to the last second of that day,
//! - a list becomes `IN (...)`, an empty list meaning no restriction,
//! - a scalar becomes an exact match or a case-insensitive substring match
//!   depending on the field type.

use crate::engine::db::{quote_ident, to_sql_value, FOLD_FUNCTION};
use chrono::NaiveDate;
use common::model::filter::{FilterValue, RangeBounds};
use common::model::schema::{DatasetSchema, FieldSchema, ScalarMatch};
use common::model::value::Scalar;
use log::debug;
use rusqlite::types::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    AtLeast { field: String, value: Scalar },
    AtMost { field: String, value: Scalar },
    OneOf { field: String, values: Vec<Scalar> },
    Equals { field: String, value: Scalar },
    Contains { field: String, needle: String },
}

/// SQL text with `?` placeholders and the values bound to them, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub fn build(schema: &DatasetSchema, filters: &BTreeMap<String, FilterValue>) -> Self {
        let mut conditions = Vec::new();
        for (name, filter) in filters {
            let Some(field) = schema.field(name) else {
                debug!("Dropping filter on undeclared field '{}'", name);
                continue;
            };
            match filter {
                FilterValue::Range(bounds) => push_range(&mut conditions, field, bounds),
                FilterValue::Multi(values) => {
                    if !values.is_empty() {
                        conditions.push(Condition::OneOf {
                            field: field.name.clone(),
                            values: values.clone(),
                        });
                    }
                }
                FilterValue::Scalar(value) => {
                    if value.is_blank() {
                        continue;
                    }
                    let condition = match field.field_type.scalar_match() {
                        ScalarMatch::Exact => Condition::Equals {
                            field: field.name.clone(),
                            value: value.clone(),
                        },
                        ScalarMatch::Contains => Condition::Contains {
                            field: field.name.clone(),
                            needle: value.to_text().into_owned(),
                        },
                    };
                    conditions.push(condition);
                }
            }
        }
        Predicate { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Renders the conditions joined by `AND`; empty when there are none.
    pub fn to_sql(&self) -> SqlFragment {
        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut params = Vec::new();
        for condition in &self.conditions {
            match condition {
                Condition::AtLeast { field, value } => {
                    clauses.push(format!("{} >= ?", quote_ident(field)));
                    params.push(to_sql_value(value));
                }
                Condition::AtMost { field, value } => {
                    clauses.push(format!("{} <= ?", quote_ident(field)));
                    params.push(to_sql_value(value));
                }
                Condition::OneOf { field, values } => {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} IN ({})", quote_ident(field), placeholders));
                    params.extend(values.iter().map(to_sql_value));
                }
                Condition::Equals { field, value } => {
                    clauses.push(format!("{} = ?", quote_ident(field)));
                    params.push(to_sql_value(value));
                }
                Condition::Contains { field, needle } => {
                    clauses.push(format!(
                        "{}({}) LIKE ? ESCAPE '\\'",
                        FOLD_FUNCTION,
                        quote_ident(field)
                    ));
                    params.push(Value::Text(format!(
                        "%{}%",
                        escape_like(&needle.to_lowercase())
                    )));
                }
            }
        }
        SqlFragment {
            sql: clauses.join(" AND "),
            params,
        }
    }
}

fn push_range(conditions: &mut Vec<Condition>, field: &FieldSchema, bounds: &RangeBounds) {
    if let Some(start) = bounds.start.as_ref().filter(|v| !v.is_blank()) {
        conditions.push(Condition::AtLeast {
            field: field.name.clone(),
            value: start.clone(),
        });
    }
    if let Some(end) = bounds.end.as_ref().filter(|v| !v.is_blank()) {
        conditions.push(Condition::AtMost {
            field: field.name.clone(),
            value: widen_to_end_of_day(end),
        });
    }
}

/// A bare `YYYY-MM-DD` upper bound covers the whole day.
fn widen_to_end_of_day(end: &Scalar) -> Scalar {
    if let Scalar::Text(raw) = end {
        let raw = raw.trim();
        if raw.len() == 10 {
            if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                return Scalar::Text(format!("{} 23:59:59", date.format("%Y-%m-%d")));
            }
        }
    }
    end.clone()
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
