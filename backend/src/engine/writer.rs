use crate::engine::db::{quote_ident, to_sql_value, DELETED_COLUMN};
use crate::engine::error::{GridError, Result};
use common::model::schema::{DatasetSchema, FieldSchema, FieldType};
use common::model::value::{Record, Scalar};
use log::{debug, warn};
use rusqlite::{params_from_iter, Connection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted { row_id: i64 },
    Updated { rows: usize },
}

impl SaveOutcome {
    /// False for an update whose identifier matched no row.
    pub fn wrote_row(self) -> bool {
        match self {
            SaveOutcome::Inserted { .. } => true,
            SaveOutcome::Updated { rows } => rows > 0,
        }
    }
}

/// Checks `data` against the schema and returns the values to write.
///
/// Fields are visited in schema order and the first violation wins. Keys the
/// schema does not declare are dropped, and so is the primary key: the
/// record id travels separately.
pub fn validate(schema: &DatasetSchema, record_id: Option<&Scalar>, data: &Record) -> Result<Record> {
    let is_insert = !record_id.is_some_and(Scalar::is_identifier);
    let mut writable = Record::new();

    for field in &schema.fields {
        if field.name == schema.primary_key {
            continue;
        }
        match data.get(&field.name) {
            Some(value) => {
                if field.mandatory && value.is_blank() {
                    return Err(mandatory_violation(field));
                }
                writable.insert(field.name.clone(), normalize(field, value)?);
            }
            None if field.mandatory && is_insert => return Err(mandatory_violation(field)),
            None => {}
        }
    }

    for key in data.keys().filter(|k| schema.field(k).is_none()) {
        warn!(
            "Dropping undeclared field '{}' submitted for module '{}'",
            key, schema.module
        );
    }

    if writable.is_empty() {
        return Err(GridError::Validation("Nothing to save".into()));
    }
    Ok(writable)
}

fn mandatory_violation(field: &FieldSchema) -> GridError {
    GridError::Validation(format!("Field '{}' is mandatory!", field.label()))
}

/// Per-type coercion of a submitted value into its stored form.
fn normalize(field: &FieldSchema, value: &Scalar) -> Result<Scalar> {
    match field.field_type {
        FieldType::Numeric | FieldType::HiddenNumeric => {
            if value.is_blank() {
                return Ok(Scalar::Null);
            }
            match value {
                Scalar::Integer(_) | Scalar::Real(_) => Ok(value.clone()),
                Scalar::Bool(b) => Ok(Scalar::Integer(i64::from(*b))),
                _ => parse_number(&value.to_text()).ok_or_else(|| {
                    GridError::Validation(format!(
                        "Field '{}' must be a valid number!",
                        field.label()
                    ))
                }),
            }
        }
        FieldType::Checkbox => Ok(match value {
            Scalar::Bool(b) => Scalar::Integer(i64::from(*b)),
            Scalar::Text(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Scalar::Integer(1),
                "" | "0" | "false" | "off" | "no" => Scalar::Integer(0),
                _ => value.clone(),
            },
            _ => value.clone(),
        }),
        FieldType::Hidden if value.is_blank() => Ok(Scalar::Null),
        FieldType::Text
        | FieldType::Textarea
        | FieldType::Date
        | FieldType::Datetime
        | FieldType::Select
        | FieldType::Autocomplete
        | FieldType::Hidden => Ok(value.clone()),
    }
}

/// Parses a number, accepting a decimal comma.
pub fn parse_number(raw: &str) -> Option<Scalar> {
    let normalized = raw.trim().replace(',', ".");
    if let Ok(int) = normalized.parse::<i64>() {
        return Some(Scalar::Integer(int));
    }
    normalized
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Scalar::Real)
}

/// Validates and writes a record: update when `record_id` names a record,
/// insert otherwise.
pub fn save(
    conn: &Connection,
    schema: &DatasetSchema,
    record_id: Option<&Scalar>,
    data: &Record,
) -> Result<SaveOutcome> {
    let writable = validate(schema, record_id, data)?;
    let table = quote_ident(schema.write_table());
    let mut params: Vec<_> = writable.values().map(to_sql_value).collect();

    match record_id.filter(|id| id.is_identifier()) {
        Some(id) => {
            let assignments = writable
                .keys()
                .map(|k| format!("{} = ?", quote_ident(k)))
                .collect::<Vec<_>>()
                .join(", ");
            params.push(to_sql_value(id));
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                table,
                assignments,
                quote_ident(&schema.primary_key)
            );
            let rows = conn.execute(&sql, params_from_iter(params.iter()))?;
            debug!("Updated {} row(s) in {} for id {:?}", rows, table, id);
            Ok(SaveOutcome::Updated { rows })
        }
        None => {
            let columns = writable
                .keys()
                .map(|k| quote_ident(k))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = vec!["?"; writable.len()].join(", ");
            let sql = format!("INSERT INTO {} ({}) VALUES ({})", table, columns, placeholders);
            conn.execute(&sql, params_from_iter(params.iter()))?;
            Ok(SaveOutcome::Inserted {
                row_id: conn.last_insert_rowid(),
            })
        }
    }
}

/// Soft-deletes a record. Deleting an already deleted record succeeds.
pub fn delete(conn: &Connection, schema: &DatasetSchema, record_id: Option<&Scalar>) -> Result<usize> {
    let id = record_id
        .filter(|id| id.is_identifier())
        .ok_or_else(|| GridError::Validation("Missing record id".into()))?;
    let sql = format!(
        "UPDATE {} SET {} = 1 WHERE {} = ?",
        quote_ident(schema.write_table()),
        quote_ident(DELETED_COLUMN),
        quote_ident(&schema.primary_key)
    );
    Ok(conn.execute(&sql, [to_sql_value(id)])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::predicate::Predicate;
    use crate::engine::query::{self, ListParams};
    use crate::engine::testing;

    fn record(pairs: &[(&str, Scalar)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn blank_mandatory_field_rejects_without_writing() {
        let conn = testing::demo_connection();
        let schema = testing::registry().dataset("invoices").unwrap();
        let data = record(&[("invoice_no", "   ".into()), ("customer_name", "acme".into())]);

        let err = save(&conn, &schema, None, &data).unwrap_err();
        assert!(matches!(err, GridError::Validation(ref m) if m.contains("Invoice #")));
        assert_eq!(count(&conn, "demo_invoices"), 0);

        let err = save(&conn, &schema, Some(&Scalar::Integer(1)), &data).unwrap_err();
        assert!(matches!(err, GridError::Validation(_)));
    }

    #[test]
    fn missing_mandatory_field_only_blocks_inserts() {
        let conn = testing::demo_connection();
        let schema = testing::registry().dataset("invoices").unwrap();
        let partial = record(&[("customer_name", "globex".into())]);

        assert!(matches!(
            save(&conn, &schema, None, &partial),
            Err(GridError::Validation(_))
        ));
        assert!(matches!(
            save(&conn, &schema, Some(&Scalar::Text("0".into())), &partial),
            Err(GridError::Validation(_))
        ));

        let id = match save(&conn, &schema, None, &record(&[("invoice_no", "A-1".into())])).unwrap() {
            SaveOutcome::Inserted { row_id } => row_id,
            other => panic!("expected insert, got {:?}", other),
        };
        let outcome = save(&conn, &schema, Some(&Scalar::Integer(id)), &partial).unwrap();
        assert_eq!(outcome, SaveOutcome::Updated { rows: 1 });
        let customer: String = conn
            .query_row("SELECT customer_name FROM demo_invoices WHERE id = ?1", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(customer, "globex");
    }

    #[test]
    fn decimal_comma_is_accepted_and_garbage_rejected() {
        let conn = testing::demo_connection();
        let schema = testing::registry().dataset("invoice_items").unwrap();

        save(&conn, &schema, None, &record(&[("qty", "3,14".into()), ("price", "".into())])).unwrap();
        let (qty, price): (f64, Option<f64>) = conn
            .query_row("SELECT qty, price FROM demo_invoice_items", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert!((qty - 3.14).abs() < f64::EPSILON);
        assert_eq!(price, None);

        let err = save(&conn, &schema, None, &record(&[("qty", "abc".into())])).unwrap_err();
        assert!(matches!(err, GridError::Validation(ref m) if m.contains("Qty")));
        assert_eq!(count(&conn, "demo_invoice_items"), 1);
    }

    #[test]
    fn undeclared_fields_are_dropped_and_empty_saves_refused() {
        let conn = testing::demo_connection();
        let schema = testing::registry().dataset("invoice_items").unwrap();
        let data = record(&[("product_name", "Widget".into()), ("del", Scalar::Integer(1))]);
        save(&conn, &schema, None, &data).unwrap();
        let del: i64 = conn
            .query_row("SELECT del FROM demo_invoice_items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(del, 0);

        let only_unknown = record(&[("bogus", "x".into())]);
        assert!(matches!(
            save(&conn, &schema, None, &only_unknown),
            Err(GridError::Validation(_))
        ));
    }

    #[test]
    fn checkbox_values_are_stored_as_flags() {
        let conn = testing::demo_connection();
        let schema = testing::registry().dataset("invoices").unwrap();
        save(
            &conn,
            &schema,
            None,
            &record(&[("invoice_no", "A-9".into()), ("is_paid", Scalar::Bool(true))]),
        )
        .unwrap();
        let paid: i64 = conn
            .query_row("SELECT is_paid FROM demo_invoices", [], |r| r.get(0))
            .unwrap();
        assert_eq!(paid, 1);
    }

    #[test]
    fn delete_twice_is_stable_and_hidden_from_lists() {
        let conn = testing::demo_connection();
        let schema = testing::registry().dataset("invoices").unwrap();
        save(&conn, &schema, None, &record(&[("invoice_no", "A-1".into())])).unwrap();
        save(&conn, &schema, None, &record(&[("invoice_no", "A-2".into())])).unwrap();

        let id = Scalar::Text("1".into());
        assert_eq!(delete(&conn, &schema, Some(&id)).unwrap(), 1);
        assert_eq!(delete(&conn, &schema, Some(&id)).unwrap(), 1);
        assert_eq!(count(&conn, "demo_invoices"), 2);

        let params = ListParams {
            table: schema.table_name.clone(),
            ..ListParams::default()
        };
        let rows = query::list(&conn, &schema, &Predicate::default(), &params)
            .unwrap()
            .into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("invoice_no"), Some(&Scalar::Text("A-2".into())));

        assert!(matches!(
            delete(&conn, &schema, None),
            Err(GridError::Validation(_))
        ));
    }

    #[test]
    fn blank_primary_key_in_data_still_inserts() {
        let conn = testing::demo_connection();
        let schema = testing::registry().dataset("invoices").unwrap();
        let data = record(&[
            ("id", "".into()),
            ("invoice_no", "A-1".into()),
            ("customer_name", "acme".into()),
        ]);

        let outcome = save(&conn, &schema, Some(&Scalar::Text("".into())), &data).unwrap();
        assert_eq!(outcome, SaveOutcome::Inserted { row_id: 1 });

        let edited = record(&[("id", "1".into()), ("invoice_no", "A-1b".into())]);
        let outcome = save(&conn, &schema, Some(&Scalar::Text("1".into())), &edited).unwrap();
        assert_eq!(outcome, SaveOutcome::Updated { rows: 1 });
        let no: String = conn
            .query_row("SELECT invoice_no FROM demo_invoices WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(no, "A-1b");
    }

    #[test]
    fn blank_hidden_values_are_stored_as_null() {
        let conn = testing::demo_connection();
        let schema = testing::registry().dataset("invoice_items").unwrap();
        let data = record(&[("invoice_id", " ".into()), ("product_name", "Widget".into())]);
        save(&conn, &schema, None, &data).unwrap();
        let invoice: Option<i64> = conn
            .query_row("SELECT invoice_id FROM demo_invoice_items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(invoice, None);

        let field: FieldSchema = serde_json::from_str(r#"{"name": "ref", "type": "hidden"}"#).unwrap();
        assert_eq!(normalize(&field, &Scalar::Text("".into())).unwrap(), Scalar::Null);
        assert_eq!(
            normalize(&field, &Scalar::Text("x".into())).unwrap(),
            Scalar::Text("x".into())
        );
    }

    #[test]
    fn parse_number_handles_integers_and_reals() {
        assert_eq!(parse_number(" 42 "), Some(Scalar::Integer(42)));
        assert_eq!(parse_number("3,14"), Some(Scalar::Real(3.14)));
        assert_eq!(parse_number("1,2,3"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("abc"), None);
    }
}
