use crate::engine::db::{not_deleted, query_records, quote_ident};
use crate::engine::error::{GridError, Result};
use crate::engine::predicate::Predicate;
use common::model::schema::DatasetSchema;
use common::model::value::Record;
use common::responses::ListResponse;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    /// `DESC` in any case sorts descending; anything else ascending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(dir) if dir.trim().eq_ignore_ascii_case("desc") => SortDir::Desc,
            _ => SortDir::Asc,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub limit: u64,
}

impl Page {
    /// Pagination applies only when both values are positive and the
    /// request is not an export.
    pub fn from_request(page: Option<u64>, limit: Option<u64>, export: bool) -> Option<Self> {
        if export {
            return None;
        }
        match (page, limit) {
            (Some(number), Some(limit)) if number > 0 && limit > 0 => Some(Page { number, limit }),
            _ => None,
        }
    }

    pub fn offset(self) -> u64 {
        (self.number - 1).saturating_mul(self.limit)
    }
}

/// SQLite integers are signed; larger values clamp to the maximum.
fn sql_integer(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub table: String,
    pub sort: Option<String>,
    pub dir: SortDir,
    pub page: Option<Page>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListResult {
    Page { rows: Vec<Record>, total: u64 },
    All(Vec<Record>),
}

impl ListResult {
    /// Degraded result returned when the store fails.
    pub fn empty(paginated: bool) -> Self {
        if paginated {
            ListResult::Page {
                rows: Vec::new(),
                total: 0,
            }
        } else {
            ListResult::All(Vec::new())
        }
    }

    pub fn rows(&self) -> &[Record] {
        match self {
            ListResult::Page { rows, .. } | ListResult::All(rows) => rows,
        }
    }

    pub fn into_rows(self) -> Vec<Record> {
        match self {
            ListResult::Page { rows, .. } | ListResult::All(rows) => rows,
        }
    }
}

impl From<ListResult> for ListResponse {
    fn from(result: ListResult) -> Self {
        match result {
            ListResult::Page { rows, total } => ListResponse::Page {
                pagination: true,
                data: rows,
                total,
            },
            ListResult::All(rows) => ListResponse::Flat(rows),
        }
    }
}

/// Picks the table a read targets: the dataset's own table unless the caller
/// named its edit table explicitly. Any other table is refused.
pub fn resolve_table<'a>(schema: &'a DatasetSchema, requested: Option<&'a str>) -> Result<&'a str> {
    match requested.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(&schema.table_name),
        Some(table) if schema.declares_table(table) => Ok(table),
        Some(table) => Err(GridError::Configuration(format!(
            "Table '{}' is not declared for module '{}'",
            table, schema.module
        ))),
    }
}

pub fn list(
    conn: &Connection,
    schema: &DatasetSchema,
    predicate: &Predicate,
    params: &ListParams,
) -> Result<ListResult> {
    let table = resolve_table(schema, Some(&params.table))?;
    let fragment = predicate.to_sql();

    let mut where_sql = format!("WHERE {}", not_deleted());
    if !fragment.sql.is_empty() {
        where_sql.push_str(" AND ");
        where_sql.push_str(&fragment.sql);
    }

    let order_sql = match params.sort.as_deref() {
        Some(sort) if schema.field(sort).is_some() => {
            format!(" ORDER BY {} {}", quote_ident(sort), params.dir.as_sql())
        }
        Some(sort) => {
            debug!("Ignoring sort on undeclared field '{}'", sort);
            String::new()
        }
        None => String::new(),
    };

    let from_sql = format!("FROM {} {}", quote_ident(table), where_sql);

    match params.page {
        Some(page) => {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) {}", from_sql),
                params_from_iter(fragment.params.iter()),
                |row| row.get(0),
            )?;
            let mut bound = fragment.params.clone();
            bound.push(Value::Integer(sql_integer(page.limit)));
            bound.push(Value::Integer(sql_integer(page.offset())));
            let rows = query_records(
                conn,
                &format!("SELECT * {}{} LIMIT ? OFFSET ?", from_sql, order_sql),
                &bound,
            )?;
            Ok(ListResult::Page {
                rows,
                total: total.max(0) as u64,
            })
        }
        None => {
            let rows = query_records(
                conn,
                &format!("SELECT * {}{}", from_sql, order_sql),
                &fragment.params,
            )?;
            Ok(ListResult::All(rows))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing;
    use common::model::filter::FilterValue;
    use common::model::value::Scalar;
    use std::collections::BTreeMap;

    fn seed_invoices(conn: &Connection, count: usize) {
        for i in 1..=count {
            conn.execute(
                "INSERT INTO demo_invoices (invoice_no, customer_name, is_paid) VALUES (?1, 'acme', 1)",
                [format!("INV-{:02}", i)],
            )
            .unwrap();
        }
    }

    fn params(page: Option<Page>) -> ListParams {
        ListParams {
            table: "demo_invoices".into(),
            sort: Some("invoice_no".into()),
            dir: SortDir::Asc,
            page,
        }
    }

    #[test]
    fn second_page_returns_remainder_and_total() {
        let conn = testing::demo_connection();
        seed_invoices(&conn, 15);
        let schema = testing::registry().dataset("invoices").unwrap();
        let predicate = Predicate::default();

        let page = Page::from_request(Some(2), Some(10), false);
        match list(&conn, &schema, &predicate, &params(page)).unwrap() {
            ListResult::Page { rows, total } => {
                assert_eq!(rows.len(), 5);
                assert_eq!(total, 15);
                assert_eq!(rows[0].get("invoice_no"), Some(&Scalar::Text("INV-11".into())));
            }
            other => panic!("expected a page, got {:?}", other),
        }

        let export = Page::from_request(Some(2), Some(10), true);
        assert_eq!(export, None);
        let all = list(&conn, &schema, &predicate, &params(export)).unwrap();
        assert!(matches!(all, ListResult::All(ref rows) if rows.len() == 15));
    }

    #[test]
    fn oversized_page_values_clamp_instead_of_wrapping() {
        let conn = testing::demo_connection();
        seed_invoices(&conn, 3);
        let schema = testing::registry().dataset("invoices").unwrap();
        let predicate = Predicate::default();

        let huge_limit = Page::from_request(Some(1), Some(u64::MAX), false);
        match list(&conn, &schema, &predicate, &params(huge_limit)).unwrap() {
            ListResult::Page { rows, total } => {
                assert_eq!(rows.len(), 3);
                assert_eq!(total, 3);
            }
            other => panic!("expected a page, got {:?}", other),
        }

        let far_page = Page::from_request(Some(u64::MAX), Some(u64::MAX), false);
        match list(&conn, &schema, &predicate, &params(far_page)).unwrap() {
            ListResult::Page { rows, total } => {
                assert!(rows.is_empty());
                assert_eq!(total, 3);
            }
            other => panic!("expected a page, got {:?}", other),
        }
        assert_eq!(sql_integer(u64::MAX), i64::MAX);
        assert_eq!(sql_integer(10), 10);
    }

    #[test]
    fn soft_deleted_rows_are_never_listed() {
        let conn = testing::demo_connection();
        seed_invoices(&conn, 3);
        conn.execute("UPDATE demo_invoices SET del = 1 WHERE id = 2", [])
            .unwrap();
        let schema = testing::registry().dataset("invoices").unwrap();

        let page = Page::from_request(Some(1), Some(10), false);
        match list(&conn, &schema, &Predicate::default(), &params(page)).unwrap() {
            ListResult::Page { rows, total } => {
                assert_eq!(total, 2);
                assert!(rows.iter().all(|r| r.get("id") != Some(&Scalar::Integer(2))));
            }
            other => panic!("expected a page, got {:?}", other),
        }
    }

    #[test]
    fn sort_on_unknown_field_is_ignored_and_desc_is_honoured() {
        let conn = testing::demo_connection();
        seed_invoices(&conn, 3);
        let schema = testing::registry().dataset("invoices").unwrap();

        let mut p = params(None);
        p.sort = Some("invoice_no".into());
        p.dir = SortDir::parse(Some("desc"));
        let rows = list(&conn, &schema, &Predicate::default(), &p).unwrap().into_rows();
        assert_eq!(rows[0].get("invoice_no"), Some(&Scalar::Text("INV-03".into())));

        p.sort = Some("id; DROP TABLE demo_invoices".into());
        let rows = list(&conn, &schema, &Predicate::default(), &p).unwrap().into_rows();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn filters_apply_to_count_and_rows() {
        let conn = testing::demo_connection();
        seed_invoices(&conn, 4);
        conn.execute("UPDATE demo_invoices SET customer_name = 'globex' WHERE id > 2", [])
            .unwrap();
        let schema = testing::registry().dataset("invoices").unwrap();
        let filters: BTreeMap<String, FilterValue> =
            serde_json::from_str(r#"{"customer_name": "GLOB"}"#).unwrap();
        let predicate = Predicate::build(&schema, &filters);

        let page = Page::from_request(Some(1), Some(1), false);
        match list(&conn, &schema, &predicate, &params(page)).unwrap() {
            ListResult::Page { rows, total } => {
                assert_eq!(total, 2);
                assert_eq!(rows.len(), 1);
            }
            other => panic!("expected a page, got {:?}", other),
        }
    }

    #[test]
    fn undeclared_table_is_refused() {
        let schema = testing::registry().dataset("invoices").unwrap();
        assert_eq!(resolve_table(&schema, None).unwrap(), "demo_invoices");
        assert!(matches!(
            resolve_table(&schema, Some("sqlite_master")),
            Err(GridError::Configuration(_))
        ));
    }
}
