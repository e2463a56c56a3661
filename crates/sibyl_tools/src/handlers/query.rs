//! Ad-hoc SQL execution, the fixed account lookup, result profiling, and
//! plan inspection.

use crate::toolkit::Toolkit;
use anyhow::Result;
use serde_json::{json, Value};
use sibyl_core::classify::{classify_warehouse, format_error_response};
use sibyl_core::table::{format_as_table, DEFAULT_MAX_ROWS};
use std::collections::BTreeSet;

/// Execute a SQL statement written by the model. Failures come back as a
/// classified, readable error block instead of an Err so the model can
/// repair its SQL and retry.
pub async fn run_query(toolkit: &Toolkit, sql: &str) -> Result<String> {
    match toolkit.warehouse.query(sql, &[]).await {
        Ok(rows) => Ok(format_as_table(&rows, DEFAULT_MAX_ROWS)),
        Err(e) => {
            let text = e.to_string();
            let class = classify_warehouse(&text);
            Ok(format_error_response(&text, class, Some(sql)))
        }
    }
}

/// Deterministic account lookup. The SQL is fixed; the model only supplies
/// the account name, which travels as a bind parameter.
pub async fn account_lookup(toolkit: &Toolkit, account_name: &str) -> Result<String> {
    let wh = &toolkit.config.warehouse;
    let sql = format!(
        "SELECT * FROM {}.{}.FINANCIAL_SUMMARY WHERE ACCOUNT_NAME ILIKE ? LIMIT 1",
        wh.database, wh.schema
    );
    let pattern = json!(format!("%{}%", account_name));
    match toolkit.warehouse.query(&sql, &[pattern]).await {
        Ok(rows) if rows.is_empty() => Ok(format!(
            "I couldn't find any information for an account matching '{}'. \
             Please check the name and try again.",
            account_name
        )),
        Ok(rows) => Ok(format_as_table(&rows, DEFAULT_MAX_ROWS)),
        Err(_) => Ok(
            "I encountered an issue looking up that account. Please try again or contact support."
                .to_string(),
        ),
    }
}

/// Per-column statistics over a query's result set.
pub async fn profile_query(toolkit: &Toolkit, sql: &str) -> Result<String> {
    let rows = match toolkit.warehouse.query(sql, &[]).await {
        Ok(rows) => rows,
        Err(e) => return Ok(format!("Error profiling data: {}", e)),
    };
    if rows.is_empty() {
        return Ok("No data to profile".to_string());
    }

    let mut columns = serde_json::Map::new();
    for name in rows[0].keys() {
        let values: Vec<&Value> = rows.iter().map(|r| r.get(name).unwrap_or(&Value::Null)).collect();
        let non_null: Vec<String> = values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| cell_string(v))
            .collect();
        let null_count = values.len() - non_null.len();
        let distinct: BTreeSet<&String> = non_null.iter().collect();
        let samples: Vec<&String> = distinct.iter().take(5).copied().collect();
        columns.insert(
            name.clone(),
            json!({
                "non_null_count": non_null.len(),
                "null_count": null_count,
                "null_percentage": (null_count as f64 / values.len() as f64 * 10000.0).round() / 100.0,
                "distinct_count": distinct.len(),
                "sample_values": samples,
            }),
        );
    }

    let profile = json!({ "total_rows": rows.len(), "columns": columns });
    Ok(serde_json::to_string_pretty(&profile)?)
}

/// Show the execution plan for a statement without running it.
pub async fn explain_query(toolkit: &Toolkit, sql: &str) -> Result<String> {
    match toolkit.warehouse.explain(sql).await {
        Ok(rows) => {
            let plan = format_as_table(&rows, DEFAULT_MAX_ROWS);
            Ok(format!(
                "Query Execution Plan:\n\n{}\n\nNote: Use this plan to estimate complexity. \
                 Large scans and joins may incur higher costs.",
                plan
            ))
        }
        Err(e) => Ok(format!("Error getting query plan: {}", e)),
    }
}

fn cell_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_query_renders_table() {
        let wh = Arc::new(FakeWarehouse::new(vec![Ok(vec![row(&[
            ("ACCOUNT_NAME", json!("Acme")),
            ("REVENUE", json!(125000)),
        ])])]));
        let (tk, _dir) = toolkit_with(wh, Arc::new(FakeSheetStore::new(Default::default())), Arc::new(FakeMailer::default()));
        let out = run_query(&tk, "SELECT * FROM FINANCIAL_SUMMARY").await.unwrap();
        assert!(out.contains("ACCOUNT_NAME"));
        assert!(out.contains("Acme"));
        assert!(out.contains("*1 rows*"));
    }

    #[tokio::test]
    async fn test_run_query_classifies_failure() {
        let wh = Arc::new(FakeWarehouse::new(vec![Err(anyhow::anyhow!(
            "SQL compilation error: invalid identifier 'REVENUE'"
        ))]));
        let (tk, _dir) = toolkit_with(wh, Arc::new(FakeSheetStore::new(Default::default())), Arc::new(FakeMailer::default()));
        let out = run_query(&tk, "SELECT REVENUE FROM T").await.unwrap();
        assert!(out.contains("SQLSyntaxError"));
        assert!(out.contains("SELECT REVENUE FROM T"));
    }

    #[tokio::test]
    async fn test_account_lookup_binds_pattern() {
        let wh = Arc::new(FakeWarehouse::new(vec![Ok(vec![row(&[(
            "ACCOUNT_NAME",
            json!("Acme Corp"),
        )])])]));
        let (tk, _dir) = toolkit_with(wh.clone(), Arc::new(FakeSheetStore::new(Default::default())), Arc::new(FakeMailer::default()));
        let out = account_lookup(&tk, "acme").await.unwrap();
        assert!(out.contains("Acme Corp"));
        let statements = wh.statements();
        assert!(statements[0].0.contains("ILIKE ?"));
        assert_eq!(statements[0].1, vec![json!("%acme%")]);
    }

    #[tokio::test]
    async fn test_account_lookup_not_found() {
        let wh = Arc::new(FakeWarehouse::new(vec![Ok(vec![])]));
        let (tk, _dir) = toolkit_with(wh, Arc::new(FakeSheetStore::new(Default::default())), Arc::new(FakeMailer::default()));
        let out = account_lookup(&tk, "ghost").await.unwrap();
        assert!(out.contains("couldn't find"));
        assert!(out.contains("ghost"));
    }

    #[tokio::test]
    async fn test_profile_counts_nulls_and_distincts() {
        let wh = Arc::new(FakeWarehouse::new(vec![Ok(vec![
            row(&[("REGION", json!("EU"))]),
            row(&[("REGION", json!("EU"))]),
            row(&[("REGION", Value::Null)]),
            row(&[("REGION", json!("US"))]),
        ])]));
        let (tk, _dir) = toolkit_with(wh, Arc::new(FakeSheetStore::new(Default::default())), Arc::new(FakeMailer::default()));
        let out = profile_query(&tk, "SELECT REGION FROM T").await.unwrap();
        let profile: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(profile["total_rows"], json!(4));
        assert_eq!(profile["columns"]["REGION"]["null_count"], json!(1));
        assert_eq!(profile["columns"]["REGION"]["distinct_count"], json!(2));
        assert_eq!(profile["columns"]["REGION"]["null_percentage"], json!(25.0));
    }

    #[tokio::test]
    async fn test_profile_empty_result() {
        let wh = Arc::new(FakeWarehouse::new(vec![Ok(vec![])]));
        let (tk, _dir) = toolkit_with(wh, Arc::new(FakeSheetStore::new(Default::default())), Arc::new(FakeMailer::default()));
        let out = profile_query(&tk, "SELECT 1 WHERE FALSE").await.unwrap();
        assert_eq!(out, "No data to profile");
    }

    #[tokio::test]
    async fn test_explain_appends_cost_note() {
        let wh = Arc::new(FakeWarehouse::new(vec![Ok(vec![row(&[(
            "operation",
            json!("TableScan"),
        )])])]));
        let (tk, _dir) = toolkit_with(wh, Arc::new(FakeSheetStore::new(Default::default())), Arc::new(FakeMailer::default()));
        let out = explain_query(&tk, "SELECT * FROM T").await.unwrap();
        assert!(out.starts_with("Query Execution Plan:"));
        assert!(out.contains("TableScan"));
        assert!(out.contains("estimate complexity"));
    }
}
