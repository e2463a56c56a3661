//! Catalogue discovery and table exploration. These feed the model's
//! orientation phase; their output is meant to be read by the model, not
//! shown verbatim to the user.

use crate::resolver::{resolve_table, Resolution};
use crate::toolkit::Toolkit;
use anyhow::Result;
use serde_json::Value;
use sibyl_core::classify::{classify_warehouse, format_error_response};
use sibyl_core::table::{format_as_table, Row, DEFAULT_MAX_ROWS};

async fn resolve(toolkit: &Toolkit, table_name: &str) -> Result<Resolution> {
    let wh = &toolkit.config.warehouse;
    resolve_table(toolkit.warehouse.as_ref(), &wh.database, &wh.schema, table_name).await
}

fn resolution_miss_message(resolution: &Resolution) -> Option<String> {
    match resolution {
        Resolution::Table { .. } => None,
        Resolution::Schema { name } => Some(format!(
            "'{}' is a schema, not a table. Use list_tables(\"{}\") to see its tables.",
            name, name
        )),
        Resolution::Database { name } => Some(format!(
            "'{}' is a database, not a table. Use list_schemas(\"{}\") to see its schemas.",
            name, name
        )),
        Resolution::NotFound { input, suggestions } => {
            let mut msg = format!("❌ Table '{}' not found.\n\nTry:\n", input);
            for (i, tool) in suggestions.iter().enumerate() {
                msg.push_str(&format!("{}. Use `{}()`\n", i + 1, tool));
            }
            msg.push_str("Or specify the fully qualified name (DATABASE.SCHEMA.TABLE).");
            Some(msg)
        }
    }
}

/// Preview the first rows of a table, resolving loose names first.
pub async fn preview_table(toolkit: &Toolkit, table_name: &str, limit: u32) -> Result<String> {
    let resolution = resolve(toolkit, table_name).await?;
    if let Some(miss) = resolution_miss_message(&resolution) {
        return Ok(miss);
    }
    let (qualified, note) = match resolution {
        Resolution::Table { qualified, note } => (qualified, note),
        _ => unreachable!(),
    };
    let sql = format!("SELECT * FROM {} LIMIT {}", qualified, limit);
    match toolkit.warehouse.query(&sql, &[]).await {
        Ok(rows) => {
            let table = format_as_table(&rows, DEFAULT_MAX_ROWS);
            Ok(match note {
                Some(note) => format!("{}\n\n{}", note, table),
                None => table,
            })
        }
        Err(e) => {
            let text = e.to_string();
            let class = classify_warehouse(&text);
            Ok(format_error_response(&text, class, Some(&sql)))
        }
    }
}

/// Column metadata for a table, as JSON.
pub async fn table_schema(toolkit: &Toolkit, table_name: &str) -> Result<String> {
    let resolution = resolve(toolkit, table_name).await?;
    if let Some(miss) = resolution_miss_message(&resolution) {
        return Ok(miss);
    }
    let qualified = match resolution {
        Resolution::Table { qualified, .. } => qualified,
        _ => unreachable!(),
    };
    match toolkit.warehouse.describe_columns(&qualified).await {
        Ok(columns) => Ok(serde_json::to_string_pretty(&columns)?),
        Err(e) => {
            let text = e.to_string();
            Ok(format_error_response(&text, classify_warehouse(&text), None))
        }
    }
}

/// Row count for a table.
pub async fn table_stats(toolkit: &Toolkit, table_name: &str) -> Result<String> {
    let resolution = resolve(toolkit, table_name).await?;
    if let Some(miss) = resolution_miss_message(&resolution) {
        return Ok(miss);
    }
    let qualified = match resolution {
        Resolution::Table { qualified, .. } => qualified,
        _ => unreachable!(),
    };
    crate::handlers::query::run_query(
        toolkit,
        &format!("SELECT COUNT(*) AS ROW_COUNT FROM {}", qualified),
    )
    .await
}

fn pick<'a>(row: &'a Row, lower: &str, upper: &str) -> &'a Value {
    row.get(lower).or_else(|| row.get(upper)).unwrap_or(&Value::Null)
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Catalogue listings come back with backend-specific column sets; these
/// normalize to a small fixed shape before rendering.
pub async fn list_tables(toolkit: &Toolkit, schema_name: &str) -> Result<String> {
    let sql = if schema_name.is_empty() {
        "SHOW TABLES".to_string()
    } else {
        format!("SHOW TABLES IN SCHEMA {}", schema_name)
    };
    match toolkit.warehouse.query(&sql, &[]).await {
        Ok(rows) => {
            let tables: Vec<Row> = rows
                .iter()
                .map(|r| {
                    let mut out = Row::new();
                    out.insert("SCHEMA".into(), pick(r, "schema_name", "SCHEMA_NAME").clone());
                    out.insert("TABLE".into(), pick(r, "name", "NAME").clone());
                    out.insert("TYPE".into(), pick(r, "kind", "KIND").clone());
                    out.insert("ROWS".into(), pick(r, "rows", "ROWS").clone());
                    out
                })
                .collect();
            Ok(format_as_table(&tables, DEFAULT_MAX_ROWS))
        }
        Err(e) => {
            let text = e.to_string();
            Ok(format_error_response(&text, classify_warehouse(&text), None))
        }
    }
}

pub async fn list_schemas(toolkit: &Toolkit, database_name: &str) -> Result<String> {
    let sql = if database_name.is_empty() {
        "SHOW SCHEMAS".to_string()
    } else {
        format!("SHOW SCHEMAS IN DATABASE {}", database_name)
    };
    match toolkit.warehouse.query(&sql, &[]).await {
        Ok(rows) => {
            let schemas: Vec<Row> = rows
                .iter()
                .map(|r| {
                    let db = text(pick(r, "database_name", "DATABASE_NAME"));
                    let name = text(pick(r, "name", "NAME"));
                    let qualified = if db.is_empty() {
                        name
                    } else {
                        format!("{}.{}", db, name)
                    };
                    let created = text(pick(r, "created_on", "CREATED_ON"));
                    let mut out = Row::new();
                    out.insert("DATABASE".into(), Value::String(db));
                    out.insert("SCHEMA".into(), Value::String(qualified));
                    out.insert(
                        "CREATED".into(),
                        Value::String(created.chars().take(10).collect()),
                    );
                    out
                })
                .collect();
            Ok(format_as_table(&schemas, DEFAULT_MAX_ROWS))
        }
        Err(e) => {
            let text = e.to_string();
            Ok(format_error_response(&text, classify_warehouse(&text), None))
        }
    }
}

pub async fn list_databases(toolkit: &Toolkit) -> Result<String> {
    match toolkit.warehouse.query("SHOW DATABASES", &[]).await {
        Ok(rows) => {
            let databases: Vec<Row> = rows
                .iter()
                .map(|r| {
                    let created = text(pick(r, "created_on", "CREATED_ON"));
                    let mut out = Row::new();
                    out.insert("DATABASE".into(), pick(r, "name", "NAME").clone());
                    out.insert("OWNER".into(), pick(r, "owner", "OWNER").clone());
                    out.insert(
                        "CREATED".into(),
                        Value::String(created.chars().take(10).collect()),
                    );
                    out
                })
                .collect();
            Ok(format_as_table(&databases, DEFAULT_MAX_ROWS))
        }
        Err(e) => {
            let text = e.to_string();
            Ok(format_error_response(&text, classify_warehouse(&text), None))
        }
    }
}
