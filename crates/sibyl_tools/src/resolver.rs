//! Table name resolution for user-facing discovery tools.
//!
//! Users (and the model relaying them) hand over names like
//! "preview table revenue", "Orders", or "SALES.PUBLIC.ORDERS". Resolution
//! runs a fixed ordered strategy list and stops at the first hit, so the
//! outcome for a given catalogue state is deterministic.

use crate::warehouse::Warehouse;
use anyhow::Result;

/// Tools named here are offered as next steps when resolution fails.
const NOT_FOUND_SUGGESTIONS: &[&str] = &["list_tables", "list_schemas", "list_databases"];

/// Conversational prefixes stripped before lookup. Longer forms first so
/// "preview table foo" does not leave "table foo" behind.
const FILLER_PREFIXES: &[&str] = &[
    "preview table ",
    "show table ",
    "describe table ",
    "preview ",
    "show ",
    "describe ",
    "table ",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Resolved to a concrete table. `note` is set when the match was not
    /// the literal input (fuzzy case or cross-schema hit).
    Table { qualified: String, note: Option<String> },
    /// The name is a schema, not a table.
    Schema { name: String },
    /// The name is a database, not a table.
    Database { name: String },
    NotFound { input: String, suggestions: Vec<&'static str> },
}

/// Strip one leading conversational filler, case-insensitively.
pub fn strip_fillers(input: &str) -> &str {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    for prefix in FILLER_PREFIXES {
        if lower.starts_with(prefix) {
            return trimmed[prefix.len()..].trim();
        }
    }
    trimmed
}

fn escape_like_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// Resolve a user-supplied table name against the catalogue.
///
/// Strategy order: filler stripping, qualified-name pass-through, direct
/// probe in the default database/schema, account-wide name search
/// (exact case then case-insensitive), then schema/database detection.
pub async fn resolve_table(
    warehouse: &dyn Warehouse,
    database: &str,
    schema: &str,
    raw: &str,
) -> Result<Resolution> {
    let name = strip_fillers(raw);
    if name.is_empty() {
        return Ok(Resolution::NotFound {
            input: raw.to_string(),
            suggestions: NOT_FOUND_SUGGESTIONS.to_vec(),
        });
    }

    // Already qualified: trust the caller.
    if name.contains('.') {
        return Ok(Resolution::Table { qualified: name.to_string(), note: None });
    }

    // Direct probe in the session context.
    let qualified = format!("{}.{}.{}", database, schema, name.to_uppercase());
    if warehouse
        .query(&format!("SELECT 1 FROM {} LIMIT 1", qualified), &[])
        .await
        .is_ok()
    {
        return Ok(Resolution::Table { qualified, note: None });
    }

    // Account-wide search by name.
    let like = escape_like_literal(&name.to_uppercase());
    let candidates = warehouse
        .query(&format!("SHOW TABLES LIKE '{}' IN ACCOUNT", like), &[])
        .await
        .unwrap_or_default();
    let qualify = |row: &sibyl_core::table::Row| -> Option<String> {
        let table = row.get("name")?.as_str()?;
        let db = row.get("database_name")?.as_str()?;
        let sc = row.get("schema_name")?.as_str()?;
        Some(format!("{}.{}.{}", db, sc, table))
    };
    let exact = candidates
        .iter()
        .find(|r| r.get("name").and_then(|v| v.as_str()) == Some(name))
        .and_then(|r| qualify(r));
    let fuzzy = candidates
        .iter()
        .find(|r| {
            r.get("name")
                .and_then(|v| v.as_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|r| qualify(r));
    if let Some(qualified) = exact.or(fuzzy) {
        return Ok(Resolution::Table {
            note: Some(format!("Resolved '{}' to {}", name, qualified)),
            qualified,
        });
    }

    // Not a table anywhere. See whether it names a schema or database, so
    // the caller can point the user at the right discovery tool.
    let schemas = warehouse
        .query(&format!("SHOW SCHEMAS LIKE '{}' IN ACCOUNT", like), &[])
        .await
        .unwrap_or_default();
    if !schemas.is_empty() {
        return Ok(Resolution::Schema { name: name.to_uppercase() });
    }
    let databases = warehouse
        .query(&format!("SHOW DATABASES LIKE '{}'", like), &[])
        .await
        .unwrap_or_default();
    if !databases.is_empty() {
        return Ok(Resolution::Database { name: name.to_uppercase() });
    }

    Ok(Resolution::NotFound {
        input: name.to_string(),
        suggestions: NOT_FOUND_SUGGESTIONS.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use sibyl_core::table::Row;
    use std::sync::Mutex;

    /// Scripted warehouse: each queued entry answers one query in order.
    struct ScriptedWarehouse {
        responses: Mutex<Vec<Result<Vec<Row>>>>,
        statements: Mutex<Vec<String>>,
    }

    impl ScriptedWarehouse {
        fn new(responses: Vec<Result<Vec<Row>>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                statements: Mutex::new(Vec::new()),
            }
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Warehouse for ScriptedWarehouse {
        async fn query(&self, sql: &str, _binds: &[Value]) -> Result<Vec<Row>> {
            self.statements.lock().unwrap().push(sql.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(Vec::new());
            }
            responses.remove(0)
        }

        async fn last_statement(&self) -> Option<String> {
            None
        }
    }

    fn show_tables_row(name: &str, db: &str, schema: &str) -> Row {
        let value = json!({ "name": name, "database_name": db, "schema_name": schema });
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_strip_fillers() {
        assert_eq!(strip_fillers("preview table revenue"), "revenue");
        assert_eq!(strip_fillers("Show ORDERS"), "ORDERS");
        assert_eq!(strip_fillers("describe table sales"), "sales");
        assert_eq!(strip_fillers("orders"), "orders");
        // Only a leading filler is stripped.
        assert_eq!(strip_fillers("stable_metrics"), "stable_metrics");
    }

    #[tokio::test]
    async fn test_qualified_name_passes_through_without_queries() {
        let wh = ScriptedWarehouse::new(vec![]);
        let res = resolve_table(&wh, "FINANCIALS", "PUBLIC", "SALES.PUBLIC.ORDERS")
            .await
            .unwrap();
        assert_eq!(
            res,
            Resolution::Table { qualified: "SALES.PUBLIC.ORDERS".to_string(), note: None }
        );
        assert!(wh.statements().is_empty());
    }

    #[tokio::test]
    async fn test_direct_probe_hit() {
        let wh = ScriptedWarehouse::new(vec![Ok(vec![show_tables_row("x", "y", "z")])]);
        let res = resolve_table(&wh, "FINANCIALS", "PUBLIC", "orders").await.unwrap();
        assert_eq!(
            res,
            Resolution::Table { qualified: "FINANCIALS.PUBLIC.ORDERS".to_string(), note: None }
        );
    }

    #[tokio::test]
    async fn test_account_search_annotates_match() {
        let wh = ScriptedWarehouse::new(vec![
            Err(anyhow::anyhow!("does not exist or not authorized")),
            Ok(vec![show_tables_row("ORDERS", "SALES", "EU")]),
        ]);
        let res = resolve_table(&wh, "FINANCIALS", "PUBLIC", "orders").await.unwrap();
        match res {
            Resolution::Table { qualified, note } => {
                assert_eq!(qualified, "SALES.EU.ORDERS");
                assert!(note.unwrap().contains("SALES.EU.ORDERS"));
            }
            other => panic!("unexpected resolution {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exact_case_wins_over_fuzzy() {
        let wh = ScriptedWarehouse::new(vec![
            Err(anyhow::anyhow!("does not exist or not authorized")),
            Ok(vec![
                show_tables_row("Orders", "A", "B"),
                show_tables_row("orders", "C", "D"),
            ]),
        ]);
        let res = resolve_table(&wh, "FINANCIALS", "PUBLIC", "orders").await.unwrap();
        match res {
            Resolution::Table { qualified, .. } => assert_eq!(qualified, "C.D.orders"),
            other => panic!("unexpected resolution {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_schema_redirect() {
        let wh = ScriptedWarehouse::new(vec![
            Err(anyhow::anyhow!("does not exist or not authorized")),
            Ok(vec![]),
            Ok(vec![show_tables_row("REPORTING", "FINANCIALS", "ignored")]),
        ]);
        let res = resolve_table(&wh, "FINANCIALS", "PUBLIC", "reporting").await.unwrap();
        assert_eq!(res, Resolution::Schema { name: "REPORTING".to_string() });
    }

    #[tokio::test]
    async fn test_not_found_suggests_discovery_tools() {
        let wh = ScriptedWarehouse::new(vec![
            Err(anyhow::anyhow!("does not exist or not authorized")),
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![]),
        ]);
        let res = resolve_table(&wh, "FINANCIALS", "PUBLIC", "nope").await.unwrap();
        assert_eq!(
            res,
            Resolution::NotFound {
                input: "nope".to_string(),
                suggestions: vec!["list_tables", "list_schemas", "list_databases"],
            }
        );
    }

    #[tokio::test]
    async fn test_like_literal_escapes_quotes() {
        let wh = ScriptedWarehouse::new(vec![
            Err(anyhow::anyhow!("does not exist or not authorized")),
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![]),
        ]);
        let _ = resolve_table(&wh, "FINANCIALS", "PUBLIC", "o'brien").await.unwrap();
        let statements = wh.statements();
        assert!(statements[1].contains("O''BRIEN"));
    }
}
