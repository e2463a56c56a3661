//! Warehouse collaborator: a thin SQL-execution seam.
//!
//! The agent core only needs three operations (execute, describe, explain)
//! plus access to the last successfully executed statement so export tools
//! can reuse it. `HttpWarehouse` speaks the account's SQL statements REST
//! endpoint; tests substitute scripted fakes through the trait.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sibyl_core::table::Row;
use std::time::Duration;

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Execute a statement and return all rows. User-supplied substrings
    /// must travel through `binds` (positional `?` parameters), never be
    /// interpolated into the SQL text.
    async fn query(&self, sql: &str, binds: &[Value]) -> Result<Vec<Row>>;

    /// The most recent statement that executed successfully, if any.
    async fn last_statement(&self) -> Option<String>;

    /// Column metadata for a qualified table.
    async fn describe_columns(&self, qualified_table: &str) -> Result<Vec<Row>> {
        self.query(&format!("SHOW COLUMNS IN {}", qualified_table), &[])
            .await
    }

    /// Execution plan text for a statement.
    async fn explain(&self, sql: &str) -> Result<Vec<Row>> {
        self.query(&format!("EXPLAIN {}", sql), &[]).await
    }
}

// ============================================================================
// HttpWarehouse
// ============================================================================

/// Client for a JSON SQL gateway: `POST {base}/api/v2/statements` with a
/// `statement` and numbered `bindings`, response carrying column metadata
/// and row data arrays.
pub struct HttpWarehouse {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    database: String,
    schema: String,
    warehouse: String,
    role: Option<String>,
    last_statement: tokio::sync::Mutex<Option<String>>,
}

impl HttpWarehouse {
    pub fn new(config: &sibyl_core::config::WarehouseConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            database: config.database.clone(),
            schema: config.schema.clone(),
            warehouse: config.warehouse.clone(),
            role: config.role.clone(),
            last_statement: tokio::sync::Mutex::new(None),
        })
    }

    fn request_body(&self, sql: &str, binds: &[Value]) -> Value {
        let mut body = serde_json::json!({
            "statement": sql,
            "database": self.database,
            "schema": self.schema,
            "warehouse": self.warehouse,
        });
        if let Some(role) = &self.role {
            body["role"] = Value::String(role.clone());
        }
        if !binds.is_empty() {
            let bindings: serde_json::Map<String, Value> = binds
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (
                        (i + 1).to_string(),
                        serde_json::json!({ "type": "TEXT", "value": text }),
                    )
                })
                .collect();
            body["bindings"] = Value::Object(bindings);
        }
        body
    }

    /// Decode the gateway response: `resultSetMetaData.rowType[].name`
    /// names the columns, `data` is an array of value arrays.
    fn decode_rows(payload: &Value) -> Result<Vec<Row>> {
        let columns: Vec<String> = payload
            .pointer("/resultSetMetaData/rowType")
            .and_then(|v| v.as_array())
            .map(|cols| {
                cols.iter()
                    .filter_map(|c| c.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let data = payload
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(data.len());
        for entry in data {
            let values = entry
                .as_array()
                .context("Malformed gateway response: row is not an array")?;
            let row: Row = columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl Warehouse for HttpWarehouse {
    #[tracing::instrument(skip(self, sql, binds), fields(sql = %sql.chars().take(200).collect::<String>()))]
    async fn query(&self, sql: &str, binds: &[Value]) -> Result<Vec<Row>> {
        let url = format!("{}/api/v2/statements", self.base_url);
        let mut request = self.client.post(&url).json(&self.request_body(sql, binds));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach warehouse gateway")?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            // Surface the gateway's message text so the classifier can
            // pattern-match it downstream.
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or(text);
            anyhow::bail!("Warehouse error ({}): {}", status, detail);
        }

        let payload: Value =
            serde_json::from_str(&text).context("Failed to parse warehouse response")?;
        let rows = Self::decode_rows(&payload)?;

        *self.last_statement.lock().await = Some(sql.to_string());
        tracing::info!("Query returned {} rows", rows.len());
        Ok(rows)
    }

    async fn last_statement(&self) -> Option<String> {
        self.last_statement.lock().await.clone()
    }
}
