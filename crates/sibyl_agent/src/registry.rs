//! The tool catalogue and executor.
//!
//! The catalogue is a closed enum rather than a name-keyed registry: adding
//! a tool means adding a variant, and the compiler walks every match arm to
//! the new case. Tool-call requests from the oracle stay untrusted at the
//! boundary: unknown names and malformed arguments become error payloads,
//! never panics.

use crate::api_types::ContentBlock;
use serde::Deserialize;
use serde_json::{json, Value};
use sibyl_tools::handlers::{discovery, email, query, sheets};
use sibyl_tools::Toolkit;

// ============================================================================
// ToolId
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolId {
    RunQuery,
    AccountLookup,
    PreviewTable,
    TableSchema,
    TableStats,
    ListTables,
    ListSchemas,
    ListDatabases,
    ProfileQuery,
    ExplainQuery,
    CreateSheet,
    RenameSheet,
    ReplicateToSheet,
    ReadSheet,
    CreateChart,
    SaveAlias,
    ListAliases,
    PruneFiles,
    SendCampaign,
}

impl ToolId {
    pub const ALL: &'static [ToolId] = &[
        ToolId::RunQuery,
        ToolId::AccountLookup,
        ToolId::PreviewTable,
        ToolId::TableSchema,
        ToolId::TableStats,
        ToolId::ListTables,
        ToolId::ListSchemas,
        ToolId::ListDatabases,
        ToolId::ProfileQuery,
        ToolId::ExplainQuery,
        ToolId::CreateSheet,
        ToolId::RenameSheet,
        ToolId::ReplicateToSheet,
        ToolId::ReadSheet,
        ToolId::CreateChart,
        ToolId::SaveAlias,
        ToolId::ListAliases,
        ToolId::PruneFiles,
        ToolId::SendCampaign,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolId::RunQuery => "run_query",
            ToolId::AccountLookup => "account_lookup",
            ToolId::PreviewTable => "preview_table",
            ToolId::TableSchema => "table_schema",
            ToolId::TableStats => "table_stats",
            ToolId::ListTables => "list_tables",
            ToolId::ListSchemas => "list_schemas",
            ToolId::ListDatabases => "list_databases",
            ToolId::ProfileQuery => "profile_query",
            ToolId::ExplainQuery => "explain_query",
            ToolId::CreateSheet => "create_sheet",
            ToolId::RenameSheet => "rename_sheet",
            ToolId::ReplicateToSheet => "replicate_to_sheet",
            ToolId::ReadSheet => "read_sheet",
            ToolId::CreateChart => "create_chart",
            ToolId::SaveAlias => "save_alias",
            ToolId::ListAliases => "list_aliases",
            ToolId::PruneFiles => "prune_files",
            ToolId::SendCampaign => "send_campaign",
        }
    }

    pub fn from_name(name: &str) -> Option<ToolId> {
        ToolId::ALL.iter().copied().find(|id| id.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolId::RunQuery => {
                "Execute a SQL SELECT statement against the warehouse and return the results \
                 as a markdown table. Use for exploratory, ad-hoc questions."
            }
            ToolId::AccountLookup => {
                "Look up key details and metrics for a specific customer or account by name. \
                 Prefer this over run_query when the user asks about one account."
            }
            ToolId::PreviewTable => {
                "Preview the first rows of a table. Accepts bare table names and resolves \
                 them across schemas."
            }
            ToolId::TableSchema => "Get column names and types for a table, as JSON.",
            ToolId::TableStats => "Get the row count of a table.",
            ToolId::ListTables => {
                "List tables in the current schema, or in the given schema \
                 (e.g. \"FINANCIALS.PUBLIC\"). Use for orientation, not output."
            }
            ToolId::ListSchemas => {
                "List schemas in the current database, or in the given database. \
                 Use for orientation, not output."
            }
            ToolId::ListDatabases => "List all accessible databases. Use for orientation, not output.",
            ToolId::ProfileQuery => {
                "Statistical profile of a query's result set: per-column null counts, \
                 distinct counts, and sample values."
            }
            ToolId::ExplainQuery => {
                "Show the execution plan for a SQL statement without running it, to estimate \
                 cost and complexity."
            }
            ToolId::CreateSheet => {
                "Create a new spreadsheet, share it with the configured user, and save an \
                 alias for it. Returns the spreadsheet ID, alias, and URL."
            }
            ToolId::RenameSheet => "Rename an existing spreadsheet and save the new name as an alias.",
            ToolId::ReplicateToSheet => {
                "Execute a SQL query (or reuse the last executed one) and write the results \
                 to a spreadsheet tab, creating the tab if needed."
            }
            ToolId::ReadSheet => "Read a range from a spreadsheet as a JSON 2D array.",
            ToolId::CreateChart => {
                "Create a chart (COLUMN, LINE, BAR, or PIE) in a spreadsheet tab from an \
                 A1 data range."
            }
            ToolId::SaveAlias => {
                "Save a memorable alias for a resource ID (typically a spreadsheet ID)."
            }
            ToolId::ListAliases => "List all saved aliases as a JSON mapping.",
            ToolId::PruneFiles => {
                "Free Drive storage by deleting old spreadsheets. Safe by default: without \
                 dry_run=false it only lists what would be deleted."
            }
            ToolId::SendCampaign => {
                "Send personalised campaign emails from spreadsheet rows using {column} \
                 templates. ALWAYS start with dry_run=true to preview."
            }
        }
    }

    /// Raw parameter schema for this tool. Goes through
    /// `schema::sanitize_schema` before being sent to the oracle.
    pub fn parameters(&self) -> Value {
        match self {
            ToolId::RunQuery | ToolId::ProfileQuery | ToolId::ExplainQuery => json!({
                "title": format!("{} arguments", self.name()),
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "sql": { "type": "string", "description": "SQL SELECT statement" }
                },
                "required": ["sql"]
            }),
            ToolId::AccountLookup => json!({
                "title": "account_lookup arguments",
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "account_name": {
                        "type": "string",
                        "description": "Full or partial account name"
                    }
                },
                "required": ["account_name"]
            }),
            ToolId::PreviewTable => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Table name, optionally schema-qualified"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Rows to preview (default 10)"
                    }
                },
                "required": ["table_name"]
            }),
            ToolId::TableSchema | ToolId::TableStats => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Table name, optionally schema-qualified"
                    }
                },
                "required": ["table_name"]
            }),
            ToolId::ListTables => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "schema_name": {
                        "type": "string",
                        "description": "Optional qualified schema (e.g. FINANCIALS.PUBLIC)"
                    }
                },
                "required": []
            }),
            ToolId::ListSchemas => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "database_name": {
                        "type": "string",
                        "description": "Optional database to list schemas in"
                    }
                },
                "required": []
            }),
            ToolId::ListDatabases | ToolId::ListAliases => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {},
                "required": []
            }),
            ToolId::CreateSheet => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "title": { "type": "string", "description": "Title for the new spreadsheet" }
                },
                "required": ["title"]
            }),
            ToolId::RenameSheet => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "sheet": { "type": "string", "description": "Sheet alias, ID, or URL" },
                    "new_name": { "type": "string", "description": "New display name" }
                },
                "required": ["sheet", "new_name"]
            }),
            ToolId::ReplicateToSheet => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "sheet": { "type": "string", "description": "Sheet alias, ID, or URL" },
                    "tab": {
                        "type": "string",
                        "description": "Worksheet tab name, created if missing (default Sheet1)"
                    },
                    "query": {
                        "type": "string",
                        "description": "SQL SELECT; omit to reuse the last executed query"
                    }
                },
                "required": ["sheet"]
            }),
            ToolId::ReadSheet => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "sheet": { "type": "string", "description": "Sheet alias, ID, or URL" },
                    "range": { "type": "string", "description": "A1 range, e.g. Sheet1!A1:B10" }
                },
                "required": ["sheet", "range"]
            }),
            ToolId::CreateChart => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "sheet": { "type": "string", "description": "Sheet alias, ID, or URL" },
                    "tab": { "type": "string", "description": "Tab containing the source data" },
                    "chart_type": {
                        "type": "string",
                        "description": "COLUMN, LINE, BAR, or PIE"
                    },
                    "data_range": {
                        "type": "string",
                        "description": "A1 range covering headers and data, e.g. A1:B10"
                    },
                    "title": { "type": "string", "title": "Chart title", "description": "Title shown above the chart" }
                },
                "required": ["sheet", "tab", "chart_type", "data_range", "title"]
            }),
            ToolId::SaveAlias => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "alias": { "type": "string", "description": "Short memorable name" },
                    "resource_id": { "type": "string", "description": "Resource ID to remember" }
                },
                "required": ["alias", "resource_id"]
            }),
            ToolId::PruneFiles => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "max_files": {
                        "type": "integer",
                        "description": "Cap on deletions (default 10)"
                    },
                    "older_than_days": {
                        "type": "integer",
                        "description": "Only target files older than this (default 30)"
                    },
                    "dry_run": {
                        "type": "boolean",
                        "description": "true (default) lists only, false deletes"
                    }
                },
                "required": []
            }),
            ToolId::SendCampaign => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "sheet": { "type": "string", "description": "Sheet alias, ID, or URL with campaign rows" },
                    "subject_template": {
                        "type": "string",
                        "description": "Subject with {column_name} placeholders"
                    },
                    "body_template": {
                        "type": "string",
                        "description": "Plain-text body with {column_name} placeholders"
                    },
                    "tab": { "type": "string", "description": "Tab with the data (default Sheet1)" },
                    "test_mode": {
                        "type": "boolean",
                        "description": "true (default) caps delivery at 3 recipients"
                    },
                    "dry_run": {
                        "type": "boolean",
                        "description": "true (default) previews without sending"
                    }
                },
                "required": ["sheet", "subject_template", "body_template"]
            }),
        }
    }
}

// ============================================================================
// Typed arguments
// ============================================================================

fn default_preview_limit() -> u32 {
    10
}

fn default_tab() -> String {
    "Sheet1".to_string()
}

fn default_max_files() -> usize {
    10
}

fn default_older_than_days() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct SqlArgs {
    sql: String,
}

#[derive(Deserialize)]
struct AccountLookupArgs {
    account_name: String,
}

#[derive(Deserialize)]
struct PreviewTableArgs {
    table_name: String,
    #[serde(default = "default_preview_limit")]
    limit: u32,
}

#[derive(Deserialize)]
struct TableArgs {
    table_name: String,
}

#[derive(Deserialize)]
struct ListTablesArgs {
    #[serde(default)]
    schema_name: String,
}

#[derive(Deserialize)]
struct ListSchemasArgs {
    #[serde(default)]
    database_name: String,
}

#[derive(Deserialize)]
struct CreateSheetArgs {
    title: String,
}

#[derive(Deserialize)]
struct RenameSheetArgs {
    sheet: String,
    new_name: String,
}

#[derive(Deserialize)]
struct ReplicateArgs {
    sheet: String,
    #[serde(default = "default_tab")]
    tab: String,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Deserialize)]
struct ReadSheetArgs {
    sheet: String,
    range: String,
}

#[derive(Deserialize)]
struct CreateChartArgs {
    sheet: String,
    tab: String,
    chart_type: String,
    data_range: String,
    title: String,
}

#[derive(Deserialize)]
struct SaveAliasArgs {
    alias: String,
    resource_id: String,
}

#[derive(Deserialize)]
struct PruneFilesArgs {
    #[serde(default = "default_max_files")]
    max_files: usize,
    #[serde(default = "default_older_than_days")]
    older_than_days: i64,
    #[serde(default = "default_true")]
    dry_run: bool,
}

#[derive(Deserialize)]
struct SendCampaignArgs {
    sheet: String,
    subject_template: String,
    body_template: String,
    #[serde(default = "default_tab")]
    tab: String,
    #[serde(default = "default_true")]
    test_mode: bool,
    #[serde(default = "default_true")]
    dry_run: bool,
}

// ============================================================================
// Executor
// ============================================================================

/// Execute a tool-call request. Always returns a JSON object: handler
/// output that parses to an object passes through, anything else is
/// wrapped under `result`, and failures land under `error`.
#[tracing::instrument(skip(toolkit, input), fields(tool = name))]
pub async fn execute_tool(toolkit: &Toolkit, name: &str, input: &Value) -> Value {
    let Some(id) = ToolId::from_name(name) else {
        return json!({ "error": format!("Unknown tool: {}", name) });
    };
    tracing::info!("Executing tool");

    match dispatch(toolkit, id, input).await {
        Ok(output) => normalize(output),
        Err(e) => {
            tracing::warn!(tool = name, "Tool failed: {}", e);
            json!({ "error": e.to_string() })
        }
    }
}

fn args<T: serde::de::DeserializeOwned>(id: ToolId, input: &Value) -> anyhow::Result<T> {
    serde_json::from_value(input.clone())
        .map_err(|e| anyhow::anyhow!("Invalid arguments for {}: {}", id.name(), e))
}

async fn dispatch(toolkit: &Toolkit, id: ToolId, input: &Value) -> anyhow::Result<String> {
    match id {
        ToolId::RunQuery => {
            let a: SqlArgs = args(id, input)?;
            query::run_query(toolkit, &a.sql).await
        }
        ToolId::AccountLookup => {
            let a: AccountLookupArgs = args(id, input)?;
            query::account_lookup(toolkit, &a.account_name).await
        }
        ToolId::PreviewTable => {
            let a: PreviewTableArgs = args(id, input)?;
            discovery::preview_table(toolkit, &a.table_name, a.limit).await
        }
        ToolId::TableSchema => {
            let a: TableArgs = args(id, input)?;
            discovery::table_schema(toolkit, &a.table_name).await
        }
        ToolId::TableStats => {
            let a: TableArgs = args(id, input)?;
            discovery::table_stats(toolkit, &a.table_name).await
        }
        ToolId::ListTables => {
            let a: ListTablesArgs = args(id, input)?;
            discovery::list_tables(toolkit, &a.schema_name).await
        }
        ToolId::ListSchemas => {
            let a: ListSchemasArgs = args(id, input)?;
            discovery::list_schemas(toolkit, &a.database_name).await
        }
        ToolId::ListDatabases => discovery::list_databases(toolkit).await,
        ToolId::ProfileQuery => {
            let a: SqlArgs = args(id, input)?;
            query::profile_query(toolkit, &a.sql).await
        }
        ToolId::ExplainQuery => {
            let a: SqlArgs = args(id, input)?;
            query::explain_query(toolkit, &a.sql).await
        }
        ToolId::CreateSheet => {
            let a: CreateSheetArgs = args(id, input)?;
            sheets::create_sheet(toolkit, &a.title).await
        }
        ToolId::RenameSheet => {
            let a: RenameSheetArgs = args(id, input)?;
            sheets::rename_sheet(toolkit, &a.sheet, &a.new_name).await
        }
        ToolId::ReplicateToSheet => {
            let a: ReplicateArgs = args(id, input)?;
            sheets::replicate_to_sheet(toolkit, &a.sheet, &a.tab, a.query.as_deref()).await
        }
        ToolId::ReadSheet => {
            let a: ReadSheetArgs = args(id, input)?;
            sheets::read_sheet(toolkit, &a.sheet, &a.range).await
        }
        ToolId::CreateChart => {
            let a: CreateChartArgs = args(id, input)?;
            sheets::create_chart(toolkit, &a.sheet, &a.tab, &a.chart_type, &a.data_range, &a.title)
                .await
        }
        ToolId::SaveAlias => {
            let a: SaveAliasArgs = args(id, input)?;
            sheets::save_alias(toolkit, &a.alias, &a.resource_id).await
        }
        ToolId::ListAliases => sheets::list_aliases(toolkit).await,
        ToolId::PruneFiles => {
            let a: PruneFilesArgs = args(id, input)?;
            sheets::prune_files(toolkit, a.max_files, a.older_than_days, a.dry_run).await
        }
        ToolId::SendCampaign => {
            let a: SendCampaignArgs = args(id, input)?;
            email::send_campaign(
                toolkit,
                &a.sheet,
                &a.subject_template,
                &a.body_template,
                &a.tab,
                a.test_mode,
                a.dry_run,
            )
            .await
        }
    }
}

/// Handlers return strings (markdown, JSON, or plain text). The oracle
/// protocol wants structured objects, so JSON objects pass through and
/// everything else is wrapped.
fn normalize(output: String) -> Value {
    match serde_json::from_str::<Value>(&output) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "result": other }),
        Err(_) => json!({ "result": output }),
    }
}

/// Render an executor result as a tool-result content block. The `error`
/// key doubles as the wire-level error flag.
pub fn to_tool_result(tool_use_id: &str, result: &Value) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: tool_use_id.to_string(),
        content: result.to_string(),
        is_error: if result.get("error").is_some() {
            Some(true)
        } else {
            None
        },
    }
}
