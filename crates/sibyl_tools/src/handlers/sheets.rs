//! Spreadsheet export tools: create/rename/replicate/read, chart
//! creation, alias management, and Drive cleanup.

use crate::sheets::{sheet_url, ChartKind};
use crate::toolkit::Toolkit;
use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sibyl_core::classify::{classify_sheets, format_error_response};
use std::time::Instant;

/// Create a spreadsheet, share it with the configured user, and save an
/// auto-generated alias so later tools can reference it by name.
pub async fn create_sheet(toolkit: &Toolkit, title: &str) -> Result<String> {
    let created = match toolkit.sheets.create(title).await {
        Ok(created) => created,
        Err(e) => {
            let text = e.to_string();
            // A 403 on create usually means Drive is full; confirm before
            // sending the model down a permissions rabbit hole.
            if text.contains("403") || text.to_lowercase().contains("quota") {
                if let Ok(quota) = toolkit.sheets.check_quota().await {
                    if quota.limit_bytes > 0 && quota.usage_bytes >= quota.limit_bytes {
                        return Ok(format!(
                            "❌ Drive storage full ({:.2} MB / {:.2} MB).\n\n\
                             Use `prune_files` to free space.",
                            quota.usage_bytes as f64 / 1024.0 / 1024.0,
                            quota.limit_bytes as f64 / 1024.0 / 1024.0,
                        ));
                    }
                }
            }
            return Ok(format!("Error creating sheet: {}", text));
        }
    };

    let share_status = match &toolkit.config.sheets.user_email {
        Some(email) => match toolkit.sheets.share(&created.id, email).await {
            Ok(()) => format!(" and shared with {}", email),
            Err(e) => {
                let msg: String = e.to_string().chars().take(60).collect();
                format!(" (Auto-share failed: {})", msg)
            }
        },
        None => " (No user email configured for auto-share)".to_string(),
    };

    let alias = Toolkit::normalize_alias(title);
    toolkit.aliases.save_alias(&alias, &created.id).await?;

    Ok(serde_json::to_string_pretty(&json!({
        "status": "success",
        "message": format!("Created sheet '{}'{}", title, share_status),
        "spreadsheet_id": created.id,
        "alias": alias,
        "url": created.url,
    }))?)
}

pub async fn rename_sheet(toolkit: &Toolkit, reference: &str, new_name: &str) -> Result<String> {
    let sheet_id = toolkit.resolve_sheet_id(reference).await;
    if let Err(e) = toolkit.sheets.rename(&sheet_id, new_name).await {
        return Ok(format!("Error renaming sheet: {}", e));
    }
    let new_alias = Toolkit::normalize_alias(new_name);
    toolkit.aliases.save_alias(&new_alias, &sheet_id).await?;
    Ok(format!(
        "✓ Renamed sheet to '{}'\n\nURL: {}\nNew alias: '{}'",
        new_name,
        sheet_url(&sheet_id),
        new_alias
    ))
}

/// Run a query (or reuse the last executed one) and write the result set
/// into a sheet tab, creating the tab when missing.
pub async fn replicate_to_sheet(
    toolkit: &Toolkit,
    reference: &str,
    tab: &str,
    query: Option<&str>,
) -> Result<String> {
    let sql = match query {
        Some(q) if !q.trim().is_empty() => q.to_string(),
        _ => match toolkit.warehouse.last_statement().await {
            Some(last) => {
                tracing::info!("replicate_to_sheet: reusing last executed statement");
                last
            }
            None => {
                return Ok(
                    "No query provided and no previous query in history. Please provide a SQL query."
                        .to_string(),
                )
            }
        },
    };

    let sheet_id = toolkit.resolve_sheet_id(reference).await;
    let start = Instant::now();

    let outcome: Result<String> = async {
        let tabs = toolkit.sheets.tab_titles(&sheet_id).await?;
        if !tabs.iter().any(|t| t == tab) {
            toolkit.sheets.add_tab(&sheet_id, tab).await?;
        }

        let rows = toolkit.warehouse.query(&sql, &[]).await?;
        if rows.is_empty() {
            return Ok("No data returned from the query.".to_string());
        }

        let headers: Vec<Value> = rows[0].keys().map(|k| json!(k)).collect();
        let mut values = vec![headers];
        for row in &rows {
            values.push(row.values().cloned().collect());
        }

        let range = format!("{}!A1", tab);
        let updated = toolkit.sheets.write_range(&sheet_id, &range, &values).await?;
        if updated == 0 {
            anyhow::bail!("Write reported 0 updated cells; the data was not persisted.");
        }

        Ok(format!(
            "✅ Replicated {} rows to '{}' in {}ms.\nURL: {}",
            rows.len(),
            tab,
            start.elapsed().as_millis(),
            sheet_url(&sheet_id)
        ))
    }
    .await;

    match outcome {
        Ok(message) => Ok(message),
        Err(e) => {
            let text = e.to_string();
            if text.contains("404") || text.contains("INVALID_ARGUMENT") {
                Ok(format!(
                    "Sheet ID '{}' not found.\n\nCreate a new sheet first with `create_sheet`, then replicate.",
                    reference
                ))
            } else {
                Ok(format!("Error replicating data: {}", text))
            }
        }
    }
}

pub async fn read_sheet(toolkit: &Toolkit, reference: &str, range: &str) -> Result<String> {
    let sheet_id = toolkit.resolve_sheet_id(reference).await;
    match toolkit.sheets.read_range(&sheet_id, range).await {
        Ok(values) => Ok(serde_json::to_string_pretty(&values)?),
        Err(e) => {
            let text = e.to_string();
            Ok(format_error_response(&text, classify_sheets(&text), None))
        }
    }
}

pub async fn create_chart(
    toolkit: &Toolkit,
    reference: &str,
    tab: &str,
    chart_type: &str,
    data_range: &str,
    title: &str,
) -> Result<String> {
    let kind = match ChartKind::parse(chart_type) {
        Ok(kind) => kind,
        Err(e) => return Ok(e.to_string()),
    };
    let sheet_id = toolkit.resolve_sheet_id(reference).await;
    let tab_id = match toolkit.sheets.tab_id(&sheet_id, tab).await {
        Ok(Some(id)) => id,
        Ok(None) => return Ok(format!("Sheet tab '{}' not found in this spreadsheet.", tab)),
        Err(e) => return Ok(format!("Error creating chart: {}", e)),
    };
    match toolkit
        .sheets
        .create_chart(&sheet_id, tab_id, kind, data_range, title)
        .await
    {
        Ok(()) => Ok(format!(
            "✓ Created {} chart '{}' in '{}'\n\nURL: {}",
            chart_type.to_lowercase(),
            title,
            tab,
            sheet_url(&sheet_id)
        )),
        Err(e) => Ok(format!("Error creating chart: {}", e)),
    }
}

pub async fn save_alias(toolkit: &Toolkit, alias: &str, resource_id: &str) -> Result<String> {
    toolkit.save_alias(alias, resource_id).await?;
    Ok(format!(
        "Saved alias '{}' for resource '{}'.",
        Toolkit::normalize_alias(alias),
        resource_id
    ))
}

pub async fn list_aliases(toolkit: &Toolkit) -> Result<String> {
    let aliases = toolkit.aliases.list_aliases().await;
    // Stable output order for a HashMap-backed store.
    let sorted: std::collections::BTreeMap<_, _> = aliases.into_iter().collect();
    Ok(serde_json::to_string_pretty(&sorted)?)
}

/// Delete (or list, in the default dry run) spreadsheets older than the
/// cutoff to free Drive storage.
pub async fn prune_files(
    toolkit: &Toolkit,
    max_files: usize,
    older_than_days: i64,
    dry_run: bool,
) -> Result<String> {
    let files = match toolkit.sheets.list_files().await {
        Ok(files) => files,
        Err(e) => return Ok(format!("Error pruning files: {}", e)),
    };
    let cutoff = Utc::now() - Duration::days(older_than_days);

    let mut candidates: Vec<_> = files
        .into_iter()
        .filter(|f| f.created_time < cutoff)
        .collect();
    candidates.sort_by_key(|f| f.created_time);
    let targets: Vec<_> = candidates.into_iter().take(max_files).collect();

    if targets.is_empty() {
        return Ok(format!("No files found older than {} days.", older_than_days));
    }

    let mut summary = vec![format!(
        "Found {} files older than {} days:",
        targets.len(),
        older_than_days
    )];
    for f in &targets {
        summary.push(format!(
            "- {} (ID: {}) created {}",
            f.name,
            f.id,
            f.created_time.format("%Y-%m-%d")
        ));
    }

    if dry_run {
        return Ok(format!(
            "🔍 [DRY RUN] Files **would** be deleted:\n\n{}\n\n⚠️ Use `dry_run=false` to actually delete.",
            summary.join("\n")
        ));
    }

    let mut deleted = 0;
    let mut log = Vec::new();
    for f in &targets {
        match toolkit.sheets.delete_file(&f.id).await {
            Ok(()) => {
                deleted += 1;
                log.push(format!("✓ Deleted: {}", f.name));
            }
            Err(e) => log.push(format!("✗ Failed: {}: {}", f.name, e)),
        }
    }
    Ok(format!("🗑️ Pruned {} files.\n\n{}", deleted, log.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::*;
    use crate::sheets::{DriveFile, QuotaInfo};
    use serde_json::json;
    use std::sync::Arc;

    fn wh() -> Arc<FakeWarehouse> {
        Arc::new(FakeWarehouse::new(vec![]))
    }

    #[tokio::test]
    async fn test_create_sheet_shares_and_saves_alias() {
        let sheets = Arc::new(FakeSheetStore::new(Default::default()));
        let (tk, _dir) = toolkit_with(wh(), sheets.clone(), Arc::new(FakeMailer::default()));
        let out = create_sheet(&tk, "Q4 Report").await.unwrap();
        let payload: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(payload["status"], json!("success"));
        assert_eq!(payload["alias"], json!("q4_report"));
        assert_eq!(
            sheets.state.lock().unwrap().shared_with,
            vec!["owner@example.com".to_string()]
        );
        let id = payload["spreadsheet_id"].as_str().unwrap().to_string();
        assert_eq!(tk.aliases.get_id("q4_report").await, id);
    }

    #[tokio::test]
    async fn test_create_sheet_reports_full_quota() {
        let sheets = Arc::new(FakeSheetStore::new(FakeSheetState {
            create_error: Some("Sheets API error (403): storage quota exceeded".to_string()),
            quota: Some(QuotaInfo { usage_bytes: 1024 * 1024, limit_bytes: 1024 * 1024 }),
            ..Default::default()
        }));
        let (tk, _dir) = toolkit_with(wh(), sheets, Arc::new(FakeMailer::default()));
        let out = create_sheet(&tk, "Big Sheet").await.unwrap();
        assert!(out.contains("Drive storage full"));
        assert!(out.contains("prune_files"));
    }

    #[tokio::test]
    async fn test_replicate_creates_missing_tab_and_writes_header() {
        let warehouse = Arc::new(FakeWarehouse::new(vec![Ok(vec![
            row(&[("NAME", json!("Acme")), ("REVENUE", json!(125000))]),
            row(&[("NAME", json!("Globex")), ("REVENUE", json!(90000))]),
        ])]));
        let sheets = Arc::new(FakeSheetStore::new(Default::default()));
        let (tk, _dir) = toolkit_with(warehouse, sheets.clone(), Arc::new(FakeMailer::default()));
        let out = replicate_to_sheet(&tk, "abc123", "Data", Some("SELECT * FROM T"))
            .await
            .unwrap();
        assert!(out.contains("Replicated 2 rows"));
        let state = sheets.state.lock().unwrap();
        assert_eq!(state.tabs.get("abc123").unwrap(), &vec!["Data".to_string()]);
        let (_, range, values) = &state.written[0];
        assert_eq!(range, "Data!A1");
        assert_eq!(values[0], vec![json!("NAME"), json!("REVENUE")]);
        assert_eq!(values[1], vec![json!("Acme"), json!(125000)]);
    }

    #[tokio::test]
    async fn test_replicate_reuses_last_statement() {
        let warehouse = Arc::new(
            FakeWarehouse::new(vec![Ok(vec![row(&[("N", json!(1))])])])
                .with_last_statement("SELECT N FROM T"),
        );
        let sheets = Arc::new(FakeSheetStore::new(Default::default()));
        let (tk, _dir) = toolkit_with(warehouse.clone(), sheets, Arc::new(FakeMailer::default()));
        let out = replicate_to_sheet(&tk, "abc123", "Data", None).await.unwrap();
        assert!(out.contains("Replicated 1 rows"));
        assert_eq!(warehouse.statements()[0].0, "SELECT N FROM T");
    }

    #[tokio::test]
    async fn test_replicate_without_query_or_history() {
        let sheets = Arc::new(FakeSheetStore::new(Default::default()));
        let (tk, _dir) = toolkit_with(wh(), sheets, Arc::new(FakeMailer::default()));
        let out = replicate_to_sheet(&tk, "abc123", "Data", None).await.unwrap();
        assert!(out.contains("No query provided"));
    }

    #[tokio::test]
    async fn test_replicate_zero_updated_cells_is_an_error() {
        let warehouse = Arc::new(FakeWarehouse::new(vec![Ok(vec![row(&[("N", json!(1))])])]));
        let sheets = Arc::new(FakeSheetStore::new(FakeSheetState {
            write_updated_cells: Some(0),
            ..Default::default()
        }));
        let (tk, _dir) = toolkit_with(warehouse, sheets, Arc::new(FakeMailer::default()));
        let out = replicate_to_sheet(&tk, "abc123", "Data", Some("SELECT N FROM T"))
            .await
            .unwrap();
        assert!(out.contains("Error replicating data"));
        assert!(out.contains("0 updated cells"));
    }

    #[tokio::test]
    async fn test_chart_requires_existing_tab() {
        let sheets = Arc::new(FakeSheetStore::new(Default::default()));
        let (tk, _dir) = toolkit_with(wh(), sheets, Arc::new(FakeMailer::default()));
        let out = create_chart(&tk, "abc123", "Missing", "pie", "A1:B5", "Shares")
            .await
            .unwrap();
        assert!(out.contains("tab 'Missing' not found"));
    }

    #[tokio::test]
    async fn test_prune_dry_run_deletes_nothing() {
        let old = Utc::now() - Duration::days(90);
        let sheets = Arc::new(FakeSheetStore::new(FakeSheetState {
            files: vec![DriveFile {
                id: "f1".to_string(),
                name: "Old Report".to_string(),
                created_time: old,
            }],
            ..Default::default()
        }));
        let (tk, _dir) = toolkit_with(wh(), sheets.clone(), Arc::new(FakeMailer::default()));
        let out = prune_files(&tk, 10, 30, true).await.unwrap();
        assert!(out.contains("DRY RUN"));
        assert!(out.contains("Old Report"));
        assert!(sheets.state.lock().unwrap().deleted.is_empty());
    }

    #[tokio::test]
    async fn test_prune_live_deletes_oldest_first() {
        let sheets = Arc::new(FakeSheetStore::new(FakeSheetState {
            files: vec![
                DriveFile {
                    id: "newer".to_string(),
                    name: "Newer".to_string(),
                    created_time: Utc::now() - Duration::days(40),
                },
                DriveFile {
                    id: "older".to_string(),
                    name: "Older".to_string(),
                    created_time: Utc::now() - Duration::days(400),
                },
                DriveFile {
                    id: "fresh".to_string(),
                    name: "Fresh".to_string(),
                    created_time: Utc::now() - Duration::days(1),
                },
            ],
            ..Default::default()
        }));
        let (tk, _dir) = toolkit_with(wh(), sheets.clone(), Arc::new(FakeMailer::default()));
        let out = prune_files(&tk, 1, 30, false).await.unwrap();
        assert!(out.contains("Pruned 1 files"));
        assert_eq!(sheets.state.lock().unwrap().deleted, vec!["older".to_string()]);
    }

    #[tokio::test]
    async fn test_alias_round_trip_through_url() {
        let sheets = Arc::new(FakeSheetStore::new(Default::default()));
        let (tk, _dir) = toolkit_with(wh(), sheets, Arc::new(FakeMailer::default()));
        save_alias(&tk, "Finance Report", "https://docs.google.com/spreadsheets/d/xyz789/edit")
            .await
            .unwrap();
        assert_eq!(tk.resolve_sheet_id("finance_report").await, "xyz789");
        // Unknown references pass through untouched.
        assert_eq!(tk.resolve_sheet_id("plainid").await, "plainid");
    }
}
