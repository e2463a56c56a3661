//! Spreadsheet collaborator: Sheets + Drive REST operations behind a trait.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::Duration;

/// A spreadsheet created by `SheetStore::create`.
#[derive(Debug, Clone)]
pub struct CreatedSheet {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct QuotaInfo {
    pub usage_bytes: u64,
    pub limit_bytes: u64,
}

impl QuotaInfo {
    pub fn percent_used(&self) -> f64 {
        if self.limit_bytes == 0 {
            0.0
        } else {
            self.usage_bytes as f64 / self.limit_bytes as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Column,
    Line,
    Bar,
    Pie,
}

impl ChartKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "COLUMN" => Ok(Self::Column),
            "LINE" => Ok(Self::Line),
            "BAR" => Ok(Self::Bar),
            "PIE" => Ok(Self::Pie),
            other => Err(anyhow!(
                "Unsupported chart type '{}'. Use COLUMN, LINE, BAR, or PIE.",
                other
            )),
        }
    }
}

#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn create(&self, title: &str) -> Result<CreatedSheet>;
    async fn rename(&self, sheet_id: &str, new_title: &str) -> Result<()>;
    async fn read_range(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<Value>>>;
    /// Writes values and returns the updated-cell count reported by the
    /// backend. Callers treat 0 updated cells as a failed write.
    async fn write_range(
        &self,
        sheet_id: &str,
        range: &str,
        values: &[Vec<Value>],
    ) -> Result<u64>;
    async fn tab_titles(&self, sheet_id: &str) -> Result<Vec<String>>;
    async fn add_tab(&self, sheet_id: &str, title: &str) -> Result<()>;
    async fn tab_id(&self, sheet_id: &str, title: &str) -> Result<Option<i64>>;
    async fn create_chart(
        &self,
        sheet_id: &str,
        tab_id: i64,
        kind: ChartKind,
        data_range: &str,
        title: &str,
    ) -> Result<()>;
    async fn share(&self, sheet_id: &str, email: &str) -> Result<()>;
    async fn list_files(&self) -> Result<Vec<DriveFile>>;
    async fn delete_file(&self, file_id: &str) -> Result<()>;
    async fn check_quota(&self) -> Result<QuotaInfo>;
}

// ============================================================================
// A1 range parsing
// ============================================================================

/// Half-open grid coordinates for a chart source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub start_row: i64,
    pub end_row: i64,
    pub start_col: i64,
    pub end_col: i64,
}

fn column_index(letters: &str) -> Result<i64> {
    let mut index = 0i64;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(anyhow!("Invalid column reference '{}'", letters));
        }
        index = index * 26 + (c.to_ascii_uppercase() as i64 - 'A' as i64 + 1);
    }
    Ok(index - 1)
}

fn split_cell(cell: &str) -> Result<(i64, i64)> {
    let letters: String = cell.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits: String = cell.chars().skip(letters.len()).collect();
    if letters.is_empty() || digits.is_empty() {
        return Err(anyhow!("Invalid cell reference '{}'", cell));
    }
    let row: i64 = digits
        .parse()
        .with_context(|| format!("Invalid row in cell reference '{}'", cell))?;
    Ok((row - 1, column_index(&letters)?))
}

/// Parse an A1 range like "A1:C20" (tab prefix allowed and ignored) into
/// half-open grid coordinates for the batchUpdate API.
pub fn parse_a1_range(range: &str) -> Result<GridRange> {
    let bare = range.rsplit('!').next().unwrap_or(range);
    let (start, end) = bare
        .split_once(':')
        .ok_or_else(|| anyhow!("Range '{}' must be of the form A1:C20", range))?;
    let (start_row, start_col) = split_cell(start.trim())?;
    let (end_row, end_col) = split_cell(end.trim())?;
    Ok(GridRange {
        start_row,
        end_row: end_row + 1,
        start_col,
        end_col: end_col + 1,
    })
}

/// Extract a spreadsheet ID from a full URL, or return the input when it
/// already looks like a bare ID.
pub fn extract_sheet_id(input: &str) -> String {
    if let Some(rest) = input.split("/d/").nth(1) {
        rest.split('/').next().unwrap_or(rest).to_string()
    } else {
        input.to_string()
    }
}

pub fn sheet_url(sheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{}", sheet_id)
}

// ============================================================================
// GoogleSheetStore
// ============================================================================

pub struct GoogleSheetStore {
    client: reqwest::Client,
    api_base: String,
    drive_base: String,
    token: String,
}

impl GoogleSheetStore {
    pub fn new(config: &sibyl_core::config::SheetsConfig) -> Result<Self> {
        let token = config
            .access_token
            .clone()
            .ok_or_else(|| anyhow!("Sheets access token is not configured"))?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            drive_base: config.drive_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to reach spreadsheet API")?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            // Keep the status code in the message so the classifier's
            // substring table can key off it.
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or(text);
            anyhow::bail!("Sheets API error ({}): {}", status.as_u16(), detail);
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).context("Failed to parse spreadsheet API response")
    }

    async fn batch_update(&self, sheet_id: &str, requests: Value) -> Result<Value> {
        let url = format!("{}/spreadsheets/{}:batchUpdate", self.api_base, sheet_id);
        self.send(self.client.post(&url).json(&json!({ "requests": requests })))
            .await
    }
}

#[async_trait]
impl SheetStore for GoogleSheetStore {
    async fn create(&self, title: &str) -> Result<CreatedSheet> {
        let url = format!("{}/spreadsheets", self.api_base);
        let body = json!({ "properties": { "title": title } });
        let payload = self.send(self.client.post(&url).json(&body)).await?;
        let id = payload
            .get("spreadsheetId")
            .and_then(|v| v.as_str())
            .context("Create response missing spreadsheetId")?
            .to_string();
        let url = payload
            .get("spreadsheetUrl")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| sheet_url(&id));
        tracing::info!(sheet_id = %id, "Created spreadsheet '{}'", title);
        Ok(CreatedSheet { id, url })
    }

    async fn rename(&self, sheet_id: &str, new_title: &str) -> Result<()> {
        self.batch_update(
            sheet_id,
            json!([{
                "updateSpreadsheetProperties": {
                    "properties": { "title": new_title },
                    "fields": "title"
                }
            }]),
        )
        .await?;
        Ok(())
    }

    async fn read_range(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<Value>>> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base,
            sheet_id,
            urlencode(range)
        );
        let payload = self.send(self.client.get(&url)).await?;
        let values = payload
            .get("values")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        values
            .into_iter()
            .map(|row| {
                row.as_array()
                    .cloned()
                    .context("Malformed values response: row is not an array")
            })
            .collect()
    }

    async fn write_range(
        &self,
        sheet_id: &str,
        range: &str,
        values: &[Vec<Value>],
    ) -> Result<u64> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}?valueInputOption=USER_ENTERED",
            self.api_base,
            sheet_id,
            urlencode(range)
        );
        let body = json!({ "range": range, "values": values });
        let payload = self.send(self.client.put(&url).json(&body)).await?;
        Ok(payload
            .get("updatedCells")
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }

    async fn tab_titles(&self, sheet_id: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/spreadsheets/{}?fields=sheets.properties",
            self.api_base, sheet_id
        );
        let payload = self.send(self.client.get(&url)).await?;
        Ok(payload
            .get("sheets")
            .and_then(|v| v.as_array())
            .map(|tabs| {
                tabs.iter()
                    .filter_map(|t| t.pointer("/properties/title").and_then(|v| v.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_tab(&self, sheet_id: &str, title: &str) -> Result<()> {
        self.batch_update(
            sheet_id,
            json!([{ "addSheet": { "properties": { "title": title } } }]),
        )
        .await?;
        Ok(())
    }

    async fn tab_id(&self, sheet_id: &str, title: &str) -> Result<Option<i64>> {
        let url = format!(
            "{}/spreadsheets/{}?fields=sheets.properties",
            self.api_base, sheet_id
        );
        let payload = self.send(self.client.get(&url)).await?;
        Ok(payload
            .get("sheets")
            .and_then(|v| v.as_array())
            .and_then(|tabs| {
                tabs.iter().find_map(|t| {
                    let props = t.get("properties")?;
                    if props.get("title")?.as_str()? == title {
                        props.get("sheetId")?.as_i64()
                    } else {
                        None
                    }
                })
            }))
    }

    async fn create_chart(
        &self,
        sheet_id: &str,
        tab_id: i64,
        kind: ChartKind,
        data_range: &str,
        title: &str,
    ) -> Result<()> {
        let grid = parse_a1_range(data_range)?;
        let source = |start_col: i64, end_col: i64| {
            json!({
                "sheetId": tab_id,
                "startRowIndex": grid.start_row,
                "endRowIndex": grid.end_row,
                "startColumnIndex": start_col,
                "endColumnIndex": end_col,
            })
        };
        let spec = match kind {
            ChartKind::Pie => json!({
                "title": title,
                "pieChart": {
                    "legendPosition": "RIGHT_LEGEND",
                    "domain": { "sourceRange": { "sources": [source(grid.start_col, grid.start_col + 1)] } },
                    "series": { "sourceRange": { "sources": [source(grid.start_col + 1, grid.end_col)] } },
                }
            }),
            basic => {
                let chart_type = match basic {
                    ChartKind::Line => "LINE",
                    ChartKind::Bar => "BAR",
                    _ => "COLUMN",
                };
                json!({
                    "title": title,
                    "basicChart": {
                        "chartType": chart_type,
                        "legendPosition": "BOTTOM_LEGEND",
                        "headerCount": 1,
                        "domains": [{ "domain": { "sourceRange": { "sources": [source(grid.start_col, grid.start_col + 1)] } } }],
                        "series": [{ "series": { "sourceRange": { "sources": [source(grid.start_col + 1, grid.end_col)] } }, "targetAxis": "LEFT_AXIS" }],
                    }
                })
            }
        };
        self.batch_update(
            sheet_id,
            json!([{
                "addChart": {
                    "chart": {
                        "spec": spec,
                        "position": { "overlayPosition": { "anchorCell": {
                            "sheetId": tab_id,
                            "rowIndex": grid.start_row,
                            "columnIndex": grid.end_col + 1,
                        } } }
                    }
                }
            }]),
        )
        .await?;
        Ok(())
    }

    async fn share(&self, sheet_id: &str, email: &str) -> Result<()> {
        let url = format!(
            "{}/files/{}/permissions?sendNotificationEmail=false",
            self.drive_base, sheet_id
        );
        let body = json!({ "type": "user", "role": "writer", "emailAddress": email });
        self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<DriveFile>> {
        let url = format!(
            "{}/files?q={}&fields=files(id,name,createdTime)&orderBy=createdTime&pageSize=1000",
            self.drive_base,
            urlencode("mimeType='application/vnd.google-apps.spreadsheet' and trashed=false"),
        );
        let payload = self.send(self.client.get(&url)).await?;
        let mut files = Vec::new();
        if let Some(entries) = payload.get("files").and_then(|v| v.as_array()) {
            for entry in entries {
                let id = entry.get("id").and_then(|v| v.as_str());
                let name = entry.get("name").and_then(|v| v.as_str());
                let created = entry
                    .get("createdTime")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
                if let (Some(id), Some(name), Some(created)) = (id, name, created) {
                    files.push(DriveFile {
                        id: id.to_string(),
                        name: name.to_string(),
                        created_time: created.with_timezone(&Utc),
                    });
                }
            }
        }
        Ok(files)
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", self.drive_base, file_id);
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn check_quota(&self) -> Result<QuotaInfo> {
        let url = format!("{}/about?fields=storageQuota", self.drive_base);
        let payload = self.send(self.client.get(&url)).await?;
        let parse = |key: &str| {
            payload
                .pointer(&format!("/storageQuota/{}", key))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0)
        };
        Ok(QuotaInfo {
            usage_bytes: parse("usage"),
            limit_bytes: parse("limit"),
        })
    }
}

/// Minimal percent-encoding for range strings and query parameters.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_a1_range() {
        let grid = parse_a1_range("A1:C20").unwrap();
        assert_eq!(
            grid,
            GridRange { start_row: 0, end_row: 20, start_col: 0, end_col: 3 }
        );
    }

    #[test]
    fn test_parse_a1_range_with_tab_prefix() {
        let grid = parse_a1_range("Revenue!B2:D5").unwrap();
        assert_eq!(
            grid,
            GridRange { start_row: 1, end_row: 5, start_col: 1, end_col: 4 }
        );
    }

    #[test]
    fn test_parse_a1_range_rejects_single_cell() {
        assert!(parse_a1_range("A1").is_err());
    }

    #[test]
    fn test_column_index_multi_letter() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("Z").unwrap(), 25);
        assert_eq!(column_index("AA").unwrap(), 26);
        assert_eq!(column_index("AB").unwrap(), 27);
    }

    #[test]
    fn test_extract_sheet_id_from_url() {
        let url = "https://docs.google.com/spreadsheets/d/1aBcD_efG/edit#gid=0";
        assert_eq!(extract_sheet_id(url), "1aBcD_efG");
    }

    #[test]
    fn test_extract_sheet_id_passthrough() {
        assert_eq!(extract_sheet_id("1aBcD_efG"), "1aBcD_efG");
    }

    #[test]
    fn test_chart_kind_parse() {
        assert_eq!(ChartKind::parse("pie").unwrap(), ChartKind::Pie);
        assert_eq!(ChartKind::parse("COLUMN").unwrap(), ChartKind::Column);
        assert!(ChartKind::parse("scatter").is_err());
    }

    #[test]
    fn test_quota_percent() {
        let q = QuotaInfo { usage_bytes: 50, limit_bytes: 200 };
        assert!((q.percent_used() - 25.0).abs() < f64::EPSILON);
        let zero = QuotaInfo { usage_bytes: 50, limit_bytes: 0 };
        assert_eq!(zero.percent_used(), 0.0);
    }
}
