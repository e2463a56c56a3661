//! Personalised email campaigns driven by spreadsheet rows.
//!
//! Safety defaults match the rest of the destructive tool surface:
//! `dry_run` and `test_mode` are both on unless explicitly disabled, and a
//! verification copy always goes to the configured user first.

use crate::toolkit::Toolkit;
use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

const EMAIL_COLUMNS: &[&str] = &["contact", "email", "customer_email"];
const TEST_MODE_CAP: usize = 3;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap());

struct OutboundEmail {
    to: String,
    subject: String,
    body: String,
}

fn cell_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fill `{column}` placeholders from the row. Errors name the first
/// missing column so the model can fix its template.
fn fill_template(template: &str, row_data: &HashMap<String, String>) -> Result<String, String> {
    let mut missing = None;
    let filled = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        match row_data.get(key) {
            Some(value) => value.clone(),
            None => {
                if missing.is_none() {
                    missing = Some(key.to_string());
                }
                String::new()
            }
        }
    });
    match missing {
        Some(key) => Err(key),
        None => Ok(filled.into_owned()),
    }
}

/// Column values are reachable under three spellings so templates can use
/// whichever casing reads best: `customer_name`, `CUSTOMER_NAME`, and
/// `CustomerName`.
fn row_data(headers: &[String], row: &[Value]) -> HashMap<String, String> {
    let mut data = HashMap::new();
    for (header, value) in headers.iter().zip(row) {
        let text = cell_string(value);
        data.insert(header.clone(), text.clone());
        data.insert(header.to_uppercase(), text.clone());
        let title: String = header
            .split('_')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect();
        data.insert(title, text);
    }
    data
}

#[allow(clippy::too_many_arguments)]
pub async fn send_campaign(
    toolkit: &Toolkit,
    reference: &str,
    subject_template: &str,
    body_template: &str,
    tab: &str,
    test_mode: bool,
    dry_run: bool,
) -> Result<String> {
    if toolkit.config.smtp.user.is_none() || toolkit.config.smtp.password.is_none() {
        return Ok("❌ Email not configured!\n\n\
            Please set these environment variables in .env:\n\
            - SMTP_USER=your-email@gmail.com\n\
            - SMTP_PASSWORD=your-app-password\n\
            - SMTP_FROM_EMAIL=your-email@gmail.com\n\
            - SMTP_FROM_NAME=Campaign Team\n\n\
            For Gmail: Create an App Password at https://myaccount.google.com/apppasswords"
            .to_string());
    }

    let sheet_id = toolkit.resolve_sheet_id(reference).await;
    let range = format!("{}!A1:Z1000", tab);
    let values = match toolkit.sheets.read_range(&sheet_id, &range).await {
        Ok(values) => values,
        Err(e) => {
            return Ok(format!(
                "Unable to access the spreadsheet.\nProvide the sheet URL or sheet ID.\n\nError: {}",
                e
            ))
        }
    };

    if values.len() < 2 {
        return Ok(
            "No campaign data found. Ensure the sheet has a header row and at least one data row."
                .to_string(),
        );
    }

    let raw_headers: Vec<String> = values[0].iter().map(cell_string).collect();
    let headers: Vec<String> = raw_headers
        .iter()
        .map(|h| h.to_lowercase().replace(' ', "_"))
        .collect();

    let email_column = headers
        .iter()
        .find(|h| EMAIL_COLUMNS.contains(&h.as_str()))
        .cloned();
    if email_column.is_none() {
        return Ok(format!(
            "Sheet must have an email/contact column. Found: {}",
            raw_headers.join(", ")
        ));
    }
    let email_column = email_column.unwrap();

    let mut outbound = Vec::new();
    for row in &values[1..] {
        if row.len() < headers.len() {
            continue;
        }
        let data = row_data(&headers, row);
        let address = data.get(&email_column).cloned().unwrap_or_default();
        let address = address.trim().to_string();
        if !address.contains('@') {
            continue;
        }
        let subject = match fill_template(subject_template, &data) {
            Ok(subject) => subject,
            Err(missing) => {
                let mut columns: Vec<&String> = data.keys().collect();
                columns.sort();
                return Ok(format!(
                    "Template error: column {{{}}} not found in sheet.\nAvailable columns: {}",
                    missing,
                    columns
                        .iter()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        };
        let body = match fill_template(body_template, &data) {
            Ok(body) => body,
            Err(missing) => {
                return Ok(format!(
                    "Template error: column {{{}}} not found in sheet.",
                    missing
                ))
            }
        };
        outbound.push(OutboundEmail { to: address, subject, body });
    }

    if outbound.is_empty() {
        return Ok("No valid email addresses found in campaign data.".to_string());
    }

    if let Some(user_email) = &toolkit.config.sheets.user_email {
        let first = &outbound[0];
        outbound.insert(
            0,
            OutboundEmail {
                to: user_email.clone(),
                subject: format!("[TEST] {}", first.subject),
                body: format!(
                    "🧪 VERIFICATION EMAIL\n\nThis copy is sent to you to verify the campaign.\n\n---\n\n{}",
                    first.body
                ),
            },
        );
    }

    let mode_label = if test_mode {
        outbound.truncate(TEST_MODE_CAP);
        "🧪 TEST MODE (first 3 emails only)".to_string()
    } else {
        format!("📧 FULL CAMPAIGN ({} emails)", outbound.len())
    };

    if dry_run {
        let mut preview = format!(
            "**DRY RUN: no emails sent** | {}\n\n**Would send {} emails:**\n\n",
            mode_label,
            outbound.len()
        );
        for (i, email) in outbound.iter().take(3).enumerate() {
            let body_preview: String = email.body.chars().take(100).collect();
            preview.push_str(&format!(
                "**Email {}:**\n- To: {}\n- Subject: {}\n- Body Preview: {}...\n\n",
                i + 1,
                email.to,
                email.subject,
                body_preview
            ));
        }
        if outbound.len() > 3 {
            preview.push_str(&format!("... and {} more emails\n\n", outbound.len() - 3));
        }
        preview.push_str("**To send:** Use `dry_run=false` after reviewing this preview.");
        return Ok(preview);
    }

    let mut sent = 0;
    let mut failed = Vec::new();
    for email in &outbound {
        match toolkit.mailer.send(&email.to, &email.subject, &email.body).await {
            Ok(()) => sent += 1,
            Err(e) => failed.push(format!("{}: {}", email.to, e)),
        }
    }

    let mut report = format!("## ✅ Campaign Sent! | {}\n\n**Sent:** {} emails\n", mode_label, sent);
    if !failed.is_empty() {
        report.push_str(&format!("**Failed:** {}\n", failed.len()));
        for failure in failed.iter().take(5) {
            report.push_str(&format!("- {}\n", failure));
        }
    }
    report.push_str("\n**Next steps:**\n1. Monitor delivery\n2. Track responses\n3. Follow up in 3-5 days");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::*;
    use serde_json::json;
    use std::sync::Arc;

    fn campaign_values() -> Vec<Vec<Value>> {
        vec![
            vec![json!("Customer Name"), json!("Email"), json!("Offer")],
            vec![json!("Acme"), json!("buyer@acme.com"), json!("10% off")],
            vec![json!("Globex"), json!("cfo@globex.com"), json!("free tier")],
            vec![json!("NoMail"), json!("not-an-address"), json!("ignored")],
        ]
    }

    fn store_with(values: Vec<Vec<Value>>) -> Arc<FakeSheetStore> {
        Arc::new(FakeSheetStore::new(FakeSheetState {
            read_values: values,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_dry_run_previews_without_sending() {
        let mailer = Arc::new(FakeMailer::default());
        let (tk, _dir) = toolkit_with(
            Arc::new(FakeWarehouse::new(vec![])),
            store_with(campaign_values()),
            mailer.clone(),
        );
        let out = send_campaign(
            &tk,
            "campaign",
            "Offer for {customer_name}",
            "Hi {customer_name}, enjoy {offer}.",
            "Sheet1",
            true,
            true,
        )
        .await
        .unwrap();
        assert!(out.contains("DRY RUN"));
        assert!(out.contains("Offer for Acme"));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_send_prepends_verification_copy() {
        let mailer = Arc::new(FakeMailer::default());
        let (tk, _dir) = toolkit_with(
            Arc::new(FakeWarehouse::new(vec![])),
            store_with(campaign_values()),
            mailer.clone(),
        );
        let out = send_campaign(
            &tk,
            "campaign",
            "Offer for {customer_name}",
            "Hi {customer_name}.",
            "Sheet1",
            false,
            false,
        )
        .await
        .unwrap();
        assert!(out.contains("Campaign Sent"));
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].0, "owner@example.com");
        assert!(sent[0].1.starts_with("[TEST]"));
        assert!(sent[0].2.contains("VERIFICATION EMAIL"));
        assert_eq!(sent[1].0, "buyer@acme.com");
        assert_eq!(sent[2].0, "cfo@globex.com");
    }

    #[tokio::test]
    async fn test_test_mode_caps_recipients() {
        let mut values = campaign_values();
        for i in 0..10 {
            values.push(vec![
                json!(format!("Extra {}", i)),
                json!(format!("user{}@example.com", i)),
                json!("offer"),
            ]);
        }
        let mailer = Arc::new(FakeMailer::default());
        let (tk, _dir) = toolkit_with(
            Arc::new(FakeWarehouse::new(vec![])),
            store_with(values),
            mailer.clone(),
        );
        let _ = send_campaign(&tk, "campaign", "S", "B", "Sheet1", true, false)
            .await
            .unwrap();
        assert_eq!(mailer.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_template_column_reports_error() {
        let mailer = Arc::new(FakeMailer::default());
        let (tk, _dir) = toolkit_with(
            Arc::new(FakeWarehouse::new(vec![])),
            store_with(campaign_values()),
            mailer.clone(),
        );
        let out = send_campaign(
            &tk,
            "campaign",
            "Offer for {account_tier}",
            "Hi.",
            "Sheet1",
            true,
            true,
        )
        .await
        .unwrap();
        assert!(out.contains("Template error: column {account_tier} not found"));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_email_column() {
        let values = vec![
            vec![json!("Name"), json!("Offer")],
            vec![json!("Acme"), json!("10% off")],
        ];
        let (tk, _dir) = toolkit_with(
            Arc::new(FakeWarehouse::new(vec![])),
            store_with(values),
            Arc::new(FakeMailer::default()),
        );
        let out = send_campaign(&tk, "campaign", "S", "B", "Sheet1", true, true)
            .await
            .unwrap();
        assert!(out.contains("must have an email/contact column"));
        assert!(out.contains("Name, Offer"));
    }

    #[tokio::test]
    async fn test_unconfigured_smtp_is_reported() {
        let (mut tk, _dir) = toolkit_with(
            Arc::new(FakeWarehouse::new(vec![])),
            store_with(campaign_values()),
            Arc::new(FakeMailer::default()),
        );
        tk.config.smtp.user = None;
        let out = send_campaign(&tk, "campaign", "S", "B", "Sheet1", true, true)
            .await
            .unwrap();
        assert!(out.contains("Email not configured"));
    }

    #[test]
    fn test_row_data_casings() {
        let headers = vec!["customer_name".to_string()];
        let data = row_data(&headers, &[json!("Acme")]);
        assert_eq!(data.get("customer_name").unwrap(), "Acme");
        assert_eq!(data.get("CUSTOMER_NAME").unwrap(), "Acme");
        assert_eq!(data.get("CustomerName").unwrap(), "Acme");
    }
}
