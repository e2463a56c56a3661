//! Markdown table rendering for query results.
//!
//! Every row-returning tool presents data through this one renderer so
//! output stays consistent across the catalogue. Column order follows the
//! first row's key order (serde_json is built with `preserve_order`).

use serde_json::Value;

/// One result row: column name → value, in warehouse column order.
pub type Row = serde_json::Map<String, Value>;

/// Default cap on rendered rows. Large result sets risk blowing the
/// model's context window; the footer still reports the true total.
pub const DEFAULT_MAX_ROWS: usize = 100;

const MAX_CELL_CHARS: usize = 50;

/// Render a value the way a human would expect to read it in a cell:
/// strings without quotes, null as empty, everything else via Display.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Format rows as a fixed-width markdown table with a row-count footer.
pub fn format_as_table(data: &[Row], max_rows: usize) -> String {
    if data.is_empty() {
        return "No data returned".to_string();
    }

    let display = &data[..data.len().min(max_rows)];
    let total_rows = data.len();
    let columns: Vec<&String> = display[0].keys().collect();

    let header = format!(
        "| {} |",
        columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" | ")
    );
    let separator = format!(
        "|{}|",
        columns.iter().map(|_| "------").collect::<Vec<_>>().join("|")
    );

    let mut lines = vec![header, separator];
    for row in display {
        let values: Vec<String> = columns
            .iter()
            .map(|col| {
                let mut text = row.get(*col).map(cell_text).unwrap_or_default();
                if text.chars().count() > MAX_CELL_CHARS {
                    text = text.chars().take(MAX_CELL_CHARS - 3).collect::<String>() + "...";
                }
                text
            })
            .collect();
        lines.push(format!("| {} |", values.join(" | ")));
    }

    let mut table = lines.join("\n");
    if total_rows > max_rows {
        table.push_str(&format!("\n\n*Showing {} of {} rows*", max_rows, total_rows));
    } else {
        table.push_str(&format!("\n\n*{} rows*", total_rows));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(format_as_table(&[], DEFAULT_MAX_ROWS), "No data returned");
    }

    #[test]
    fn test_basic_table() {
        let rows = vec![row(&[("name", json!("Acme")), ("revenue", json!(125000))])];
        let table = format_as_table(&rows, DEFAULT_MAX_ROWS);
        assert!(table.starts_with("| name | revenue |"));
        assert!(table.contains("| Acme | 125000 |"));
        assert!(table.ends_with("*1 rows*"));
    }

    #[test]
    fn test_null_renders_empty() {
        let rows = vec![row(&[("a", json!(null)), ("b", json!("x"))])];
        let table = format_as_table(&rows, DEFAULT_MAX_ROWS);
        assert!(table.contains("|  | x |"));
    }

    #[test]
    fn test_long_cell_truncated() {
        let long = "x".repeat(80);
        let rows = vec![row(&[("v", json!(long))])];
        let table = format_as_table(&rows, DEFAULT_MAX_ROWS);
        let expected = format!("{}...", "x".repeat(47));
        assert!(table.contains(&expected));
        assert!(!table.contains(&"x".repeat(48)));
    }

    #[test]
    fn test_row_cap_footer() {
        let rows: Vec<Row> = (0..120).map(|i| row(&[("n", json!(i))])).collect();
        let table = format_as_table(&rows, DEFAULT_MAX_ROWS);
        assert!(table.ends_with("*Showing 100 of 120 rows*"));
        // Header + separator + 100 rows + blank + footer
        assert_eq!(table.lines().filter(|l| l.starts_with("| ")).count(), 101);
    }
}
