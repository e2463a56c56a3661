//! Error classification: raw backend exception text → (kind, message,
//! suggestions).
//!
//! Warehouse patterns are regexes matched against the lower-cased error
//! text; sheet patterns are plain substrings. Both tables are matched in
//! order and the first hit wins — some patterns are substrings of others,
//! so the order is part of the contract. An unmatched error always falls
//! through to a per-domain generic classification; this layer never fails.

use regex::Regex;
use std::sync::LazyLock;

/// A classified error: short kind label, plain-language message, and
/// concrete next steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: &'static str,
    pub message: &'static str,
    pub suggestions: &'static [&'static str],
}

// ============================================================================
// Warehouse error table (regex, matched in order)
// ============================================================================

const WAREHOUSE_ERRORS: &[(&str, Classification)] = &[
    (
        "does not exist or not authorized",
        Classification {
            kind: "TableNotFound",
            message: "The table or view you're trying to access doesn't exist or you don't have permission.",
            suggestions: &[
                "Check the table name spelling",
                "Ensure you're using the correct schema (format: SCHEMA.TABLE)",
                "Verify you have SELECT permission on this table",
            ],
        },
    ),
    (
        "sql compilation error",
        Classification {
            kind: "SQLSyntaxError",
            message: "There's a syntax error in your SQL query.",
            suggestions: &[
                "Check for missing commas or quotes",
                "Verify column names exist in the table",
                "Try simplifying the query to isolate the issue",
            ],
        },
    ),
    (
        "numeric value.*out of range",
        Classification {
            kind: "NumericOverflow",
            message: "A numeric value in your query result is too large.",
            suggestions: &[
                "Use CAST() to convert to a larger data type",
                "Apply filters to reduce the range of values",
                "Consider using TO_VARCHAR() for very large numbers",
            ],
        },
    ),
    (
        "invalid identifier",
        Classification {
            kind: "InvalidIdentifier",
            message: "A column or table name in your query is invalid.",
            suggestions: &[
                "Use double quotes for case-sensitive or special character names",
                "Check for typos in column/table names",
            ],
        },
    ),
    (
        "division by zero",
        Classification {
            kind: "DivisionByZero",
            message: "Your query attempted to divide by zero.",
            suggestions: &[
                "Add a WHERE clause to filter out zero denominators",
                "Use NULLIF() to handle zero values: field / NULLIF(divisor, 0)",
                "Use a CASE statement to handle zero denominators",
            ],
        },
    ),
    (
        "authentication failed",
        Classification {
            kind: "AuthenticationError",
            message: "Failed to authenticate with the data warehouse.",
            suggestions: &[
                "Check WAREHOUSE_TOKEN in your environment",
                "Verify your warehouse account URL is correct",
                "Ensure your credentials haven't expired",
            ],
        },
    ),
    (
        "warehouse.*does not exist",
        Classification {
            kind: "WarehouseNotFound",
            message: "The specified warehouse doesn't exist or isn't accessible.",
            suggestions: &[
                "Check the [warehouse] section of your config",
                "Verify the warehouse name spelling",
                "Ensure the warehouse is running and not suspended",
            ],
        },
    ),
];

const WAREHOUSE_FALLBACK: Classification = Classification {
    kind: "WarehouseError",
    message: "An error occurred while executing your warehouse query.",
    suggestions: &[
        "Check the error details above",
        "Verify your SQL syntax is correct",
        "Try breaking down complex queries into simpler parts",
    ],
};

static WAREHOUSE_PATTERNS: LazyLock<Vec<(Regex, &'static Classification)>> = LazyLock::new(|| {
    WAREHOUSE_ERRORS
        .iter()
        .map(|(pattern, class)| {
            // Patterns are written lower-cased; matched against lower-cased text.
            (Regex::new(pattern).expect("invalid warehouse error pattern"), class)
        })
        .collect()
});

// ============================================================================
// Sheets error table (substring, matched in order)
// ============================================================================

const SHEETS_ERRORS: &[(&str, Classification)] = &[
    (
        "403",
        Classification {
            kind: "PermissionDenied",
            message: "Access denied to the spreadsheet.",
            suggestions: &[
                "Share the sheet with your service account email",
                "Check SHEETS_ACCESS_TOKEN is valid",
                "Verify the account has Editor or Viewer permissions",
            ],
        },
    ),
    (
        "404",
        Classification {
            kind: "SheetNotFound",
            message: "The spreadsheet or sheet tab was not found.",
            suggestions: &[
                "Verify the spreadsheet ID is correct",
                "Check that the sheet tab name matches exactly (case-sensitive)",
                "Ensure the spreadsheet hasn't been deleted",
            ],
        },
    ),
    (
        "Unable to parse range",
        Classification {
            kind: "InvalidRange",
            message: "The sheet range format is invalid.",
            suggestions: &[
                "Use A1 notation (e.g., 'Sheet1!A1:B10')",
                "Ensure the sheet name is correct",
                "Use single quotes for sheet names with spaces: 'My Sheet'!A1",
            ],
        },
    ),
    (
        "INVALID_ARGUMENT",
        Classification {
            kind: "InvalidArgument",
            message: "Invalid argument provided to the spreadsheet API.",
            suggestions: &[
                "Check that values are properly formatted",
                "Ensure range notation is correct",
            ],
        },
    ),
];

const SHEETS_FALLBACK: Classification = Classification {
    kind: "SheetsError",
    message: "An error occurred while accessing the spreadsheet service.",
    suggestions: &[
        "Verify the spreadsheet ID is correct",
        "Check that the account has proper permissions",
        "Try the operation again — might be a temporary API issue",
    ],
};

// ============================================================================
// Classification entry points
// ============================================================================

/// Classify a warehouse error. Never fails; unmatched text gets the
/// generic fallback.
pub fn classify_warehouse(error: &str) -> &'static Classification {
    let lowered = error.to_lowercase();
    for (pattern, class) in WAREHOUSE_PATTERNS.iter() {
        if pattern.is_match(&lowered) {
            return class;
        }
    }
    &WAREHOUSE_FALLBACK
}

/// Classify a spreadsheet-service error by substring search.
pub fn classify_sheets(error: &str) -> &'static Classification {
    for (pattern, class) in SHEETS_ERRORS {
        if error.contains(pattern) {
            return class;
        }
    }
    &SHEETS_FALLBACK
}

/// Render a user-facing error response: kind, plain message, numbered
/// suggestions, optional offending query, technical detail last.
pub fn format_error_response(
    error: &str,
    class: &Classification,
    query: Option<&str>,
) -> String {
    let mut response = format!("❌ **{}**\n\n{}\n\n", class.kind, class.message);

    if let Some(q) = query {
        response.push_str(&format!("**Query:**\n```\n{}\n```\n\n", q));
    }

    response.push_str("**💡 Suggestions:**\n");
    for (i, suggestion) in class.suggestions.iter().enumerate() {
        response.push_str(&format!("{}. {}\n", i + 1, suggestion));
    }

    response.push_str(&format!("\n**Technical Details:**\n{}", error));
    response
}

/// Live context for second-stage suggestion enrichment.
#[derive(Debug, Default)]
pub struct FixContext {
    pub available_tables: Vec<String>,
    pub available_columns: Vec<String>,
    pub available_tabs: Vec<String>,
}

/// Append context-aware suggestions when the caller has live catalogue
/// data. Returns an empty string when the kind has no matching context.
pub fn suggest_fixes(kind: &str, context: &FixContext) -> String {
    match kind {
        "TableNotFound" if !context.available_tables.is_empty() => {
            let listing: Vec<String> = context
                .available_tables
                .iter()
                .take(10)
                .map(|t| format!("  - {}", t))
                .collect();
            format!("\n**Available tables:**\n{}", listing.join("\n"))
        }
        "InvalidIdentifier" if !context.available_columns.is_empty() => {
            let listing: Vec<String> = context
                .available_columns
                .iter()
                .map(|c| format!("  - {}", c))
                .collect();
            format!("\n**Available columns:**\n{}", listing.join("\n"))
        }
        "SheetNotFound" if !context.available_tabs.is_empty() => {
            let listing: Vec<String> = context
                .available_tabs
                .iter()
                .map(|s| format!("  - {}", s))
                .collect();
            format!("\n**Available sheets:**\n{}", listing.join("\n"))
        }
        _ => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_not_found() {
        let class = classify_warehouse(
            "SQL compilation error: Object 'ANALYTICS.SALES' does not exist or not authorized",
        );
        // Both patterns match; the earlier table entry wins.
        assert_eq!(class.kind, "TableNotFound");
    }

    #[test]
    fn test_syntax_error() {
        let class = classify_warehouse("SQL compilation error: syntax error at line 3");
        assert_eq!(class.kind, "SQLSyntaxError");
    }

    #[test]
    fn test_numeric_overflow_regex() {
        let class = classify_warehouse("Numeric value '99999999999' out of range");
        assert_eq!(class.kind, "NumericOverflow");
    }

    #[test]
    fn test_case_insensitive_match() {
        let class = classify_warehouse("DIVISION BY ZERO in expression");
        assert_eq!(class.kind, "DivisionByZero");
    }

    #[test]
    fn test_warehouse_fallback() {
        let class = classify_warehouse("connection reset by peer");
        assert_eq!(class.kind, "WarehouseError");
        assert!(!class.suggestions.is_empty());
    }

    #[test]
    fn test_sheets_substring_match() {
        let class = classify_sheets("HttpError 404 when requesting spreadsheet");
        assert_eq!(class.kind, "SheetNotFound");
        let class = classify_sheets("Unable to parse range: Shet1!A1");
        assert_eq!(class.kind, "InvalidRange");
    }

    #[test]
    fn test_sheets_fallback() {
        let class = classify_sheets("socket timeout");
        assert_eq!(class.kind, "SheetsError");
    }

    #[test]
    fn test_format_error_response_sections() {
        let class = classify_warehouse("Division by zero");
        let rendered = format_error_response("Division by zero", class, Some("SELECT 1/0"));
        assert!(rendered.contains("DivisionByZero"));
        assert!(rendered.contains("SELECT 1/0"));
        assert!(rendered.contains("1. Add a WHERE clause"));
        assert!(rendered.ends_with("Division by zero"));
    }

    #[test]
    fn test_suggest_fixes_tables() {
        let ctx = FixContext {
            available_tables: vec!["SALES".into(), "ORDERS".into()],
            ..Default::default()
        };
        let extra = suggest_fixes("TableNotFound", &ctx);
        assert!(extra.contains("- SALES"));
        assert!(extra.contains("- ORDERS"));
    }

    #[test]
    fn test_suggest_fixes_no_context() {
        let extra = suggest_fixes("TableNotFound", &FixContext::default());
        assert!(extra.is_empty());
    }
}
