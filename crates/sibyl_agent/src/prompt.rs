//! System prompt loading. The prompt lives in a markdown file so it can be
//! iterated on without a rebuild; a minimal fallback keeps the agent
//! bootable when the file is missing.

use std::path::Path;

const FALLBACK_PROMPT: &str =
    "You are a helpful business intelligence assistant. Answer questions about \
     company data using the available tools. Present results in business terms; \
     never show raw SQL to the user.";

/// Read the system prompt, substituting `{current_date}` if present.
pub fn load_system_prompt<P: AsRef<Path>>(path: P) -> String {
    let text = match std::fs::read_to_string(path.as_ref()) {
        Ok(text) => {
            tracing::info!(
                "System prompt loaded from {} ({} chars)",
                path.as_ref().display(),
                text.len()
            );
            text
        }
        Err(_) => {
            tracing::warn!(
                "Prompt file not found at {}, using fallback prompt",
                path.as_ref().display()
            );
            FALLBACK_PROMPT.to_string()
        }
    };
    text.replace(
        "{current_date}",
        &chrono::Utc::now().format("%Y-%m-%d").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_falls_back() {
        let prompt = load_system_prompt("/nonexistent/prompts.md");
        assert!(prompt.contains("business intelligence"));
    }

    #[test]
    fn test_date_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.md");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "Today is {{current_date}}.").unwrap();
        let prompt = load_system_prompt(&path);
        assert!(!prompt.contains("{current_date}"));
        assert!(prompt.starts_with("Today is 2"));
    }
}
