use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SibylConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub warehouse: WarehouseConfig,
    pub sheets: SheetsConfig,
    pub smtp: SmtpConfig,
}

impl SibylConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: SibylConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SIBYL_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("SIBYL_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("SIBYL_MAX_TOOL_TURNS") {
            if let Ok(n) = v.parse() {
                self.agent.max_tool_turns = n;
            }
        }
        if let Ok(v) = std::env::var("WAREHOUSE_URL") {
            self.warehouse.base_url = v;
        }
        if let Ok(v) = std::env::var("WAREHOUSE_TOKEN") {
            self.warehouse.token = Some(v);
        }
        if let Ok(v) = std::env::var("WAREHOUSE_DATABASE") {
            self.warehouse.database = v;
        }
        if let Ok(v) = std::env::var("WAREHOUSE_SCHEMA") {
            self.warehouse.schema = v;
        }
        if let Ok(v) = std::env::var("SHEETS_ACCESS_TOKEN") {
            self.sheets.access_token = Some(v);
        }
        if let Ok(v) = std::env::var("SHEETS_USER_EMAIL") {
            self.sheets.user_email = Some(v);
        }
        if let Ok(v) = std::env::var("SMTP_HOST") {
            self.smtp.host = v;
        }
        if let Ok(v) = std::env::var("SMTP_PORT") {
            if let Ok(n) = v.parse() {
                self.smtp.port = n;
            }
        }
        if let Ok(v) = std::env::var("SMTP_USER") {
            self.smtp.user = Some(v);
        }
        if let Ok(v) = std::env::var("SMTP_PASSWORD") {
            self.smtp.password = Some(v);
        }
        if let Ok(v) = std::env::var("SMTP_FROM_EMAIL") {
            self.smtp.from_email = Some(v);
        }
        if let Ok(v) = std::env::var("SMTP_FROM_NAME") {
            self.smtp.from_name = v;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    /// Sampling temperature. Kept at 0.0 so the same question tends to
    /// produce the same generated query.
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard cap on generate/act rounds per user turn.
    pub max_tool_turns: usize,
    /// Path to the system prompt markdown file.
    pub prompt_path: String,
    /// Path to the alias store JSON file.
    pub alias_path: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_turns: 8,
            prompt_path: "prompts.md".to_string(),
            alias_path: "resources.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Base URL of the SQL gateway (e.g. the account's statements endpoint).
    pub base_url: String,
    pub token: Option<String>,
    /// Default database context for unqualified names.
    pub database: String,
    /// Default schema context for unqualified names.
    pub schema: String,
    pub warehouse: String,
    pub role: Option<String>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8085".to_string(),
            token: None,
            database: "FINANCIALS".to_string(),
            schema: "PUBLIC".to_string(),
            warehouse: "COMPUTE_WH".to_string(),
            role: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub api_base: String,
    pub drive_base: String,
    pub access_token: Option<String>,
    /// Newly created sheets are auto-shared with this address; campaign
    /// verification copies go here too.
    pub user_email: Option<String>,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://sheets.googleapis.com/v4".to_string(),
            drive_base: "https://www.googleapis.com/drive/v3".to_string(),
            access_token: None,
            user_email: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            user: None,
            password: None,
            from_email: None,
            from_name: "Campaign Team".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
