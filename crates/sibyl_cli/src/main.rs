use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use serde_json::Value;
use sibyl_agent::prompt::load_system_prompt;
use sibyl_agent::providers::anthropic::AnthropicOracle;
use sibyl_agent::{Conversation, Message};
use sibyl_core::alias::AliasStore;
use sibyl_core::config::SibylConfig;
use sibyl_tools::sheets::{ChartKind, CreatedSheet, DriveFile, QuotaInfo};
use sibyl_tools::{
    GoogleSheetStore, HttpWarehouse, Mailer, SheetStore, SmtpMailer, Toolkit,
};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "sibyl.toml")]
    config: String,

    /// Path to the system prompt file
    #[arg(short, long, default_value = "prompts.md")]
    prompt: String,

    /// Path to the sheet alias store
    #[arg(short, long, default_value = "resources.json")]
    aliases: String,

    /// Run a single question and exit instead of starting the REPL
    #[arg(short = 'q', long)]
    question: Option<String>,
}

/// Stand-in for an integration whose credentials are missing. Every call
/// fails with a message the agent can relay to the user.
struct Disabled(&'static str);

#[async_trait]
impl SheetStore for Disabled {
    async fn create(&self, _title: &str) -> Result<CreatedSheet> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn rename(&self, _sheet_id: &str, _new_title: &str) -> Result<()> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn read_range(&self, _sheet_id: &str, _range: &str) -> Result<Vec<Vec<Value>>> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn write_range(&self, _sheet_id: &str, _range: &str, _values: &[Vec<Value>]) -> Result<u64> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn tab_titles(&self, _sheet_id: &str) -> Result<Vec<String>> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn add_tab(&self, _sheet_id: &str, _title: &str) -> Result<()> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn tab_id(&self, _sheet_id: &str, _title: &str) -> Result<Option<i64>> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn create_chart(
        &self,
        _sheet_id: &str,
        _tab_id: i64,
        _kind: ChartKind,
        _data_range: &str,
        _title: &str,
    ) -> Result<()> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn share(&self, _sheet_id: &str, _email: &str) -> Result<()> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn list_files(&self) -> Result<Vec<DriveFile>> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn delete_file(&self, _file_id: &str) -> Result<()> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn check_quota(&self) -> Result<QuotaInfo> {
        anyhow::bail!("{} is not configured", self.0)
    }
}

#[async_trait]
impl Mailer for Disabled {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
        anyhow::bail!("{} is not configured", self.0)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    info!("Loading config from {}...", args.config);
    let config = SibylConfig::load_or_default(&args.config);

    let warehouse = Arc::new(HttpWarehouse::new(&config.warehouse)?);

    let sheets: Arc<dyn SheetStore> = match GoogleSheetStore::new(&config.sheets) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Sheets disabled: {}", e);
            Arc::new(Disabled("Google Sheets"))
        }
    };

    let mailer: Arc<dyn Mailer> = match SmtpMailer::new(&config.smtp) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            warn!("Email disabled: {}", e);
            Arc::new(Disabled("SMTP"))
        }
    };

    let aliases = AliasStore::open(&args.aliases);
    let oracle = Arc::new(AnthropicOracle::new(&config.llm)?);
    let system_prompt = load_system_prompt(&args.prompt);

    let toolkit = Arc::new(Toolkit::new(warehouse, sheets, mailer, aliases, config));
    let conversation = Conversation::new(oracle, toolkit, system_prompt);

    let mut history: Vec<Message> = Vec::new();

    if let Some(question) = args.question {
        println!("{}", conversation.send(&mut history, &question).await);
        return Ok(());
    }

    println!("Sibyl online. Type 'quit' to exit.");
    print!("> ");
    io::stdout().flush()?;

    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        if trimmed.is_empty() {
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        let reply = conversation.send(&mut history, trimmed).await;
        println!("\nSibyl: {}\n", reply);

        print!("> ");
        io::stdout().flush()?;
    }

    Ok(())
}
