use chrono::Utc;
use clap::{Parser, ValueEnum};
use cursor_chat_extract::config::{ExtractConfig, load_file_config};
use cursor_chat_extract::{SharePayload, extract_conversation, render};
use eyre::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Extract the current Cursor AI chat conversation.
///
/// Without --context, the most recently used workspace in Cursor's local
/// storage is read.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding an in-memory chat context ("-" for stdin).
    #[arg(long, value_name = "FILE")]
    context: Option<PathBuf>,

    /// Cursor workspaceStorage directory.
    /// Auto-detected if omitted.
    #[arg(long, value_name = "DIR")]
    storage_root: Option<PathBuf>,

    /// Cursor global state.vscdb.
    /// Defaults to ../globalStorage/state.vscdb next to the storage root.
    #[arg(long, value_name = "FILE")]
    global_db: Option<PathBuf>,

    /// Maximum characters kept per message.
    #[arg(long, value_name = "N")]
    max_len: Option<usize>,

    /// Title for the output. Defaults to the first user message.
    #[arg(long)]
    title: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/cursor-chat-extract/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log extraction steps to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Markdown,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,cursor_chat_extract=debug"
    } else {
        "warn"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn read_context(path: &PathBuf) -> Result<Value> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("Failed to read context from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read context: {}", path.display()))?
    };
    serde_json::from_str(&raw).wrap_err("Context is not valid JSON")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    let verbose = cli.verbose || file_cfg.verbose.unwrap_or(false);
    init_tracing(verbose);

    // 2. Resolve settings (CLI > Config > Default)
    let defaults = ExtractConfig::default();
    let config = ExtractConfig {
        storage_root: cli.storage_root.or(file_cfg.storage_root),
        global_db: cli.global_db.or(file_cfg.global_db),
        max_content_len: cli
            .max_len
            .or(file_cfg.max_content_len)
            .unwrap_or(defaults.max_content_len),
        truncation_marker: file_cfg
            .truncation_marker
            .unwrap_or(defaults.truncation_marker),
    };

    // 3. Run the extraction
    let context = cli.context.as_ref().map(read_context).transpose()?;
    let conversation = extract_conversation(context.as_ref(), &config)?;

    if conversation.is_empty() {
        eprintln!("No conversation found.");
    }

    // 4. Render
    let payload = SharePayload::from_conversation(&conversation, cli.title.as_deref());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        Format::Json => render::write_json(&mut out, &payload),
        Format::Markdown => {
            render::write_markdown(&mut out, &payload.title, &conversation, Utc::now())
        }
    }
    .wrap_err("Failed to write output")?;
    out.flush().wrap_err("Failed to flush output")?;

    Ok(())
}
