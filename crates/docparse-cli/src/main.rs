//! docparse - Command-line tool for the document parsing service
//!
//! Uploads files, URLs, or stdin content, waits for the parse jobs, and
//! prints or saves the extracted text, markdown, or JSON.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use docparse_client::config::{API_KEY_ENV, BASE_URL_ENV};
use docparse_client::{ClientConfig, ParseClient, ParseOptions, ResultType};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::ParseArgs;
use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "docparse")]
#[command(author, version, about = "Parse documents with a remote parsing service")]
struct Cli {
    /// Files, URLs, or '-' for stdin
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<String>,

    /// API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Service endpoint
    #[arg(long, env = BASE_URL_ENV)]
    base_url: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "DOCPARSE_CONFIG")]
    config: Option<PathBuf>,

    /// Parse option file (YAML, JSON, or TOML); replaces the config file's [options]
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Result representation to fetch
    #[arg(short, long, value_parser = parse_result_type)]
    result_type: Option<ResultType>,

    /// Document language
    #[arg(long)]
    language: Option<String>,

    /// File type of stdin content, e.g. pdf or .docx
    #[arg(long)]
    file_type: Option<String>,

    /// Pages to parse, e.g. "0,2-4"
    #[arg(long)]
    target_pages: Option<String>,

    /// Instruction passed to the parser
    #[arg(long)]
    parsing_instruction: Option<String>,

    /// Use the premium parsing mode
    #[arg(long)]
    premium_mode: bool,

    /// Use the fast parsing mode
    #[arg(long)]
    fast_mode: bool,

    /// Delay between job status queries
    #[arg(long, value_name = "MS")]
    check_interval_ms: Option<u64>,

    /// Give up on a job after this long
    #[arg(long, value_name = "MS")]
    max_timeout_ms: Option<u64>,

    /// Maximum number of jobs in flight
    #[arg(short, long)]
    workers: Option<usize>,

    /// Fail on the first error of each input instead of logging it
    #[arg(long)]
    strict: bool,

    /// Extra parse option forwarded to the service (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = config::parse_key_value)]
    set: Vec<(String, Value)>,

    /// Write each result to this directory instead of stdout
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Option overrides given as flags; these win over every file
    fn option_overrides(&self) -> Map<String, Value> {
        let mut overrides = Map::new();

        if let Some(result_type) = self.result_type {
            overrides.insert("result_type".into(), result_type.as_str().into());
        }
        if let Some(language) = &self.language {
            overrides.insert("language".into(), language.as_str().into());
        }
        if let Some(pages) = &self.target_pages {
            overrides.insert("target_pages".into(), pages.as_str().into());
        }
        if let Some(instruction) = &self.parsing_instruction {
            overrides.insert("parsing_instruction".into(), instruction.as_str().into());
        }
        if self.premium_mode {
            overrides.insert("premium_mode".into(), true.into());
        }
        if self.fast_mode {
            overrides.insert("fast_mode".into(), true.into());
        }
        if let Some(ms) = self.check_interval_ms {
            overrides.insert("check_interval_ms".into(), ms.into());
        }
        if let Some(ms) = self.max_timeout_ms {
            overrides.insert("max_timeout_ms".into(), ms.into());
        }
        if let Some(workers) = self.workers {
            overrides.insert("num_workers".into(), workers.into());
        }
        if self.strict {
            overrides.insert("ignore_errors".into(), false.into());
        }
        if self.quiet {
            overrides.insert("show_progress".into(), false.into());
        }
        for (key, value) in &self.set {
            overrides.insert(key.clone(), value.clone());
        }

        overrides
    }
}

fn parse_result_type(raw: &str) -> Result<ResultType, String> {
    raw.parse().map_err(|e: docparse_client::ParseError| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            OutputContext::new(OutputFormat::Text, false, false)
                .error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(cli.base_url.as_deref(), cli.output, cli.no_color);

    // Flags over the option file over the config file's [options]
    let base_options = match &cli.options {
        Some(path) => ParseOptions::from_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => ParseOptions::merged(&config.options).context("Invalid [options] in config file")?,
    };
    let options = base_options
        .overlay(&cli.option_overrides())
        .context("Invalid parse option")?;
    tracing::debug!(
        result_type = %options.result_type,
        workers = options.num_workers,
        ignore_errors = options.ignore_errors,
        "Resolved parse options"
    );

    let resolved = ClientConfig::resolve(cli.api_key.clone(), merged.base_url, &Map::new())?;
    let client = ParseClient::new(ClientConfig { options, ..resolved })
        .context("Failed to create parse client")?;

    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);

    let summary = commands::parse(
        &client,
        ParseArgs {
            inputs: &cli.inputs,
            file_type: cli.file_type.as_deref(),
            out_dir: cli.out_dir.as_deref(),
        },
        &ctx,
    )
    .await?;

    if cli.inputs.len() > 1 && !summary.is_success() {
        ctx.warn(&format!(
            "{} parsed, {} empty, {} failed",
            summary.parsed, summary.empty, summary.failed
        ));
    }

    Ok(summary.is_success())
}
