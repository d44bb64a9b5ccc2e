//! Parse command - submit inputs, wait for their jobs, print the results

use anyhow::{bail, Context, Result};
use docparse_client::{Content, ContentSource, ParseClient, ResultType};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::output::{truncate, OutputContext, OutputFormat, ResultRow};

/// Input name that reads content from stdin
pub const STDIN_INPUT: &str = "-";

/// What to parse and where the results go
pub struct ParseArgs<'a> {
    pub inputs: &'a [String],
    /// Declared type of stdin content
    pub file_type: Option<&'a str>,
    pub out_dir: Option<&'a Path>,
}

/// Per-run tally; any empty or failed input makes the run unsuccessful
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub parsed: usize,
    pub empty: usize,
    pub failed: usize,
}

impl Summary {
    pub fn is_success(&self) -> bool {
        self.empty == 0 && self.failed == 0
    }
}

struct Outcome {
    index: usize,
    input: String,
    result: Result<Option<Content>>,
    saved_to: Option<PathBuf>,
}

impl Outcome {
    fn status(&self) -> &'static str {
        match &self.result {
            Ok(Some(_)) => "parsed",
            Ok(None) => "empty",
            Err(_) => "failed",
        }
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    input: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Parse every input, at most `num_workers` at a time
pub async fn parse(
    client: &ParseClient,
    args: ParseArgs<'_>,
    ctx: &OutputContext,
) -> Result<Summary> {
    let stdin = read_stdin_if_needed(args.inputs, args.file_type).await?;

    if let Some(dir) = args.out_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let options = client.options();
    let workers = options.num_workers.max(1);
    let progress = progress_bar(args.inputs.len(), options.show_progress && !ctx.quiet);
    let file_type = args.file_type;
    let targets = args
        .out_dir
        .map(|dir| output_paths(dir, args.inputs, options.result_type));

    let mut outcomes: Vec<Outcome> = stream::iter(args.inputs.iter().enumerate().map(
        |(index, input)| {
            let stdin = stdin.as_deref();
            let progress = &progress;
            let target = targets.as_ref().and_then(|paths| paths.get(index));
            async move {
                progress.set_message(truncate(input, 40));
                let result = parse_one(client, input, stdin, file_type).await;

                let (result, saved_to) = match (result, target) {
                    (Ok(Some(content)), Some(path)) => {
                        match save(path, &content).await {
                            Ok(()) => (Ok(Some(content)), Some(path.clone())),
                            Err(e) => (Err(e), None),
                        }
                    }
                    (result, _) => (result, None),
                };

                progress.inc(1);
                Outcome {
                    index,
                    input: input.clone(),
                    result,
                    saved_to,
                }
            }
        },
    ))
    .buffer_unordered(workers)
    .collect()
    .await;

    progress.finish_and_clear();
    outcomes.sort_by_key(|o| o.index);

    render(&outcomes, ctx);
    Ok(tally(&outcomes))
}

async fn read_stdin_if_needed(inputs: &[String], file_type: Option<&str>) -> Result<Option<Vec<u8>>> {
    let count = inputs.iter().filter(|i| i.as_str() == STDIN_INPUT).count();
    match count {
        0 => Ok(None),
        1 => {
            if file_type.is_none() {
                bail!("--file-type is required when reading from stdin");
            }
            let mut data = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut data)
                .await
                .context("Failed to read stdin")?;
            Ok(Some(data))
        }
        _ => bail!("stdin ('-') can only be given once"),
    }
}

async fn parse_one(
    client: &ParseClient,
    input: &str,
    stdin: Option<&[u8]>,
    file_type: Option<&str>,
) -> Result<Option<Content>> {
    let result = match stdin {
        Some(data) if input == STDIN_INPUT => client.parse_bytes(data.to_vec(), file_type).await,
        // Paths and URLs carry their own type
        _ => client.parse_input(input, None).await,
    };
    Ok(result?)
}

async fn save(path: &Path, content: &Content) -> Result<()> {
    tokio::fs::write(path, content.to_string())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Where each input's result is written under `out_dir`
///
/// Inputs sharing a stem get `-2`, `-3`, ... suffixes in input order, so
/// no two results land in the same file.
pub fn output_paths(out_dir: &Path, inputs: &[String], result_type: ResultType) -> Vec<PathBuf> {
    let extension = match result_type {
        ResultType::Text => "txt",
        ResultType::Markdown => "md",
        ResultType::Json => "json",
    };

    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = output_stem(input);
            let mut name = format!("{}.{}", stem, extension);
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{}-{}.{}", stem, n, extension);
                n += 1;
            }
            out_dir.join(name)
        })
        .collect()
}

fn output_stem(input: &str) -> String {
    if input == STDIN_INPUT {
        "stdin".to_string()
    } else if let Ok(ContentSource::Url(url)) = ContentSource::url(input) {
        url.path_segments()
            .and_then(|segments| segments.last())
            .and_then(|name| Path::new(name).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string())
    } else {
        Path::new(input)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

fn progress_bar(len: usize, enabled: bool) -> ProgressBar {
    if !enabled || len < 2 {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    bar
}

fn render(outcomes: &[Outcome], ctx: &OutputContext) {
    match ctx.format {
        OutputFormat::Text => render_text(outcomes, ctx),
        OutputFormat::Json => {
            let records: Vec<JsonRecord<'_>> = outcomes
                .iter()
                .map(|o| JsonRecord {
                    input: &o.input,
                    status: o.status(),
                    content: match (&o.result, &o.saved_to) {
                        (Ok(Some(content)), None) => Some(content),
                        _ => None,
                    },
                    saved_to: o.saved_to.as_ref().map(|p| p.display().to_string()),
                    error: o.result.as_ref().err().map(|e| format!("{:#}", e)),
                })
                .collect();
            ctx.print_json(&records);
        }
        OutputFormat::Table => {
            let rows: Vec<ResultRow> = outcomes
                .iter()
                .map(|o| ResultRow {
                    input: truncate(&o.input, 48),
                    status: o.status().to_string(),
                    chars: match &o.result {
                        Ok(Some(content)) => content.len(),
                        _ => 0,
                    },
                    details: match (&o.result, &o.saved_to) {
                        (Err(e), _) => truncate(&e.to_string(), 60),
                        (_, Some(path)) => path.display().to_string(),
                        _ => String::new(),
                    },
                })
                .collect();
            ctx.print_table(&rows);
        }
    }
}

fn render_text(outcomes: &[Outcome], ctx: &OutputContext) {
    let many = outcomes.len() > 1;
    for outcome in outcomes {
        match (&outcome.result, &outcome.saved_to) {
            (Ok(Some(_)), Some(path)) => {
                ctx.success(&format!("{} -> {}", outcome.input, path.display()));
            }
            (Ok(Some(content)), None) => {
                if many {
                    ctx.heading(&format!("==> {} <==", outcome.input));
                }
                println!("{}", content);
            }
            (Ok(None), _) => ctx.warn(&format!("No content for {}", outcome.input)),
            (Err(e), _) => ctx.error(&format!("Failed to parse {}: {:#}", outcome.input, e)),
        }
    }
}

fn tally(outcomes: &[Outcome]) -> Summary {
    outcomes
        .iter()
        .fold(Summary::default(), |mut summary, o| {
            match &o.result {
                Ok(Some(_)) => summary.parsed += 1,
                Ok(None) => summary.empty += 1,
                Err(_) => summary.failed += 1,
            }
            summary
        })
}
