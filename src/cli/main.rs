use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use genmeta::{config, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "genmeta",
    version,
    about = "Inspect, audit, and normalize generation metadata embedded in AI images"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Parse a literal metadata string instead of image files
    #[arg(long, value_name = "STRING", conflicts_with = "paths")]
    text: Option<String>,

    /// Print the canonical re-encoded metadata text
    #[arg(long)]
    encode: bool,

    /// Write the canonical metadata text back into the image(s)
    #[arg(long)]
    rewrite: bool,

    /// Preview rewrites without writing to files
    #[arg(long)]
    dry_run: bool,

    /// Exit with a failure status if any metadata fails the audit
    #[arg(long)]
    strict: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;

    // Override dry_run from CLI flag
    if cli.dry_run {
        config.output.dry_run = true;
    }

    let pipeline = pipeline::Pipeline::from_config(&config)?;

    // Handle --text
    if let Some(ref text) = cli.text {
        let inspection = pipeline.inspect_text(text);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        } else {
            print_record(&inspection.record);
            print_audit(&inspection.audit);
            if cli.encode {
                print_encoded(inspection.encoded.as_deref());
            }
        }
        return Ok(exit_status(cli.strict, !inspection.audit.success));
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files, directories, or --text specified. Use --help for usage.");
    }

    // Collect images
    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    log::info!("Found {} image(s) to process", images.len());
    if cli.rewrite && config.output.dry_run {
        log::info!("DRY RUN — no files will be modified");
    }

    let mut results = Vec::new();
    let total = images.len();

    for (i, image_path) in images.iter().enumerate() {
        log::info!(
            "[{}/{}] Processing: {}",
            i + 1,
            total,
            image_path.display()
        );

        let mut result = pipeline.process_image(image_path);

        if cli.rewrite && result.error.is_none() && !result.record.is_empty() {
            match pipeline.rewrite_image(
                image_path,
                config.output.dry_run,
                config.output.backup_originals,
            ) {
                Ok(Some(_)) if config.output.dry_run => log::info!("  Would rewrite metadata"),
                Ok(Some(_)) => log::info!("  Metadata rewritten"),
                Ok(None) => {}
                Err(e) => result.error = Some(format!("Failed to rewrite metadata: {e:#}")),
            }
        }

        if cli.json {
            results.push(result);
            continue;
        }

        if let Some(ref err) = result.error {
            log::error!("  Error: {err}");
        } else if result.record.is_empty() {
            log::info!("  No generation metadata found");
        } else {
            print_record(&result.record);
            print_audit(&result.audit);
            if cli.encode {
                print_encoded(result.encoded.as_deref());
            }
        }

        results.push(result);
    }

    // JSON output
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    // Summary
    let blocked = results.iter().filter(|r| !r.audit.success).count();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let with_metadata = results.iter().filter(|r| !r.record.is_empty()).count();
    log::info!(
        "Done: {with_metadata} with metadata, {blocked} blocked, {failed} failed out of {total} images"
    );

    Ok(exit_status(cli.strict, blocked > 0))
}

fn exit_status(strict: bool, blocked: bool) -> ExitCode {
    if strict && blocked {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print a parsed record as a table.
fn print_record(record: &genmeta::MetadataRecord) {
    println!();
    println!("  {BOLD}Generation Metadata:{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(72));

    let known = [
        ("Prompt", &record.prompt),
        ("Negative prompt", &record.negative_prompt),
        ("Steps", &record.steps),
        ("Sampler", &record.sampler),
        ("CFG scale", &record.cfg_scale),
        ("Seed", &record.seed),
    ];
    for (tag, value) in known {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            print_row(tag, v);
        }
    }
    for (key, value) in record.other.iter() {
        print_row(key, value);
    }

    if !record.resources.is_empty() {
        println!("  {DIM}{}{RESET}", "─".repeat(72));
        println!("  {BOLD}Resources:{RESET}");
        for resource in &record.resources {
            let mut value = resource.name.clone();
            if let Some(weight) = resource.weight {
                value.push_str(&format!(" (weight {weight})"));
            }
            if let Some(ref hash) = resource.hash {
                value.push_str(&format!(" [{hash}]"));
            }
            print_row(&resource.kind, &value);
        }
    }

    println!("  {DIM}{}{RESET}", "─".repeat(72));
}

/// Print the audit verdict.
fn print_audit(audit: &genmeta::AuditResult) {
    if audit.success {
        println!("  {GREEN}Audit: passed{RESET}");
    } else {
        println!(
            "  {RED}Audit: blocked for {}{RESET}",
            audit.blocked_for.join(", ")
        );
    }
    println!();
}

/// Print the canonical encoded text.
fn print_encoded(encoded: Option<&str>) {
    match encoded {
        Some(text) => {
            println!("  {BOLD}Canonical text:{RESET}");
            for line in text.lines() {
                println!("  {line}");
            }
            println!();
        }
        None => println!("  {DIM}(nothing to encode){RESET}"),
    }
}

/// Print a single row in the metadata table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
