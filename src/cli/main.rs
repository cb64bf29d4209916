use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use exif_privacy::config::Config;
use exif_privacy::pipeline::{self, AnalysisResponse, AnalyzeError};
use exif_privacy::report::AnalysisReport;

#[derive(Parser, Debug)]
#[command(
    name = "exif-privacy",
    version,
    about = "Privacy-focused EXIF inspector — show what an image's metadata reveals about you"
)]
struct Cli {
    /// Image files or directories to analyze
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let written = Config::default().save(cli.config.as_deref())?;
        println!("Default config written to {}", written.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.json {
        config.output.json = true;
    }

    let images = pipeline::collect_images(&cli.paths, &config.upload);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }
    log::info!("Found {} image(s) to analyze", images.len());

    let total = images.len();
    let mut json_results = Vec::new();
    let mut failed = 0;

    for (i, image_path) in images.iter().enumerate() {
        log::debug!("[{}/{}] Analyzing: {}", i + 1, total, image_path.display());

        let result = analyze_file(image_path, &config);

        match &result {
            Ok(report) => {
                if !config.output.json {
                    print_report(image_path, report);
                }
            }
            Err(e) => {
                failed += 1;
                let kind = if e.is_validation() { "Rejected" } else { "Error" };
                log::error!("{kind}: {}: {e}", image_path.display());
            }
        }

        if config.output.json {
            let response: AnalysisResponse = result.into();
            json_results.push(serde_json::json!({
                "path": image_path.display().to_string(),
                "result": response,
            }));
        }
    }

    // JSON output
    if config.output.json {
        let out = if config.output.pretty {
            serde_json::to_string_pretty(&json_results)?
        } else {
            serde_json::to_string(&json_results)?
        };
        println!("{out}");
    }

    log::info!(
        "Done: {} succeeded, {failed} failed out of {total} images",
        total - failed
    );

    if failed > 0 {
        anyhow::bail!("{failed} image(s) could not be analyzed");
    }
    Ok(())
}

/// Push a file from disk through the same cycle an upload goes through.
fn analyze_file(path: &Path, config: &Config) -> Result<AnalysisReport, AnalyzeError> {
    let bytes = std::fs::read(path)
        .map_err(|e| AnalyzeError::Processing(format!("Failed to read file: {e}")))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    pipeline::analyze_upload(&file_name, &bytes, config)
}

// ── Terminal rendering ───────────────────────────────────────────────

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Width of the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (aligns with value column).
const INDENT: &str = "                           ";

/// Print one report, organized by section.
fn print_report(path: &Path, report: &AnalysisReport) {
    let info = &report.basic_info;

    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    // --- Basic info ---
    print_section("Basic Info");
    print_row("FileName", &info.file_name);
    print_row("Format", &info.format);
    print_row("Mode", &info.mode);
    print_row("Resolution", &info.resolution);
    print_row("FileSize", &info.file_size);
    println!();

    // --- Privacy ---
    let flags = &report.privacy_flags;
    print_section("Privacy");
    print_flag("Location (GPS)", flags.has_gps);
    print_flag("Date / time", flags.has_datetime);
    print_flag("Camera make / model", flags.has_camera_model);
    println!();

    // --- GPS ---
    if let Some(gps) = &report.gps {
        print_section("GPS");
        match (gps.latitude, gps.longitude) {
            (Some(lat), Some(lon)) => {
                print_row("Latitude", &format!("{lat:.6}"));
                print_row("Longitude", &format!("{lon:.6}"));
            }
            _ => print_row("Position", "(could not be decoded)"),
        }
        println!();
    }

    // --- EXIF ---
    if report.exif.is_empty() {
        println!("  {DIM}({}){RESET}", report.message);
        println!();
        return;
    }

    print_section("EXIF");
    for entry in &report.exif {
        if entry.is_sensitive {
            print_sensitive(&entry.tag, &entry.value);
        } else {
            print_row(&entry.tag, &entry.value);
        }
    }
    println!();
    println!("  {DIM}{} tags, {YELLOW}!{RESET}{DIM} = privacy-sensitive{RESET}", report.exif.len());
    println!();
}

fn print_section(title: &str) {
    println!("  {BOLD}{title}{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
}

fn print_flag(label: &str, exposed: bool) {
    let tag_col = format!("{:<22}", label);
    if exposed {
        println!("  {tag_col} : {RED}exposed{RESET}");
    } else {
        println!("  {tag_col} : {GREEN}not present{RESET}");
    }
}

/// Print a single row in the EXIF display table.
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

/// Print a privacy-sensitive row (yellow with !).
fn print_sensitive(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    let last = lines.len() - 1;
    for (i, line) in lines.iter().enumerate() {
        let marker = if i == last { " !" } else { "" };
        if i == 0 {
            println!("  {YELLOW}{tag_col} : {line}{marker}{RESET}");
        } else {
            println!("  {YELLOW}{INDENT}{line}{marker}{RESET}");
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
