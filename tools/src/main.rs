use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codec::{Demo, ParseOptions};
use glob::Pattern;
use srcdem_tools::{
    error_report, inspect_demo, patch_console_commands, search_console, InspectReport,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "srcdem-tools",
    version,
    about = "Source engine demo inspection and patching tools"
)]
struct Cli {
    /// Log decode diagnostics (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Skip entity and user message payloads.
    #[arg(long, global = true)]
    framing_only: bool,
    /// Stop after this many frames.
    #[arg(long, global = true)]
    max_frames: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a demo, or every demo in a directory.
    Inspect {
        /// Path to a demo file or a directory of demos.
        path: PathBuf,
        /// Optional glob filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the error log of a decode pass.
    Errors {
        /// Path to the demo file.
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Find console commands containing some text.
    Search {
        /// Path to the demo file.
        path: PathBuf,
        /// Text to look for.
        #[arg(long)]
        text: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Replace text in console commands and write a patched copy.
    Patch {
        /// Path to the demo file.
        path: PathBuf,
        /// Text to replace.
        #[arg(long)]
        from: String,
        /// Replacement text.
        #[arg(long)]
        to: String,
        /// Where to write the patched demo.
        #[arg(long, short)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let options = parse_options(&cli);

    match cli.command {
        Command::Inspect { path, glob, format } => {
            if path.is_dir() {
                for entry in collect_demo_entries(&path, glob.as_deref())? {
                    let demo = load_demo(&entry, &options)?;
                    let report = inspect_demo(&demo);
                    if format == OutputFormat::Text {
                        println!("== {} ==", entry.display());
                    }
                    print_inspect(&report, format)?;
                }
            } else {
                let demo = load_demo(&path, &options)?;
                print_inspect(&inspect_demo(&demo), format)?;
            }
        }
        Command::Errors { path, format } => {
            let demo = load_demo(&path, &options)?;
            let report = error_report(&demo);
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => {
                    for line in &report.errors {
                        println!("{line}");
                    }
                    if report.dropped > 0 {
                        println!("... {} more errors dropped", report.dropped);
                    }
                }
            }
        }
        Command::Search { path, text, format } => {
            let demo = load_demo(&path, &options)?;
            let hits = search_console(&demo, &text);
            match format {
                OutputFormat::Json => print_json(&hits)?,
                OutputFormat::Text => {
                    for hit in &hits {
                        println!("[{}] tick {}: {}", hit.frame, hit.tick, hit.command);
                    }
                }
            }
        }
        Command::Patch {
            path,
            from,
            to,
            output,
        } => {
            let demo = load_demo(&path, &options)?;
            let outcome = patch_console_commands(&demo, &from, &to)
                .with_context(|| format!("patch {}", path.display()))?;
            fs::write(&output, &outcome.bytes)
                .with_context(|| format!("write demo {}", output.display()))?;
            println!(
                "patched {} commands into {}",
                outcome.patched.len(),
                output.display()
            );
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_options(cli: &Cli) -> ParseOptions {
    let mut options = if cli.framing_only {
        ParseOptions::framing_only()
    } else {
        ParseOptions::default()
    };
    if let Some(max_frames) = cli.max_frames {
        options.max_frames = max_frames;
    }
    options
}

fn load_demo(path: &Path, options: &ParseOptions) -> Result<Demo> {
    let bytes = fs::read(path).with_context(|| format!("read demo {}", path.display()))?;
    Demo::parse(bytes, options).with_context(|| format!("parse demo {}", path.display()))
}

fn collect_demo_entries(dir: &Path, glob: Option<&str>) -> Result<Vec<PathBuf>> {
    let pattern = match glob {
        Some(value) => Pattern::new(value).context("invalid glob pattern")?,
        None => Pattern::new("*.dem").context("default glob pattern")?,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches_path = pattern.matches_path(&path);
        let matches_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| pattern.matches(name));
        if matches_path || matches_name {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{json}");
    Ok(())
}

fn print_inspect(report: &InspectReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }
    let header = &report.header;
    println!(
        "demo protocol {} network protocol {} ({:?})",
        header.demo_protocol, header.network_protocol, report.variant
    );
    println!(
        "map: {} server: {} client: {}",
        header.map_name, header.server_name, header.client_name
    );
    println!(
        "playback: {:.3}s {} ticks {} frames",
        header.playback_time, header.playback_ticks, header.playback_frames
    );
    println!("frames: {}", report.frames);
    for (kind, count) in &report.frames_by_kind {
        println!("  {kind}: {count}");
    }
    println!(
        "messages: {} ({} unknown)",
        report.messages, report.unknown_messages
    );
    for (kind, count) in &report.messages_by_kind {
        println!("  {kind}: {count}");
    }
    println!("string tables:");
    for table in &report.string_tables {
        let entries = table
            .entries
            .map_or_else(|| "not readable".to_string(), |count| count.to_string());
        println!("  {}: {entries} / {}", table.name, table.max_entries);
    }
    println!(
        "server classes: {} live entities: {} game events: {}",
        report.server_classes, report.live_entities, report.game_events
    );
    println!(
        "errors: {} (dropped {})",
        report.errors, report.dropped_errors
    );
    Ok(())
}
