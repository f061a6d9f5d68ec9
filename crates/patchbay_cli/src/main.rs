//! patchbay-replay: replay scripted port selections against the routing core
//!
//! A script declares modules, the panels their controls sit on, and a list
//! of user events (port selections, emits, panel moves, line visibility).
//! The tool replays them in order and prints what happened to each event,
//! the final connection set, the fan-out lists and every visual request.

mod script;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use patchbay_core::VisualRequest;
use script::{Report, Script};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Replay a patch selection script
#[derive(Parser)]
#[command(name = "patchbay-replay")]
#[command(about = "Replay scripted port selections against the patch routing core")]
#[command(version)]
struct Cli {
    /// Path to the JSON script
    #[arg(env = "PATCHBAY_SCRIPT")]
    script: PathBuf,

    /// Output format
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Log routing decisions to stderr (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let report = Script::load(&cli.script)?.replay()?;
    match cli.format {
        OutputFormat::Table => print_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn print_table(report: &Report) {
    println!("{:>4}  {:<36} {}", "#", "EVENT", "RESULT");
    println!("{}", "-".repeat(90));
    for (index, step) in report.steps.iter().enumerate() {
        let result = if step.result.starts_with("rejected") {
            step.result.red()
        } else if step.result.starts_with("connected") {
            step.result.green()
        } else if step.result.starts_with("disconnected") {
            step.result.yellow()
        } else {
            step.result.normal()
        };
        println!(
            "{:>4}  {:<36} {}",
            index.to_string().dimmed(),
            step.event.cyan(),
            result
        );
    }

    println!();
    println!("{}", "Connections".bold());
    println!("{}", "-".repeat(60));
    for route in &report.connections {
        println!(
            "  {} -[{}]-> {}",
            route.sender.cyan(),
            route.kind.as_str().yellow(),
            route.receiver.cyan()
        );
    }
    if report.connections.is_empty() {
        println!("  {}", "none".dimmed());
    }

    println!();
    println!("{}", "Fan-out".bold());
    println!("{}", "-".repeat(60));
    for route in &report.fanout {
        println!(
            "  {} -[{}]-> {}",
            route.sender.cyan(),
            route.kind.as_str().yellow(),
            route.receiver.cyan()
        );
    }
    if report.fanout.is_empty() {
        println!("  {}", "none".dimmed());
    }

    println!();
    println!(
        "{} ({} delivered, {} visual requests)",
        "Summary".bold(),
        report.deliveries.len(),
        report.visual_requests.len()
    );
    for delivery in &report.deliveries {
        println!(
            "  {} <- {} {:?}",
            delivery.module.cyan(),
            delivery.kind.as_str().yellow(),
            delivery.payload
        );
    }
    for request in &report.visual_requests {
        println!("  {}", describe_request(request).dimmed());
    }
}

fn describe_request(request: &VisualRequest) -> String {
    match request {
        VisualRequest::CreateLine {
            line,
            from,
            to,
            visible,
        } => format!(
            "create {} ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3}){}",
            line,
            from.x,
            from.y,
            from.z,
            to.x,
            to.y,
            to.z,
            if *visible { "" } else { " hidden" }
        ),
        VisualRequest::UpdateLine { line, from, to } => format!(
            "update {} ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3})",
            line, from.x, from.y, from.z, to.x, to.y, to.z
        ),
        VisualRequest::DestroyLine { line } => format!("destroy {}", line),
        VisualRequest::SetLineVisible { line, visible } => {
            format!("{} {}", if *visible { "show" } else { "hide" }, line)
        }
        VisualRequest::SetControlState { control, armed } => {
            format!("set {} armed={}", control, armed)
        }
    }
}
