use std::cmp::Ordering;

use anyhow::Context;
use colored::Colorize;
use cvr_server::{CvrServer, ServerConfig};
use cvr_types::{version, Bump, Version, VersionStats};
use serde_json::json;

use crate::cli::{Cli, Command, OutputFormat, ServeArgs, VersionCommand};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(ref args) => cmd_serve(load_config(&cli, args)?).await,
        Command::Config(ref args) => cmd_config(load_config(&cli, args)?, cli.format),
        Command::Version(command) => cmd_version(command, cli.format),
    }
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(cli: &Cli, overrides: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    apply_overrides(&mut config, overrides)?;
    tracing::debug!(file = ?cli.config, strategy = %config.strategy, "configuration resolved");
    Ok(config)
}

fn apply_overrides(config: &mut ServerConfig, overrides: &ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = &overrides.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    if let Some(strategy) = overrides.strategy {
        config.strategy = strategy;
    }
    if let Some(records) = &overrides.records {
        config.records_path = Some(records.clone());
    }
    if let Some(payloads) = &overrides.payloads {
        config.payload_dir = Some(payloads.clone());
    }
    Ok(())
}

async fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    println!(
        "{} CVR server on {} (payloads: {})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.strategy.to_string().cyan()
    );
    CvrServer::new(config).serve().await?;
    Ok(())
}

fn cmd_config(config: ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

fn cmd_version(command: VersionCommand, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        VersionCommand::Next { current, bump } => {
            let next = next_version(current.as_deref(), bump)?;
            match format {
                OutputFormat::Json => println!("{}", json!({ "version": next })),
                OutputFormat::Text => println!("{}", next.to_string().green().bold()),
            }
        }
        VersionCommand::Compare { a, b } => {
            let ordering = version::compare(&a, &b)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", json!({ "a": a, "b": b, "ordering": ordering_value(ordering) }))
                }
                OutputFormat::Text => println!(
                    "{} {} {}",
                    a.yellow(),
                    ordering_symbol(ordering).bold(),
                    b.yellow()
                ),
            }
        }
        VersionCommand::Stats { versions } => {
            let stats = VersionStats::from_strs(&versions);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Text => print_stats(&stats),
            }
        }
    }
    Ok(())
}

fn next_version(current: Option<&str>, bump: Bump) -> anyhow::Result<Version> {
    Version::next_from_str(current, bump)
        .with_context(|| format!("cannot compute next {bump} version"))
}

fn ordering_value(ordering: Ordering) -> i8 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

fn ordering_symbol(ordering: Ordering) -> &'static str {
    match ordering {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    }
}

fn print_stats(stats: &VersionStats) {
    let show = |v: &Option<Version>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
    println!("Versions: {}", stats.total.to_string().bold());
    println!("  Latest: {}", show(&stats.latest).green());
    println!("  Oldest: {}", show(&stats.oldest).yellow());
    println!("  Major lines: {}", stats.distinct_major);
    println!("  Minor lines: {}", stats.distinct_minor_combinations);
}
