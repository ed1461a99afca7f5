//! MedAgent - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use medagent::{
    cli::{parse_params, response_format, Args, Commands},
    config::{Config, LogFormat},
    logging,
    tools::ToolRuntime,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    if let Some(level) = args.verbosity().log_level() {
        config.logging.level = level.to_string();
    }
    if args.json_logs {
        config.logging.format = LogFormat::Json;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }

    logging::init(&config.logging);

    match &args.command {
        Commands::Fetch {
            source,
            endpoint,
            params,
            query,
            pointer,
            text,
            repeat,
        } => {
            let params = parse_params(params).map_err(anyhow::Error::msg)?;
            let format = response_format(pointer.as_deref(), *text);
            let query = query.clone().unwrap_or_else(|| endpoint.clone());
            run_fetch(config, source, endpoint, &query, &params, format, *repeat).await?;
        }
        Commands::Sources => {
            list_sources(&config);
        }
        Commands::Config { init } => {
            show_config(&config)?;
            if let Some(path) = init {
                config
                    .save(path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!("{} {}", "Wrote".green(), path.display());
            }
        }
    }

    Ok(())
}

async fn run_fetch(
    config: Config,
    source: &str,
    endpoint: &str,
    query: &str,
    params: &medagent::tools::Params,
    format: medagent::tools::ResponseFormat,
    repeat: u32,
) -> Result<()> {
    let runtime = ToolRuntime::from_config(config).context("Failed to initialize tools")?;

    let mut failures = 0;
    for _ in 0..repeat.max(1) {
        let result = runtime
            .fetch(source, endpoint, query, params, format.clone())
            .await;

        if !result.success {
            failures += 1;
        }
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if repeat > 1 {
        if let Some(stats) = runtime.envelope().stats(source) {
            eprintln!(
                "{} {} calls, {} cache hits, {} retries, {:.0}% success, avg {:.1}ms",
                "Stats:".cyan().bold(),
                stats.total_calls,
                stats.cache_hits,
                stats.retry_attempts,
                stats.success_rate() * 100.0,
                stats.average_latency_ms()
            );
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} calls failed", failures, repeat.max(1));
    }
    Ok(())
}

fn list_sources(config: &Config) {
    println!("{}", "Configured sources:".bold());
    for (name, source) in &config.sources {
        let burst = source.burst.unwrap_or(source.rate_limit);
        println!(
            "  {:<18} {:<22} {:>5.1} req/s (burst {:.0})  {}",
            name.green(),
            source.display_name,
            source.rate_limit,
            burst,
            source.base_url.dimmed()
        );
    }
}

fn show_config(config: &Config) -> Result<()> {
    let path = Config::default_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no home directory)".to_string());

    eprintln!("{} {}", "Default config path:".bold(), path);
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
