//! Command-line argument parsing for MedAgent
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use crate::tools::implementations::ResponseFormat;
use crate::tools::types::Params;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// MedAgent - rate-limited, cached access to biomedical research APIs
#[derive(Parser, Debug)]
#[command(name = "medagent")]
#[command(version)]
#[command(about = "Query biomedical research APIs through a shared rate limiter and cache", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.medagent/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (debug), -vv (trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Bypass the result cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch an endpoint from a configured source
    Fetch {
        /// Source name (see `medagent sources`)
        source: String,

        /// Endpoint path relative to the source's base URL
        endpoint: String,

        /// Query parameter as key=value; repeat a key to send a list
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Label echoed back in result metadata
        #[arg(long)]
        query: Option<String>,

        /// Select part of the JSON response (RFC 6901 pointer)
        #[arg(long, conflicts_with = "text")]
        pointer: Option<String>,

        /// Return the body as text instead of decoding JSON
        #[arg(long)]
        text: bool,

        /// Issue the same call N times (shows cache and rate limiting)
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },

    /// List configured sources
    Sources,

    /// Display current configuration
    Config {
        /// Write the effective configuration to this path
        #[arg(long, value_name = "PATH")]
        init: Option<PathBuf>,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Log level override, `None` keeps the configured level
    pub fn log_level(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("debug"),
            Verbosity::VeryVerbose => Some("trace"),
        }
    }
}

/// Parse `key=value` pairs into call parameters.
///
/// A key given more than once becomes a list.
pub fn parse_params(pairs: &[String]) -> Result<Params, String> {
    let mut params = Params::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid parameter '{}', expected KEY=VALUE", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid parameter '{}', empty key", pair));
        }

        let value = Value::String(value.to_string());
        match params.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key.to_string(), value);
            }
        }
    }
    Ok(params)
}

/// Response format selected by `--pointer` / `--text`
pub fn response_format(pointer: Option<&str>, text: bool) -> ResponseFormat {
    match (pointer, text) {
        (_, true) => ResponseFormat::Text,
        (Some(pointer), false) => ResponseFormat::JsonPointer(pointer.to_string()),
        (None, false) => ResponseFormat::Json,
    }
}
