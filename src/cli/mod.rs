//! CLI module for MedAgent
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{parse_params, response_format, Args, Commands, Verbosity};
