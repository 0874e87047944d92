// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "carekeep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline resilience for the clinic portal: queued writes, cached reads, sync")]
#[command(
    long_about = "Offline resilience for the clinic portal.\n\n\
    Mutating requests made while offline are queued durably and replayed in order when \
    connectivity returns. Last-known-good clinical snapshots are kept by a background agent \
    and served, labelled stale, while the backend is unreachable."
)]
pub struct Cli {
    /// Use <path> as the state directory
    #[arg(long = "state-dir", global = true, value_name = "path")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show connectivity, agent, queue and cache status
    Status {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Queue a mutating request for replay
    #[command(arg_required_else_help = true)]
    Enqueue {
        /// HTTP method (POST, PUT, PATCH, DELETE, GET)
        #[arg(value_parser = non_empty_string)]
        method: String,

        /// Target URL, absolute or relative to replay.base_url
        #[arg(value_parser = non_empty_string)]
        url: String,

        /// Request header as "Name: value" (repeatable)
        #[arg(long = "header", short = 'H', value_name = "HEADER")]
        headers: Vec<String>,

        /// Request body
        #[arg(long, short)]
        body: Option<String>,

        /// Human-readable description
        #[arg(long, short)]
        description: Option<String>,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// List queued actions in replay order
    Pending {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Replay queued actions now
    Sync {
        /// Session deadline in milliseconds (overrides sync.deadline_ms)
        #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
        deadline_ms: Option<u64>,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Manage cached clinical snapshots
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Manage the background agent
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show cached record counts per entity type
    Status {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Remove every cached snapshot
    Clear,

    /// Print the cached snapshot of one entity type
    #[command(arg_required_else_help = true)]
    Read {
        /// Entity type (patients, appointments, doctors, clinics, patientHealth, payments)
        entity_type: String,
    },

    /// Replace the snapshot of one entity type with records from a JSON file
    #[command(arg_required_else_help = true)]
    Write {
        /// Entity type (patients, appointments, doctors, clinics, patientHealth, payments)
        entity_type: String,

        /// JSON file holding an array of records
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Start the agent if it is not running
    Start,

    /// Stop the running agent
    Stop,

    /// Show agent status
    Status,

    /// Restart the agent if its version differs from this client
    Update,

    /// Print the agent log
    Logs {
        /// Keep following the log as it grows
        #[arg(long, short)]
        follow: bool,
    },
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
