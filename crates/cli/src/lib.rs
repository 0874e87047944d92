// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! carekeep - offline resilience for the clinic portal.
//!
//! This crate keeps the portal usable while the backend is unreachable:
//! mutating requests are queued locally and replayed once connectivity
//! returns, and the last good snapshot of each entity type is cached by a
//! background agent (`carekeepd`) and served, labelled stale, in place of a
//! live read.
//!
//! # Main Components
//!
//! - [`OfflineFacade`] - the single entry point the portal talks to
//! - [`WriteQueue`] - durable queue of deferred mutating requests
//! - [`ReadCache`] - stale snapshot reads through the agent
//! - [`SyncCoordinator`] - one replay session at a time, bounded by a deadline
//! - [`AgentBridge`] - registration, version drift and calls to the agent
//! - [`ConnectivityMonitor`] - online flag and transition events
//!
//! # Usage
//!
//! ```rust,ignore
//! use carekeep::{Config, OfflineFacade};
//!
//! let config = Config::load_default()?;
//! let facade = OfflineFacade::open(&config).await?;
//! facade.enqueue_action(NewAction::new(Method::Post, "/api/notes")).await?;
//! ```

pub mod bridge;
pub mod cache;
mod cli;
mod commands;
pub mod config;
pub mod connectivity;
mod env;
pub mod error;
pub mod events;
pub mod facade;
pub mod queue;
pub mod sync;

#[cfg(test)]
mod test_helpers;

pub use bridge::{AgentBridge, AgentChannel, BridgeConfig, SocketChannel};
pub use cache::{CacheOutcome, CacheStatus, FallbackRead, ReadCache, ReadThrough, StaleSnapshot};
pub use cli::{AgentCommand, CacheCommand, Cli, Command, OutputFormat};
pub use config::Config;
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, ConnectivityState, TcpProbe};
pub use error::{Error, Result};
pub use events::{EventBus, Subscription};
pub use facade::OfflineFacade;
pub use queue::WriteQueue;
pub use sync::{
    HttpReplayer, Replayer, SyncCoordinator, SyncOutcome, SyncReport, SyncStart, SyncState,
    SyncTrigger,
};

/// Execute a parsed command line. This is the main entry point for the
/// binary and provides a testable way to run commands without process
/// execution.
pub fn run(cli: Cli) -> Result<()> {
    let config = match &cli.state_dir {
        Some(dir) => Config::load(dir)?,
        None => Config::load_default()?,
    };

    block_on(dispatch(&config, cli.command))
}

async fn dispatch(config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Status { output } => commands::status::run(config, output).await,
        Command::Enqueue {
            method,
            url,
            headers,
            body,
            description,
            output,
        } => {
            commands::queue::enqueue(config, &method, url, headers, body, description, output)
                .await
        }
        Command::Pending { output } => commands::queue::pending(config, output).await,
        Command::Sync {
            deadline_ms,
            output,
        } => commands::queue::sync(config, deadline_ms, output).await,
        Command::Cache { command } => match command {
            CacheCommand::Status { output } => commands::cache::status(config, output).await,
            CacheCommand::Clear => commands::cache::clear(config).await,
            CacheCommand::Read { entity_type } => commands::cache::read(config, &entity_type).await,
            CacheCommand::Write { entity_type, file } => {
                commands::cache::write(config, &entity_type, &file).await
            }
        },
        Command::Agent { command } => match command {
            AgentCommand::Start => commands::agent::start(config),
            AgentCommand::Stop => commands::agent::stop(config),
            AgentCommand::Status => commands::agent::status(config),
            AgentCommand::Logs { follow } => commands::agent::logs(config, follow),
            AgentCommand::Update => commands::agent::update(config).await,
        },
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Runtime(e.to_string()))?;
    runtime.block_on(future)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
