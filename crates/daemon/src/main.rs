// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! carekeepd - The carekeep background agent.
//!
//! Keeps last-known-good clinical snapshots in a SQLite database under the
//! state directory and serves them to carekeep clients over a Unix socket.
//!
//! Usage:
//!   carekeepd --state-dir <path>

use std::fs;
use std::io::Write;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ck_core::SnapshotStore;
use ck_ipc::framing;
use serde_json::Value;

mod env;
mod handler;

use handler::Agent;

/// Per-connection read/write timeout.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Files the agent owns.
///
/// Everything lives in the state directory except the snapshot database,
/// which `CAREKEEP_SNAPSHOT_DB` may relocate.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AgentPaths {
    state_dir: PathBuf,
    socket: PathBuf,
    pid: PathBuf,
    lock: PathBuf,
    log: PathBuf,
    snapshot_db: PathBuf,
}

impl AgentPaths {
    fn new(state_dir: PathBuf, snapshot_db: Option<PathBuf>) -> Self {
        AgentPaths {
            socket: state_dir.join("agent.sock"),
            pid: state_dir.join("agent.pid"),
            lock: state_dir.join("agent.lock"),
            log: state_dir.join("agent.log"),
            snapshot_db: snapshot_db.unwrap_or_else(|| state_dir.join("snapshots.db")),
            state_dir,
        }
    }

    fn from_args(args: &[String]) -> Self {
        AgentPaths::new(parse_state_dir(args), env::snapshot_db())
    }
}

/// A bound agent ready to accept connections.
struct Running {
    listener: UnixListener,
    agent: Agent,
    _lock: fs::File,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let paths = AgentPaths::from_args(&args);
    if let Err(e) = fs::create_dir_all(&paths.state_dir) {
        eprintln!(
            "failed to create state dir {}: {}",
            paths.state_dir.display(),
            e
        );
        std::process::exit(1);
    }

    setup_logging(&paths.log);
    tracing::info!(
        "carekeepd starting, state_dir={}, snapshot_db={}",
        paths.state_dir.display(),
        paths.snapshot_db.display()
    );

    let mut running = match start(&paths) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("listening on {}", paths.socket.display());

    // Parent waits for this line before connecting.
    println!("READY");
    let _ = std::io::stdout().flush();

    serve(&running.listener, &mut running.agent);

    cleanup(&paths);
    drop(running);
    tracing::info!("carekeepd stopped");
}

/// Take the instance lock, open the snapshot store, and bind the socket.
fn start(paths: &AgentPaths) -> Result<Running, String> {
    let lock = acquire_lock(&paths.lock).map_err(|e| format!("failed to acquire lock: {e}"))?;
    let store = SnapshotStore::open(&paths.snapshot_db)
        .map_err(|e| format!("failed to open snapshot store: {e}"))?;
    write_pid_file(&paths.pid).map_err(|e| format!("failed to write PID file: {e}"))?;

    let _ = fs::remove_file(&paths.socket);
    let listener = UnixListener::bind(&paths.socket).map_err(|e| {
        cleanup(paths);
        format!("failed to bind socket: {e}")
    })?;

    Ok(Running {
        listener,
        agent: Agent::new(store),
        _lock: lock,
    })
}

/// One request per connection until a client asks the agent to stop.
fn serve(listener: &UnixListener, agent: &mut Agent) {
    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("failed to accept connection: {}", e);
                continue;
            }
        };
        let _ = stream.set_read_timeout(Some(IO_TIMEOUT));
        let _ = stream.set_write_timeout(Some(IO_TIMEOUT));

        let raw = match framing::read_message::<_, Value>(&mut stream) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("failed to read request: {}", e);
                continue;
            }
        };
        let handled = agent.handle_raw(raw);
        if let Err(e) = framing::write_message(&mut stream, &handled.reply) {
            tracing::warn!("failed to write reply: {}", e);
        }
        if handled.shutdown {
            tracing::info!("shutting down");
            return;
        }
    }
}

fn parse_state_dir(args: &[String]) -> PathBuf {
    if let Some(pos) = args.iter().position(|a| a == "--state-dir") {
        if let Some(dir) = args.get(pos + 1) {
            return PathBuf::from(dir);
        }
    }
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(dir) = env::xdg_state_home() {
        return dir.join("carekeep");
    }
    dirs::home_dir()
        .map(|h| h.join(".local/state/carekeep"))
        .unwrap_or_else(|| PathBuf::from(".local/state/carekeep"))
}

fn setup_logging(log_path: &Path) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn acquire_lock(lock_path: &Path) -> std::io::Result<fs::File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| std::io::Error::other("another agent instance is already running"))?;
    Ok(file)
}

fn write_pid_file(pid_path: &Path) -> std::io::Result<()> {
    fs::write(pid_path, format!("{}", std::process::id()))
}

fn cleanup(paths: &AgentPaths) {
    let _ = fs::remove_file(&paths.pid);
    let _ = fs::remove_file(&paths.socket);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
