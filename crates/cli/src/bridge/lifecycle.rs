// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle management: spawn, detect, stop, cleanup.
//!
//! The agent (carekeepd) is spawned as a background process and talks over a
//! Unix socket. Socket, PID, lock and log files live in the agent directory
//! (`<state>/agent` by default). Everything here is blocking; the async
//! bridge runs it on the blocking pool.

use std::fs;
use std::io::{BufRead, BufReader, ErrorKind};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use ck_ipc::{framing, parse_reply, Ack, AgentInfo, AgentRequest, AgentStatus};
use serde_json::Value;

use crate::env;
use crate::error::{Error, Result};

/// Socket filename within the agent directory.
const SOCKET_NAME: &str = "agent.sock";
/// PID filename within the agent directory.
const PID_NAME: &str = "agent.pid";
/// Lock filename for single instance guarantee.
const LOCK_NAME: &str = "agent.lock";
/// Log filename written by the agent.
const LOG_NAME: &str = "agent.log";
/// Agent binary name looked up next to the current executable and on PATH.
const AGENT_BINARY_NAME: &str = "carekeepd";

/// Read/write timeout for lifecycle probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Get the socket path for the given agent directory.
pub fn get_socket_path(agent_dir: &Path) -> PathBuf {
    agent_dir.join(SOCKET_NAME)
}

/// Get the PID file path for the given agent directory.
pub fn get_pid_path(agent_dir: &Path) -> PathBuf {
    agent_dir.join(PID_NAME)
}

/// Get the lock file path for the given agent directory.
pub fn get_lock_path(agent_dir: &Path) -> PathBuf {
    agent_dir.join(LOCK_NAME)
}

/// Get the log file path for the given agent directory.
pub fn get_log_path(agent_dir: &Path) -> PathBuf {
    agent_dir.join(LOG_NAME)
}

/// Send one request and read its single reply.
///
/// A missing socket or a refused connection is [`Error::AgentUnavailable`].
pub fn request(agent_dir: &Path, request: &AgentRequest, timeout: Duration) -> Result<Value> {
    let mut stream = UnixStream::connect(get_socket_path(agent_dir)).map_err(connect_error)?;
    let _ = stream.set_read_timeout(Some(timeout));
    let _ = stream.set_write_timeout(Some(timeout));

    framing::write_message(&mut stream, request).map_err(io_error(timeout))?;
    framing::read_message(&mut stream).map_err(io_error(timeout))
}

pub(crate) fn connect_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused => Error::AgentUnavailable,
        _ => Error::Io(e),
    }
}

fn io_error(timeout: Duration) -> impl Fn(std::io::Error) -> Error {
    move |e| match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            Error::AgentTimeout(timeout.as_millis() as u64)
        }
        ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => {
            Error::AgentUnavailable
        }
        _ => Error::Io(e),
    }
}

/// Detect if an agent is running for the given agent directory.
///
/// Returns Some(AgentInfo) if an agent answers the handshake, None otherwise.
/// Cleans up stale PID/socket files if found.
pub fn detect_agent(agent_dir: &Path, client_version: &str) -> Result<Option<AgentInfo>> {
    let socket_path = get_socket_path(agent_dir);
    let pid_path = get_pid_path(agent_dir);

    if !socket_path.exists() {
        if pid_path.exists() {
            let _ = fs::remove_file(&pid_path);
        }
        return Ok(None);
    }

    let hello = AgentRequest::Hello {
        version: client_version.to_string(),
    };
    match request(agent_dir, &hello, PROBE_TIMEOUT) {
        Ok(reply) => match parse_reply::<AgentInfo>(reply) {
            Ok(info) if info.pid > 0 => Ok(Some(info)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::debug!("unexpected handshake reply: {}", e);
                cleanup_stale_files(agent_dir);
                Ok(None)
            }
        },
        Err(e) => {
            tracing::debug!("agent handshake failed: {}", e);
            cleanup_stale_files(agent_dir);
            Ok(None)
        }
    }
}

/// Get agent status by connecting to the agent.
pub fn get_agent_status(agent_dir: &Path) -> Result<Option<AgentStatus>> {
    if !get_socket_path(agent_dir).exists() {
        return Ok(None);
    }

    match request(agent_dir, &AgentRequest::Status, PROBE_TIMEOUT) {
        Ok(reply) => Ok(Some(parse_reply(reply)?)),
        Err(Error::AgentUnavailable) => {
            cleanup_stale_files(agent_dir);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Send a shutdown request to the agent.
pub fn stop_agent(agent_dir: &Path) -> Result<()> {
    if !get_socket_path(agent_dir).exists() {
        return Err(Error::AgentUnavailable);
    }

    let reply = request(agent_dir, &AgentRequest::Shutdown, PROBE_TIMEOUT)?;
    let ack: Ack = parse_reply(reply)?;
    if ack.success {
        Ok(())
    } else {
        Err(Error::AgentProtocol("shutdown was refused".to_string()))
    }
}

/// Find the carekeepd binary.
///
/// `CAREKEEP_AGENT_BINARY` wins, then the configured path, then a binary
/// next to the current executable, then PATH.
pub fn find_agent_binary(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = env::agent_binary() {
        return path;
    }

    if let Some(path) = configured {
        return path.to_path_buf();
    }

    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name(AGENT_BINARY_NAME);
        if sibling.exists() {
            return sibling;
        }
    }

    PathBuf::from(AGENT_BINARY_NAME)
}

/// Spawn a new agent process for the given agent directory.
///
/// Returns the AgentInfo of the running agent. The agent takes an flock on
/// its lock file, so at most one instance serves a directory.
pub fn spawn_agent(agent_dir: &Path, binary: &Path, client_version: &str) -> Result<AgentInfo> {
    if let Some(info) = detect_agent(agent_dir, client_version)? {
        return Ok(info);
    }

    fs::create_dir_all(agent_dir)?;

    let mut child = Command::new(binary)
        .arg("--state-dir")
        .arg(agent_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::AgentLaunch(format!(
                "failed to start {} ({}): {}",
                AGENT_BINARY_NAME,
                binary.display(),
                e
            ))
        })?;

    // The agent prints READY once its socket is bound.
    if let Some(stdout) = child.stdout.take() {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            match line {
                Ok(line) if line == "READY" => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    for _ in 0..150 {
        if let Ok(Some(status)) = child.try_wait() {
            let stderr_output = if let Some(mut stderr) = child.stderr.take() {
                use std::io::Read;
                let mut output = String::new();
                let _ = stderr.read_to_string(&mut output);
                output
            } else {
                String::new()
            };
            return Err(Error::AgentLaunch(format!(
                "agent process exited with status: {}\n{}",
                status,
                stderr_output.trim()
            )));
        }

        if let Some(info) = detect_agent(agent_dir, client_version)? {
            tracing::info!(pid = info.pid, "agent started");
            return Ok(info);
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    Err(Error::AgentLaunch(
        "agent failed to start: could not connect after multiple attempts".to_string(),
    ))
}

/// Clean up stale socket and PID files.
pub fn cleanup_stale_files(agent_dir: &Path) {
    let _ = fs::remove_file(get_socket_path(agent_dir));
    let _ = fs::remove_file(get_pid_path(agent_dir));
}

/// Read PID from the PID file.
pub fn read_pid_file(pid_path: &Path) -> Option<u32> {
    fs::read_to_string(pid_path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Stop the agent, falling back to SIGKILL if graceful shutdown fails.
pub fn stop_agent_forcefully(agent_dir: &Path) -> Result<()> {
    let pid = read_pid_file(&get_pid_path(agent_dir));

    match stop_agent(agent_dir) {
        Ok(()) => {
            if let Some(pid) = pid {
                wait_for_process_exit(pid, Duration::from_secs(1));
            }
            cleanup_stale_files(agent_dir);
            return Ok(());
        }
        Err(e) => tracing::debug!("graceful agent shutdown failed: {}", e),
    }

    if let Some(pid) = pid {
        tracing::warn!(pid, "killing unresponsive agent");
        let _ = Command::new("kill").arg("-9").arg(pid.to_string()).output();
        std::thread::sleep(Duration::from_millis(100));
    }

    cleanup_stale_files(agent_dir);
    Ok(())
}

/// Wait for a process to exit, with timeout.
fn wait_for_process_exit(pid: u32, timeout: Duration) {
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        let result = Command::new("kill").arg("-0").arg(pid.to_string()).output();

        match result {
            Ok(output) if !output.status.success() => return,
            Err(_) => return,
            _ => {}
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
