// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use std::os::unix::net::UnixStream;
use tempfile::TempDir;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn state_dir_flag_wins() {
    let dir = parse_state_dir(&args(&["carekeepd", "--state-dir", "/srv/ck"]));
    assert_eq!(dir, PathBuf::from("/srv/ck"));
}

#[test]
fn paths_live_in_state_dir() {
    let paths = AgentPaths::new(PathBuf::from("/srv/ck"), None);
    assert_eq!(paths.socket, PathBuf::from("/srv/ck/agent.sock"));
    assert_eq!(paths.pid, PathBuf::from("/srv/ck/agent.pid"));
    assert_eq!(paths.lock, PathBuf::from("/srv/ck/agent.lock"));
    assert_eq!(paths.log, PathBuf::from("/srv/ck/agent.log"));
    assert_eq!(paths.snapshot_db, PathBuf::from("/srv/ck/snapshots.db"));
}

#[test]
fn snapshot_db_override_moves_only_the_database() {
    let paths = AgentPaths::new(
        PathBuf::from("/srv/ck"),
        Some(PathBuf::from("/data/snap.db")),
    );
    assert_eq!(paths.snapshot_db, PathBuf::from("/data/snap.db"));
    assert_eq!(paths.socket, PathBuf::from("/srv/ck/agent.sock"));
}

#[test]
fn lock_is_exclusive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agent.lock");

    let first = acquire_lock(&path).unwrap();
    assert!(acquire_lock(&path).is_err());
    drop(first);
    assert!(acquire_lock(&path).is_ok());
}

#[test]
fn second_start_is_refused_while_first_runs() {
    let dir = TempDir::new().unwrap();
    let paths = AgentPaths::new(dir.path().to_path_buf(), None);

    let running = start(&paths).unwrap();
    assert!(paths.socket.exists());
    assert!(paths.snapshot_db.exists());
    assert_eq!(
        fs::read_to_string(&paths.pid).unwrap(),
        std::process::id().to_string()
    );

    let err = start(&paths).err().unwrap();
    assert!(err.contains("lock"), "{err}");
    drop(running);
}

#[test]
fn serve_stops_after_shutdown_request() {
    let dir = TempDir::new().unwrap();
    let paths = AgentPaths::new(dir.path().to_path_buf(), None);
    let mut running = start(&paths).unwrap();

    let socket = paths.socket.clone();
    let client = std::thread::spawn(move || {
        let mut stream = UnixStream::connect(&socket).unwrap();
        framing::write_message(&mut stream, &json!({"type": "SHUTDOWN"})).unwrap();
        framing::read_message::<_, Value>(&mut stream).unwrap()
    });

    serve(&running.listener, &mut running.agent);
    let reply = client.join().unwrap();
    assert!(reply.is_object(), "{reply}");

    cleanup(&paths);
    assert!(!paths.pid.exists());
    assert!(!paths.socket.exists());
}
