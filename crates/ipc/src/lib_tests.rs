// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the bridge protocol types and framing.

#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use serde_json::json;

use super::*;
use yare::parameterized;

#[parameterized(
    cache_status = { AgentRequest::CacheStatus, json!({"type": "CACHE_STATUS"}) },
    cache_clear = { AgentRequest::CacheClear, json!({"type": "CACHE_CLEAR"}) },
    ping = { AgentRequest::Ping, json!({"type": "PING"}) },
    shutdown = { AgentRequest::Shutdown, json!({"type": "SHUTDOWN"}) },
    cache_read = {
        AgentRequest::CacheRead { entity_type: EntityType::PatientHealth },
        json!({"type": "CACHE_READ", "data": {"entityType": "patientHealth"}})
    },
    sync_register = {
        AgentRequest::SyncRegister { tag: "offline-sync".into() },
        json!({"type": "SYNC_REGISTER", "data": {"tag": "offline-sync"}})
    },
    hello = {
        AgentRequest::Hello { version: "0.4.0".into() },
        json!({"type": "HELLO", "data": {"version": "0.4.0"}})
    },
)]
fn request_envelope_shape(request: AgentRequest, expected: Value) {
    assert_eq!(serde_json::to_value(&request).unwrap(), expected);
    let parsed: AgentRequest = serde_json::from_value(expected).unwrap();
    assert_eq!(parsed, request);
}

#[test]
fn cache_write_carries_bundle_as_data() {
    let request = AgentRequest::CacheWrite(
        EntityBundle::new().with(EntityType::Patients, vec![json!({"id": 1})]),
    );
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({"type": "CACHE_WRITE", "data": {"patients": [{"id": 1}]}})
    );
}

#[test]
fn unknown_request_type_is_rejected() {
    let parsed = serde_json::from_value::<AgentRequest>(json!({"type": "EXPLODE"}));
    assert!(parsed.is_err());
}

#[parameterized(
    cache_write = { AgentRequest::CacheWrite(EntityBundle::new()), "CACHE_WRITE" },
    cache_read = { AgentRequest::CacheRead { entity_type: EntityType::Doctors }, "CACHE_READ" },
    sync_register = { AgentRequest::SyncRegister { tag: "t".into() }, "SYNC_REGISTER" },
    status = { AgentRequest::Status, "STATUS" },
)]
fn request_kind_matches_wire_type(request: AgentRequest, kind: &str) {
    assert_eq!(request.kind(), kind);
    assert_eq!(serde_json::to_value(&request).unwrap()["type"], kind);
}

#[test]
fn parse_reply_surfaces_agent_error() {
    let err = parse_reply::<Ack>(json!({"error": "disk full"})).unwrap_err();
    assert_eq!(err, ReplyError::Agent("disk full".into()));
    assert_eq!(err.to_string(), "agent error: disk full");
}

#[test]
fn parse_reply_reports_malformed() {
    let err = parse_reply::<Ack>(json!({"succes": true})).unwrap_err();
    assert!(matches!(err, ReplyError::Malformed(_)));
}

#[test]
fn parse_reply_decodes_counts() {
    let counts: CacheCounts = parse_reply(json!({"patients": 2, "clinics": 0})).unwrap();
    assert_eq!(counts[&EntityType::Patients], 2);
    assert_eq!(counts[&EntityType::Clinics], 0);
}

#[test]
fn status_reply_flattens_info() {
    let status = AgentStatus {
        info: AgentInfo {
            pid: 42,
            version: "0.4.0".into(),
            capabilities: vec![CAPABILITY_CACHE.into()],
        },
        uptime_secs: 9,
    };
    let value = to_reply(&status);
    assert_eq!(value["pid"], 42);
    assert_eq!(value["uptimeSecs"], 9);
    let parsed: AgentStatus = parse_reply(value).unwrap();
    assert_eq!(parsed, status);
}

#[test]
fn agent_info_capabilities() {
    let info: AgentInfo = parse_reply(json!({"pid": 1, "version": "x"})).unwrap();
    assert!(info.capabilities.is_empty());
    assert!(!info.has_capability(CAPABILITY_REPLAY));

    let info = AgentInfo {
        capabilities: vec![CAPABILITY_REPLAY.into()],
        ..info
    };
    assert!(info.has_capability(CAPABILITY_REPLAY));
}

#[test]
fn cache_read_reply_with_missing_snapshot() {
    let reply: CacheReadReply = parse_reply(json!({"snapshot": null})).unwrap();
    assert!(reply.snapshot.is_none());
}

#[test]
fn framing_roundtrip_request() {
    let request = AgentRequest::CacheRead {
        entity_type: EntityType::Appointments,
    };
    let mut buf = Vec::new();
    framing::write_message(&mut buf, &request).unwrap();

    assert_eq!(&buf[..4], &((buf.len() - 4) as u32).to_be_bytes());
    let mut cursor = Cursor::new(buf);
    let decoded: AgentRequest = framing::read_message(&mut cursor).unwrap();
    assert_eq!(request, decoded);
}

#[test]
fn framing_rejects_oversized_length() {
    let mut buf = ((framing::MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
    buf.extend_from_slice(b"{}");
    let mut cursor = Cursor::new(buf);
    let err = framing::read_message::<_, Value>(&mut cursor).unwrap_err();
    assert!(err.to_string().contains("too large"));
}

#[test]
fn framing_truncated_message_errors() {
    let mut buf = Vec::new();
    framing::write_message(&mut buf, &Ack::ok()).unwrap();
    buf.truncate(buf.len() - 1);
    let mut cursor = Cursor::new(buf);
    assert!(framing::read_message::<_, Ack>(&mut cursor).is_err());
}

#[tokio::test]
async fn async_framing_interoperates_with_blocking() {
    let mut buf = Vec::new();
    framing::async_io::write_message(&mut buf, &ErrorReply::new("nope"))
        .await
        .unwrap();

    let mut cursor = Cursor::new(buf.clone());
    let blocking: ErrorReply = framing::read_message(&mut cursor).unwrap();
    assert_eq!(blocking.error, "nope");

    let mut reader = &buf[..];
    let value: Value = framing::async_io::read_message(&mut reader).await.unwrap();
    assert_eq!(parse_reply::<Ack>(value), Err(ReplyError::Agent("nope".into())));
}
