// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred mutating requests recorded while offline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle status of a queued action.
///
/// `Synced` entries are deleted on success, so the store never holds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InFlight,
    Synced,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::InFlight => "in_flight",
            ActionStatus::Synced => "synced",
            ActionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ActionStatus::Pending),
            "in_flight" | "inflight" => Ok(ActionStatus::InFlight),
            "synced" => Ok(ActionStatus::Synced),
            "failed" => Ok(ActionStatus::Failed),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// HTTP method of a deferred request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

/// A request to defer, before it has been assigned an id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAction {
    pub url: String,
    pub method: Method,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewAction {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        NewAction {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            description: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject actions that could never be replayed.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::FieldEmpty { field: "url" });
        }
        if self.headers.keys().any(|k| k.trim().is_empty()) {
            return Err(Error::FieldEmpty {
                field: "header name",
            });
        }
        Ok(())
    }
}

/// One deferred mutating request as persisted in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: String,
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Enqueue time in epoch milliseconds.
    pub timestamp: i64,
    pub description: Option<String>,
    pub status: ActionStatus,
    pub last_error: Option<String>,
    /// Number of failed replays so far.
    pub attempts: u32,
    /// Epoch milliseconds at which a sync session claimed this entry.
    pub claimed_at: Option<i64>,
}

impl PendingAction {
    pub fn from_new(new: NewAction, id: String, timestamp: i64) -> Self {
        PendingAction {
            id,
            url: new.url,
            method: new.method,
            headers: new.headers,
            body: new.body,
            timestamp,
            description: new.description,
            status: ActionStatus::Pending,
            last_error: None,
            attempts: 0,
            claimed_at: None,
        }
    }

    /// Short label for logs and listings.
    pub fn label(&self) -> String {
        match &self.description {
            Some(d) => format!("{} {} ({})", self.method, self.url, d),
            None => format!("{} {}", self.method, self.url),
        }
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
