// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replay transport for queued actions.
//!
//! Provides a trait-based replay layer so the coordinator can be driven by
//! a mock in tests. [`HttpReplayer`] is the production implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use ck_core::{Method, PendingAction};
use reqwest::Client;

use crate::error::{Error, Result};

/// Header carrying the action id so a server can drop duplicate deliveries.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Maximum length for response bodies quoted in errors.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Boxed future returned by [`Replayer::replay`].
pub type ReplayFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Sends one queued action as a live request.
pub trait Replayer: Send + Sync + 'static {
    /// Resolve `Ok` when the backend accepted the action.
    fn replay<'a>(&'a self, action: &'a PendingAction) -> ReplayFuture<'a>;
}

/// Replays actions over HTTP with reqwest.
#[derive(Clone)]
pub struct HttpReplayer {
    client: Client,
    base_url: Option<String>,
}

impl HttpReplayer {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpReplayer { client, base_url })
    }

    /// Absolute URL for `action`, joining relative paths onto the base URL.
    pub fn resolve_url(&self, action: &PendingAction) -> Result<String> {
        resolve_url(self.base_url.as_deref(), &action.url).ok_or_else(|| {
            Error::NetworkReplayFailed {
                id: action.id.clone(),
                reason: format!("relative URL '{}' needs replay.base_url", action.url),
            }
        })
    }
}

pub(crate) fn resolve_url(base_url: Option<&str>, url: &str) -> Option<String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Some(url.to_string());
    }
    let base = base_url?.trim_end_matches('/');
    Some(format!("{}/{}", base, url.trim_start_matches('/')))
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Truncate a response body to avoid logging excessive data.
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let cut = body
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|i| *i <= MAX_ERROR_BODY_LENGTH)
        .last()
        .unwrap_or(0);
    format!(
        "{}... (truncated, {} total bytes)",
        &body[..cut],
        body.len()
    )
}

impl Replayer for HttpReplayer {
    fn replay<'a>(&'a self, action: &'a PendingAction) -> ReplayFuture<'a> {
        Box::pin(async move {
            let url = self.resolve_url(action)?;
            let failed = |reason: String| Error::NetworkReplayFailed {
                id: action.id.clone(),
                reason,
            };

            let mut request = self
                .client
                .request(http_method(action.method), &url)
                .header(IDEMPOTENCY_HEADER, &action.id);
            for (name, value) in &action.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &action.body {
                request = request.body(body.clone());
            }

            let response = request.send().await.map_err(|e| failed(e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                tracing::debug!(id = %action.id, %status, "replayed {}", action.label());
                return Ok(());
            }

            let body = response.text().await.unwrap_or_default();
            Err(failed(format!("HTTP {}: {}", status, truncate_body(&body))))
        })
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
