//! Typed request context and response types.
//!
//! The gate never touches a framework request object directly. The embedding
//! gateway populates a [`RequestContext`] once at request entry and the gate
//! works from that alone, which keeps identity derivation a single, testable
//! code path.

use serde::Serialize;
use serde_json::{json, Value};

/// Sentinel identity used when no address information is available.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Everything the gate needs to know about an inbound request.
///
/// `forwarded_for` carries the raw forwarded-address header chain when the
/// deployment sits behind a proxy. The derived identity trusts that header
/// over the peer address, so it is only as reliable as the proxy topology
/// in front of the gateway: a client that can reach the gateway directly
/// can spoof it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method.
    pub method: String,
    /// Request path, as routed.
    pub path: String,
    /// Raw forwarded-for header chain, if present.
    pub forwarded_for: Option<String>,
    /// Direct peer address, if known.
    pub peer_addr: Option<String>,
}

impl RequestContext {
    /// Create a context for `method` and `path` with no address information.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            forwarded_for: None,
            peer_addr: None,
        }
    }

    /// Set the forwarded-for header chain.
    pub fn with_forwarded_for(mut self, chain: impl Into<String>) -> Self {
        self.forwarded_for = Some(chain.into());
        self
    }

    /// Set the direct peer address.
    pub fn with_peer_addr(mut self, addr: impl Into<String>) -> Self {
        self.peer_addr = Some(addr.into());
        self
    }

    /// Derive the client identity used as the counting key.
    ///
    /// The first entry of a non-empty forwarded-for chain wins, trimmed;
    /// otherwise the peer address; otherwise [`UNKNOWN_IDENTITY`].
    pub fn client_identity(&self) -> String {
        if let Some(chain) = self.forwarded_for.as_deref() {
            if !chain.is_empty() {
                // First hop in the chain is the original client.
                let first = chain.split(',').next().unwrap_or("").trim();
                return first.to_string();
            }
        }
        self.peer_addr
            .clone()
            .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
    }
}

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The window request ceiling was exceeded.
    RateLimit,
    /// The identity sits on the auth-failure blocklist.
    Blocklist,
}

/// A response as the gate sees it: a status code and a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON response body.
    pub body: Value,
}

impl GateResponse {
    /// Build a response with an arbitrary body.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Build the structured deny response the gate returns without invoking
    /// the protected handler.
    pub fn deny(status: u16, reason: DenyReason, path: &str) -> Self {
        let detail = match reason {
            DenyReason::RateLimit => "Blocked by rate limit",
            DenyReason::Blocklist => "blocked",
        };
        Self {
            status,
            body: json!({
                "detail": detail,
                "reason": reason,
                "path": path,
            }),
        }
    }

    /// Whether this response counts as an authentication failure for
    /// blocklist bookkeeping (the 401/403 class).
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}
