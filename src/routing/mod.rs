//! Dual-protocol routing.
//!
//! Two independent, ordered rule tables:
//! - one-shot HTTP rules, dispatched by first match in registration order
//! - upgrade (WebSocket) rules, dispatched exact-path first, then by first
//!   matching pattern in registration order
//!
//! An upgrade request that matches no upgrade rule is rejected. It never
//! falls through to the one-shot table.

pub mod matcher;

use crate::session::{Connection, Session};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::request::Parts;
use axum::response::Response;
use std::sync::Arc;

pub use matcher::Matcher;

/// Handler for a one-shot HTTP request.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn handle(&self, request: Request) -> Response;
}

/// Handler for an upgraded, long-lived WebSocket connection.
///
/// `open` is called once the connection is live. The returned [`Session`]
/// is owned by the connection and torn down exactly once when it closes.
/// Returning an error closes the connection without creating a session.
#[async_trait]
pub trait WsHandler: Send + Sync {
    async fn open(&self, connection: Connection, request: &RequestInfo)
        -> Result<Session, UpgradeError>;
}

/// Errors an upgrade handler can report instead of opening a session.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    #[error("malformed upgrade target: {0}")]
    BadTarget(String),
    #[error("upgrade declined: {0}")]
    Declined(String),
}

/// The parts of the originating request an upgrade handler gets to see.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Raw request path, still percent-encoded
    pub path: String,
}

impl RequestInfo {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            path: parts.uri.path().to_string(),
        }
    }
}

/// One entry of a rule table.
pub struct RouteRule<H: ?Sized> {
    pub matcher: Matcher,
    pub handler: Arc<H>,
}

impl<H: ?Sized> Clone for RouteRule<H> {
    fn clone(&self) -> Self {
        Self {
            matcher: self.matcher.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// An ordered list of rules. Insertion order is evaluation order.
pub struct RouteTable<H: ?Sized> {
    rules: Vec<RouteRule<H>>,
}

impl<H: ?Sized> Default for RouteTable<H> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<H: ?Sized> RouteTable<H> {
    pub fn push(&mut self, matcher: Matcher, handler: Arc<H>) {
        self.rules.push(RouteRule { matcher, handler });
    }

    /// First rule, in registration order, whose matcher accepts `path`.
    pub fn first_match(&self, path: &str) -> Option<&RouteRule<H>> {
        self.rules.iter().find(|rule| rule.matcher.matches(path))
    }

    /// An exact rule for the literal `path` if one exists, otherwise the
    /// first matching pattern rule in registration order.
    pub fn exact_then_pattern(&self, path: &str) -> Option<&RouteRule<H>> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_exact() && rule.matcher.matches(path))
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|rule| !rule.matcher.is_exact() && rule.matcher.matches(path))
            })
    }
}

/// Frozen dispatch tables for both protocols.
pub struct Router {
    http: RouteTable<dyn HttpHandler>,
    ws: RouteTable<dyn WsHandler>,
}

impl Router {
    pub fn new(http: RouteTable<dyn HttpHandler>, ws: RouteTable<dyn WsHandler>) -> Self {
        Self { http, ws }
    }

    /// Select the handler for a one-shot request.
    pub fn route_http(&self, path: &str) -> Option<&RouteRule<dyn HttpHandler>> {
        self.http.first_match(path)
    }

    /// Select the handler for an upgrade request. Only the upgrade table is
    /// consulted.
    pub fn route_upgrade(&self, path: &str) -> Option<&RouteRule<dyn WsHandler>> {
        self.ws.exact_then_pattern(path)
    }

    /// Number of one-shot rules.
    pub fn http_rules(&self) -> usize {
        self.http.rules.len()
    }

    /// Number of upgrade rules.
    pub fn ws_rules(&self) -> usize {
        self.ws.rules.len()
    }
}
