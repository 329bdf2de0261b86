//! One listening endpoint for both protocols.
//!
//! Every request lands in [`dispatch`]. Upgrade requests go through the
//! upgrade table only; everything else goes through the one-shot table,
//! after paths that climb above the server root have been refused.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::handlers::{resolve_under_root, AssetError};
use crate::routing::{
    HttpHandler, Matcher, RequestInfo, RouteTable, Router, WsHandler,
};
use crate::session::Connection;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Accumulates rules in order before freezing them into a [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    http: RouteTable<dyn HttpHandler>,
    ws: RouteTable<dyn WsHandler>,
    root: Option<PathBuf>,
}

impl ServerBuilder {
    /// Register a one-shot rule.
    pub fn http(mut self, matcher: Matcher, handler: impl HttpHandler + 'static) -> Self {
        self.http.push(matcher, Arc::new(handler));
        self
    }

    /// Register an upgrade rule.
    pub fn ws(mut self, matcher: Matcher, handler: impl WsHandler + 'static) -> Self {
        self.ws.push(matcher, Arc::new(handler));
        self
    }

    /// Answer `403` to one-shot requests whose path climbs above `root`,
    /// before any rule is consulted.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn build(self) -> Server {
        Server {
            shared: Arc::new(Shared {
                router: Router::new(self.http, self.ws),
                root: self.root,
            }),
        }
    }
}

struct Shared {
    router: Router,
    root: Option<PathBuf>,
}

pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// The axum service for this server.
    pub fn into_router(self) -> axum::Router {
        axum::Router::new()
            .fallback(dispatch)
            .with_state(self.shared)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServeError> {
        if let Ok(addr) = listener.local_addr() {
            info!(
                http_rules = self.shared.router.http_rules(),
                ws_rules = self.shared.router.ws_rules(),
                "listening on http://{}",
                addr
            );
        }
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }

    /// Bind `addr` and serve until the process exits.
    pub async fn listen(self, addr: SocketAddr) -> Result<(), ServeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        self.serve(listener).await
    }
}

fn is_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

async fn dispatch(State(shared): State<Arc<Shared>>, request: Request) -> Response {
    let path = request.uri().path().to_string();

    if is_upgrade(request.headers()) {
        return upgrade(&shared.router, request, path).await;
    }

    if request.method() != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    if let Some(root) = &shared.root {
        if let Err(AssetError::Forbidden) = resolve_under_root(root, &path) {
            warn!(path = %path, "Refused path outside root");
            return AssetError::Forbidden.into_response();
        }
    }

    match shared.router.route_http(&path) {
        Some(rule) => {
            debug!(path = %path, rule = %rule.matcher, "HTTP request");
            rule.handler.handle(request).await
        }
        None => {
            debug!(path = %path, "No HTTP rule matched");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn upgrade(router: &Router, request: Request, path: String) -> Response {
    let Some(rule) = router.route_upgrade(&path) else {
        warn!(path = %path, "No upgrade rule matched, closing connection");
        return reject();
    };
    let handler = rule.handler.clone();
    let label = rule.matcher.to_string();

    let (mut parts, _body) = request.into_parts();
    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(path = %path, "Invalid upgrade request: {}", rejection);
            return rejection.into_response();
        }
    };
    let info = RequestInfo::from_parts(&parts);

    info!(path = %path, rule = %label, "WebSocket upgrade request");
    ws.on_upgrade(move |socket| handle_socket(socket, handler, info, label))
}

/// Refuse an upgrade and have the transport drop the connection.
fn reject() -> Response {
    (StatusCode::NOT_FOUND, [(header::CONNECTION, "close")]).into_response()
}

/// Drive one upgraded connection until it closes.
async fn handle_socket(
    mut socket: WebSocket,
    handler: Arc<dyn WsHandler>,
    info: RequestInfo,
    rule: String,
) {
    let (connection, mut rx) = Connection::channel();
    let conn_id = connection.id().to_string();

    let mut session = match handler.open(connection, &info).await {
        Ok(session) => session,
        Err(e) => {
            warn!(conn_id = %conn_id, path = %info.path, "Upgrade handler declined: {}", e);
            let _ = socket.close().await;
            return;
        }
    };
    info!(conn_id = %conn_id, path = %info.path, rule = %rule, "WebSocket connected");

    loop {
        tokio::select! {
            // Handle outgoing messages from the session
            Some(text) = rx.recv() => {
                if let Err(e) = socket.send(Message::Text(text)).await {
                    debug!(conn_id = %conn_id, "Failed to send WebSocket message: {}", e);
                    break;
                }
            }

            // Handle incoming messages
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        session.deliver(text).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!(conn_id = %conn_id, "Ignoring binary message");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(conn_id = %conn_id, "Client initiated close");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by axum
                    }
                    Some(Err(e)) => {
                        error!(conn_id = %conn_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(conn_id = %conn_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    session.teardown();
    info!(conn_id = %conn_id, path = %info.path, "WebSocket disconnected");
}
