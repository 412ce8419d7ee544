// HTTP + WebSocket endpoint
// Phones connect on /ws/controller, game displays on /ws/game, both on one port

use super::interfaces;
use super::protocol::{ControllerInbound, DisplayInbound, WS_CONTROLLER_PATH, WS_GAME_PATH};
use crate::config::ServerConfig;
use crate::error::{RelayError, Result};
use crate::relay::RelayHandle;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Json, Redirect, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

#[derive(Clone)]
struct AppState {
    relay: RelayHandle,
    port: u16,
}

/// Response of `GET /api/server-info`, used by displays to build the join URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub ip: String,
    pub port: u16,
}

/// Build the application router. `port` is what /api/server-info reports.
pub fn build_router(relay: RelayHandle, config: &ServerConfig, port: u16) -> Router {
    let state = AppState { relay, port };

    let mut router = Router::new()
        .route(WS_CONTROLLER_PATH, get(controller_ws_handler))
        .route(WS_GAME_PATH, get(game_ws_handler))
        .route("/api/server-info", get(server_info))
        .route("/", get(|| async { Redirect::temporary("/game/") }))
        .with_state(state);

    if let Some(dir) = &config.static_dir {
        info!("Serving static files from {}", dir.display());
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
}

/// Bind the configured listener address
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = SocketAddr::new(config.bind, config.port);
    TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::Bind { addr, source })
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    relay: RelayHandle,
    config: &ServerConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr()?;
    let router = build_router(relay, config, local.port());

    info!("🚀 padrelay listening on {}", local);
    info!(
        "📱 Controllers join at http://{}:{}/controller/",
        interfaces::server_ip(),
        local.port()
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        ip: interfaces::server_ip().to_string(),
        port: state.port,
    })
}

async fn controller_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_controller(socket, state.relay))
}

async fn game_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_display(socket, state.relay))
}

/// Forward queued relay messages to the socket. When the relay drops the
/// queue (shutdown), close the socket so the reader side ends too.
async fn forward_outbox(mut sender: SplitSink<WebSocket, Message>, mut outbox: mpsc::Receiver<String>) {
    while let Some(text) = outbox.recv().await {
        if sender.send(Message::Text(text)).await.is_err() {
            return;
        }
    }
    let _ = sender.send(Message::Close(None)).await;
}

async fn handle_controller(socket: WebSocket, relay: RelayHandle) {
    let (ticket, outbox) = match relay.open_controller().await {
        Ok(opened) => opened,
        Err(e) => {
            warn!("Rejecting controller: {}", e);
            return;
        }
    };

    let (sender, mut receiver) = socket.split();
    let send_task = tokio::spawn(forward_outbox(sender, outbox));

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!(id = %ticket.id, error = %e, "controller socket error");
                break;
            }
        };

        match msg {
            Message::Text(text) => match ControllerInbound::parse(&text) {
                Some(inbound) => {
                    if relay.controller_message(ticket, inbound).is_err() {
                        break;
                    }
                }
                None => debug!(id = %ticket.id, "malformed controller message dropped"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    relay.close_controller(ticket);
    send_task.abort();
}

async fn handle_display(socket: WebSocket, relay: RelayHandle) {
    let (display_id, outbox) = match relay.open_display().await {
        Ok(opened) => opened,
        Err(e) => {
            warn!("Rejecting display: {}", e);
            return;
        }
    };

    let (sender, mut receiver) = socket.split();
    let send_task = tokio::spawn(forward_outbox(sender, outbox));

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!(display_id, error = %e, "display socket error");
                break;
            }
        };

        match msg {
            Message::Text(text) => match DisplayInbound::parse(&text) {
                Some(inbound) => {
                    if relay.display_message(inbound).is_err() {
                        break;
                    }
                }
                None => debug!(display_id, "malformed display message dropped"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    relay.close_display(display_id);
    send_task.abort();
}
