// Client-side session logic for both ends of the relay

pub mod controller;
pub mod display;
pub mod scene;

pub use controller::{ConnectionStatus, ControllerClient, ControllerEvent, ControllerOptions, ControllerState};
pub use display::{DisplayClient, DisplayCommand, DisplayEvent};
pub use scene::{ControllerMode, SceneLayout};

use crate::error::Result;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub(crate) type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a WebSocket to the relay; handshake failures surface as `RelayError::WebSocket`
pub(crate) async fn open_socket(url: &str) -> Result<RelaySocket> {
    let (ws, _) = connect_async(url).await?;
    Ok(ws)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;

    #[tokio::test]
    async fn test_refused_connect_is_websocket_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let Err(err) = open_socket(&format!("ws://{}/ws/game", addr)).await else {
            panic!("connect to a closed port succeeded");
        };
        assert!(matches!(err, RelayError::WebSocket(_)), "got {:?}", err);
        assert!(err.to_string().starts_with("WebSocket error"));
    }
}
