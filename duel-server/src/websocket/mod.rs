use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use duel_types::ClientMessage;

use crate::auth::AuthService;
use crate::engine::MatchEngine;
use crate::matchmaking::MatchmakingQueue;
use crate::session::{ConnectionId, SessionRegistry};

pub mod handlers;
pub mod rate_limiter;

use handlers::MessageHandler;
use rate_limiter::RateLimiter;

/// Drive one WebSocket connection until either side hangs up. The bearer
/// token (if any) was pulled from the handshake query string; connections
/// without one may connect but stay spectator-blind until they could
/// present an identity.
pub async fn handle_connection(
    websocket: WebSocket,
    registry: Arc<SessionRegistry>,
    engine: Arc<MatchEngine>,
    queue: Arc<MatchmakingQueue>,
    auth: Arc<AuthService>,
    bearer_token: Option<String>,
) {
    let connection_id = ConnectionId::new();
    info!("new WebSocket connection: {}", connection_id);

    let handshake_identity = bearer_token.and_then(|token| match auth.validate_token(&token) {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!("handshake token rejected for {}: {}", connection_id, e);
            None
        }
    });

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let mut rate_limiter = RateLimiter::new();

    let message_receiver = registry.open(connection_id);

    let handler = MessageHandler::new(
        connection_id,
        registry.clone(),
        engine,
        queue,
        handshake_identity,
    );

    let incoming = {
        let handler = handler.clone();
        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        if let Err(e) =
                            handle_frame(msg, &mut rate_limiter, &handler, connection_id).await
                        {
                            error!("error handling message for {}: {}", connection_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    let outgoing = async move {
        let mut receiver = message_receiver;
        while let Some(message) = receiver.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("failed to serialize message: {:?}", e);
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::text(json)).await {
                warn!("failed to send message to {}: {:?}", connection_id, e);
                break;
            }
        }
    };

    tokio::select! {
        _ = incoming => {},
        _ = outgoing => {},
    }

    info!("connection {} disconnected", connection_id);
    handler.handle_disconnect().await;
}

async fn handle_frame(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    handler: &MessageHandler,
    connection_id: ConnectionId,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !rate_limiter.check_rate_limit() {
        warn!("rate limit exceeded for connection {}", connection_id);
        return Err("rate limit exceeded".into());
    }

    if !msg.is_text() {
        return Ok(());
    }

    let text = msg.to_str().map_err(|_| "invalid text message")?;
    let client_message: ClientMessage =
        serde_json::from_str(text).map_err(|e| format!("invalid JSON message: {}", e))?;

    handler.handle_message(client_message).await;
    Ok(())
}
