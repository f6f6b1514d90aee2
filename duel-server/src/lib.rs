use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;
use warp::Filter;

pub mod auth;
pub mod config;
pub mod engine;
pub mod matchmaking;
pub mod session;
pub mod state_store;
pub mod websocket;

use auth::AuthService;
use engine::MatchEngine;
use matchmaking::{MatchmakingQueue, PairingOutcome};
use session::SessionRegistry;

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

pub fn create_routes(
    registry: Arc<SessionRegistry>,
    match_engine: Arc<MatchEngine>,
    matchmaking_queue: Arc<MatchmakingQueue>,
    auth_service: Arc<AuthService>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let registry_filter = warp::any().map({
        let registry = registry.clone();
        move || registry.clone()
    });

    let engine_filter = warp::any().map({
        let match_engine = match_engine.clone();
        move || match_engine.clone()
    });

    let queue_filter = warp::any().map({
        let matchmaking_queue = matchmaking_queue.clone();
        move || matchmaking_queue.clone()
    });

    let auth_filter = warp::any().map({
        let auth_service = auth_service.clone();
        move || auth_service.clone()
    });

    // WebSocket endpoint; the bearer token rides the handshake query string.
    let ws_route = warp::path("ws")
        .and(warp::ws())
        .and(warp::query::<WsQuery>())
        .and(registry_filter)
        .and(engine_filter)
        .and(queue_filter)
        .and(auth_filter)
        .map(
            |ws: warp::ws::Ws, query: WsQuery, registry, engine, queue, auth| {
                ws.on_upgrade(move |socket| {
                    websocket::handle_connection(socket, registry, engine, queue, auth, query.token)
                })
            },
        );

    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET"]);

    ws_route.or(health).with(cors).with(warp::log("word_duel"))
}

/// Turn queue outcomes into live matches. Runs for the server's lifetime.
pub fn spawn_pairing_loop(
    match_engine: Arc<MatchEngine>,
    mut outcomes: mpsc::UnboundedReceiver<PairingOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            let result = match outcome {
                PairingOutcome::Paired { first, second } => {
                    match_engine
                        .clone()
                        .start_human_match(first.player, second.player)
                        .await
                }
                PairingOutcome::BotMatch { ticket, difficulty } => {
                    match_engine
                        .clone()
                        .start_bot_match(ticket.player, difficulty)
                        .await
                }
            };
            if let Err(e) = result {
                error!("failed to start match from queue outcome: {}", e);
            }
        }
    })
}
