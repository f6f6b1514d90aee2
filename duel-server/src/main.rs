use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::info;

use duel_core::dictionary::Dictionary;
use duel_persistence::{connection::connect_and_migrate, repositories::MatchRepository};
use duel_server::{
    auth::AuthService,
    config::Config,
    create_routes,
    engine::{EngineConfig, MatchEngine},
    matchmaking::{MatchmakingQueue, QueueConfig},
    session::SessionRegistry,
    spawn_pairing_loop,
    state_store::open_state_store,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting Word Duel server...");

    let config = Config::new();
    let registry = Arc::new(SessionRegistry::new());

    info!("Loading word lists from {}", config.words_directory);
    let dictionary = match Dictionary::load(&config.words_directory) {
        Ok(dictionary) => {
            info!(
                "Loaded {} answers, {} valid guesses, {} common words",
                dictionary.answers().len(),
                dictionary.valid_guess_count(),
                dictionary.common_words().len()
            );
            Arc::new(dictionary)
        }
        Err(e) => {
            tracing::error!("Failed to load word lists: {}", e);
            tracing::error!(
                "Set WORDS_DIRECTORY to a directory containing answers.json, \
                 valid_guesses.json and common_words.json."
            );
            std::process::exit(1);
        }
    };

    let match_ttl = Duration::from_millis(config.match_ttl_ms);
    let store = match open_state_store(&config.state_store_url, match_ttl) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open state store: {}", e);
            std::process::exit(1);
        }
    };

    let db = match connect_and_migrate().await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };
    let matches_repo = Arc::new(MatchRepository::new(db));

    let auth_service = if config.auth_dev_mode {
        info!("Starting in development authentication mode - token validation is string based");
        Arc::new(AuthService::new_dev_mode())
    } else {
        Arc::new(AuthService::new(
            config.auth_token_secret.clone(),
            config.auth_token_ttl_seconds,
        ))
    };

    let match_engine = MatchEngine::new(
        store.clone(),
        registry.clone(),
        dictionary,
        matches_repo,
        EngineConfig {
            disconnect_grace: Duration::from_millis(config.disconnect_grace_ms),
            match_ttl,
            bot_pacing_override: None,
        },
    );

    let (matchmaking_queue, pairing_outcomes) = MatchmakingQueue::new(
        registry.clone(),
        QueueConfig {
            initial_band: config.initial_band,
            max_band: config.max_band,
            wait_budget: Duration::from_millis(config.matchmaking_wait_budget_ms),
            retry_interval: Duration::from_secs(2),
        },
    );
    spawn_pairing_loop(match_engine.clone(), pairing_outcomes);

    // Periodic sweep of expired live-state entries.
    let sweep_store = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            match sweep_store.sweep().await {
                Ok(0) => {}
                Ok(removed) => info!("swept {} expired state entries", removed),
                Err(e) => tracing::warn!("state store sweep failed: {}", e),
            }
        }
    });

    let routes = create_routes(
        registry.clone(),
        match_engine.clone(),
        matchmaking_queue.clone(),
        auth_service,
    );

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config.host.parse::<std::net::IpAddr>().expect("Invalid HOST"),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
