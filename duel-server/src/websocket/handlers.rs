use std::sync::Arc;

use tracing::{info, warn};

use duel_types::{ClientMessage, GatewayError, MatchId, PlayerId, PlayerProfile, ServerMessage};

use crate::engine::{MatchCommand, MatchEngine};
use crate::matchmaking::MatchmakingQueue;
use crate::session::{ConnectionId, SessionRegistry};

/// Routes one connection's inbound events to the matchmaking queue and the
/// match engine. Identity is bound explicitly by the register message; the
/// handshake token only proves who the connection may register as.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    registry: Arc<SessionRegistry>,
    engine: Arc<MatchEngine>,
    queue: Arc<MatchmakingQueue>,
    handshake_identity: Option<PlayerProfile>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        registry: Arc<SessionRegistry>,
        engine: Arc<MatchEngine>,
        queue: Arc<MatchmakingQueue>,
        handshake_identity: Option<PlayerProfile>,
    ) -> Self {
        Self {
            connection_id,
            registry,
            engine,
            queue,
            handshake_identity,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        match message {
            ClientMessage::Register { id, username, elo } => {
                self.handle_register(id, username, elo)
            }
            ClientMessage::MatchmakingStart => self.handle_matchmaking_start().await,
            ClientMessage::MatchmakingCancel => self.handle_matchmaking_cancel().await,
            ClientMessage::Guess { game_id, guess } => self.handle_guess(game_id, guess),
            ClientMessage::Forfeit { game_id } => self.handle_forfeit(game_id),
            ClientMessage::Rejoin { game_id } => self.handle_rejoin(game_id),
        }
    }

    pub async fn handle_disconnect(&self) {
        if let Some(player_id) = self.registry.player_of(self.connection_id) {
            self.queue.cancel(&player_id).await;
        }

        if let Some(departure) = self.registry.close(self.connection_id) {
            if departure.went_offline {
                if let Some(match_id) = self.engine.match_of(&departure.player_id) {
                    self.engine.submit(
                        &match_id,
                        MatchCommand::Disconnect {
                            player_id: departure.player_id,
                        },
                    );
                }
            }
        }
    }

    /// Bind this connection to the identity proven at handshake. The
    /// payload must agree with the token; anything else is an imposter.
    fn handle_register(&self, id: PlayerId, username: String, elo: i32) {
        let Some(identity) = &self.handshake_identity else {
            self.send_not_authenticated();
            return;
        };
        if identity.id != id {
            warn!(
                "connection {} tried to register as {} with a token for {}",
                self.connection_id, id, identity.id
            );
            self.send_not_authenticated();
            return;
        }

        self.registry.bind(
            self.connection_id,
            PlayerProfile { id, username, elo },
        );
        info!("connection {} registered as {}", self.connection_id, id);
    }

    async fn handle_matchmaking_start(&self) {
        let Some(profile) = self.registered_profile() else {
            self.send_not_authenticated();
            return;
        };

        match self.queue.clone().enqueue(profile, self.connection_id).await {
            Ok(()) => self.send(ServerMessage::MatchmakingSearching),
            Err(e) => self.send(ServerMessage::Error {
                message: e.to_string(),
            }),
        }
    }

    async fn handle_matchmaking_cancel(&self) {
        let Some(profile) = self.registered_profile() else {
            self.send_not_authenticated();
            return;
        };
        self.queue.cancel(&profile.id).await;
        self.send(ServerMessage::MatchmakingCancelled);
    }

    fn handle_guess(&self, game_id: MatchId, guess: String) {
        let Some(profile) = self.registered_profile() else {
            self.send_not_authenticated();
            return;
        };
        let delivered = self.engine.submit(
            &game_id,
            MatchCommand::Guess {
                player_id: profile.id,
                word: guess,
            },
        );
        if !delivered {
            self.send(ServerMessage::GameNotFound);
        }
    }

    fn handle_forfeit(&self, game_id: MatchId) {
        let Some(profile) = self.registered_profile() else {
            self.send_not_authenticated();
            return;
        };
        let delivered = self.engine.submit(
            &game_id,
            MatchCommand::Forfeit {
                player_id: profile.id,
            },
        );
        if !delivered {
            self.send(ServerMessage::GameNotFound);
        }
    }

    fn handle_rejoin(&self, game_id: MatchId) {
        let Some(profile) = self.registered_profile() else {
            self.send_not_authenticated();
            return;
        };
        let delivered = self.engine.submit(
            &game_id,
            MatchCommand::Rejoin {
                player_id: profile.id,
            },
        );
        if !delivered {
            self.send(ServerMessage::GameNotFound);
        }
    }

    fn registered_profile(&self) -> Option<PlayerProfile> {
        let player_id = self.registry.player_of(self.connection_id)?;
        self.registry.profile_of(&player_id)
    }

    fn send(&self, message: ServerMessage) {
        if !self.registry.send_to_connection(self.connection_id, message) {
            warn!("failed to deliver to connection {}", self.connection_id);
        }
    }

    fn send_not_authenticated(&self) {
        self.send(ServerMessage::Error {
            message: GatewayError::NotAuthenticated.to_string(),
        });
    }
}
