pub mod errors;
pub mod game;
pub mod messages;
pub mod user;

// Re-export all types
pub use errors::*;
pub use game::*;
pub use messages::*;
pub use user::*;

use uuid::Uuid;

pub type MatchId = Uuid;
pub type PlayerId = Uuid;

/// Guess quota per player per match.
pub const MAX_GUESSES: usize = 6;

/// Every target word and guess is exactly this long.
pub const WORD_LENGTH: usize = 5;
