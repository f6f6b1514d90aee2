pub mod bot;
pub mod dictionary;
pub mod match_state;
pub mod rating;

// Re-export main components
pub use bot::*;
pub use dictionary::*;
pub use match_state::*;
pub use rating::*;
