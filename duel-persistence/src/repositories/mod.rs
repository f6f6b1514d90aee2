pub mod match_repository;
pub mod user_repository;

pub use match_repository::*;
pub use user_repository::*;
