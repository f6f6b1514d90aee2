pub mod connection;
pub mod entities;
pub mod repositories;

use thiserror::Error;

/// Failure of a persistent-store operation. The rating commit surfaces this
/// so the engine can still report the match as finished with a zero delta.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistent store unavailable: {0}")]
    Unavailable(#[from] sea_orm::DbErr),
}
