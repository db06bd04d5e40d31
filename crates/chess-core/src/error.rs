//! Notation error types

use thiserror::Error;

/// Why a game's notation text could not be turned into a ply list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("Unreadable move {san:?} at ply {ply}")]
    InvalidSan { ply: usize, san: String },

    #[error("Illegal move {san:?} at ply {ply}")]
    IllegalMove { ply: usize, san: String },
}
