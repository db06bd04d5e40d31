//! Game notation, move history and opening lookup on top of shakmaty.

pub mod error;
pub mod game_data;
pub mod history;
pub mod opening;
pub mod pgn;

pub use error::NotationError;
pub use game_data::{GameMetadata, MoveRecord, Ply};
pub use history::{HistoryEvent, LastMove, MoveHistory, Orientation, SelectOutcome};
pub use opening::{detect_opening, OpeningInfo};
