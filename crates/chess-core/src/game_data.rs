use serde::{Deserialize, Serialize};
use shakmaty::Move;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub date: Option<String>,
    pub time_control: Option<String>,
    pub eco: Option<String>,
    pub event: Option<String>,
    pub link: Option<String>,
    pub fen: Option<String>,
}

/// One full move of the recorded game: White's ply and Black's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub move_number: u32,
    pub white_notation: String,
    /// Empty when the game ended on White's move.
    pub black_notation: String,
}

impl MoveRecord {
    pub fn new(move_number: u32, white: &str, black: &str) -> Self {
        Self {
            move_number,
            white_notation: white.to_string(),
            black_notation: black.to_string(),
        }
    }
}

/// A ply resolved against the rules engine at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ply {
    pub san: String,
    pub mv: Move,
}

/// Pair a flat ply list into numbered move records.
pub fn pair_plies<S: AsRef<str>>(sans: &[S]) -> Vec<MoveRecord> {
    sans.chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            let white = pair.first().map(|s| s.as_ref()).unwrap_or_default();
            let black = pair.get(1).map(|s| s.as_ref()).unwrap_or_default();
            MoveRecord::new(i as u32 + 1, white, black)
        })
        .collect()
}
