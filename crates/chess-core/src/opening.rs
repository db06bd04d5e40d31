//! Opening detection by longest matching UCI prefix.

use serde::{Deserialize, Serialize};
use shakmaty::{uci::UciMove, CastlingMode, Move};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningInfo {
    pub name: String,
    pub eco: String,
}

/// Only the first few plies can identify an opening in this table.
const MAX_OPENING_PLIES: usize = 6;

const OPENINGS: &[(&str, &str, &str)] = &[
    ("e2e4", "King's Pawn Opening", "B00"),
    ("e2e4 e7e5", "King's Pawn Game", "C20"),
    ("e2e4 c7c5", "Sicilian Defense", "B20"),
    ("e2e4 e7e6", "French Defense", "C00"),
    ("e2e4 c7c6", "Caro-Kann Defense", "B10"),
    ("e2e4 d7d5", "Scandinavian Defense", "B01"),
    ("e2e4 g8f6", "Alekhine's Defense", "B02"),
    ("e2e4 d7d6", "Pirc Defense", "B07"),
    ("d2d4", "Queen's Pawn Opening", "A40"),
    ("d2d4 d7d5", "Queen's Pawn Game", "D00"),
    ("d2d4 g8f6", "Indian Defense", "A45"),
    ("d2d4 d7d5 c2c4", "Queen's Gambit", "D06"),
    ("d2d4 g8f6 c2c4", "Indian Game", "E00"),
    ("d2d4 g8f6 c2c4 e7e6", "Queen's Indian Defense", "E12"),
    ("d2d4 g8f6 c2c4 g7g6", "King's Indian Defense", "E60"),
    ("d2d4 g8f6 c2c4 c7c5", "Benoni Defense", "A56"),
    ("c2c4", "English Opening", "A10"),
    ("g1f3", "Réti Opening", "A04"),
    ("g1f3 d7d5 c2c4", "Réti Opening", "A09"),
    ("e2e4 e7e5 g1f3", "King's Knight Opening", "C40"),
    ("e2e4 e7e5 g1f3 b8c6", "King's Knight Opening", "C40"),
    ("e2e4 e7e5 g1f3 b8c6 f1b5", "Ruy Lopez", "C60"),
    ("e2e4 e7e5 g1f3 b8c6 f1c4", "Italian Game", "C50"),
    ("e2e4 e7e5 g1f3 b8c6 d2d4", "Scotch Game", "C44"),
    ("e2e4 e7e5 f2f4", "King's Gambit", "C30"),
    ("e2e4 c7c5 g1f3", "Sicilian Defense: Open", "B20"),
    ("e2e4 c7c5 g1f3 d7d6", "Sicilian Defense: Najdorf Variation", "B90"),
    ("e2e4 c7c5 c2c3", "Sicilian Defense: Alapin Variation", "B22"),
    ("d2d4 d7d5 c2c4 e7e6", "Queen's Gambit Declined", "D30"),
    ("d2d4 d7d5 c2c4 d5c4", "Queen's Gambit Accepted", "D20"),
    ("d2d4 d7d5 c2c4 c7c6", "Slav Defense", "D10"),
    ("d2d4 g8f6 c2c4 e7e6 g1f3", "Queen's Indian Defense", "E12"),
    ("d2d4 g8f6 c2c4 g7g6 b1c3 f8g7", "King's Indian Defense", "E60"),
    ("b2b3", "Nimzowitsch-Larsen Attack", "A01"),
    ("f2f4", "Bird Opening", "A02"),
    ("b1c3", "Van Geet Opening", "A00"),
];

/// Name the opening of a game from its first plies.
pub fn detect_opening(moves: &[Move]) -> Option<OpeningInfo> {
    let mut line = String::new();
    let mut found = None;

    for mv in moves.iter().take(MAX_OPENING_PLIES) {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&UciMove::from_move(*mv, CastlingMode::Standard).to_string());

        if let Some((_, name, eco)) = OPENINGS.iter().find(|(key, _, _)| *key == line) {
            found = Some(OpeningInfo {
                name: name.to_string(),
                eco: eco.to_string(),
            });
        }
    }

    found
}
