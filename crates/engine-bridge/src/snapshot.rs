use crate::uci::{InfoLine, Score, SuggestedMove};

/// The latest accepted evaluation of the most recently submitted position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalSnapshot {
    pub depth: u32,
    /// Pawn units from the side to move; `None` when a mate was found.
    pub score: Option<f64>,
    pub mate_in: Option<i32>,
    pub principal_line: Vec<String>,
    pub suggested_move: Option<SuggestedMove>,
    /// Set once the engine reported its best move.
    pub complete: bool,
}

impl EvalSnapshot {
    pub fn from_info(info: &InfoLine) -> Self {
        let (score, mate_in) = match info.score {
            Score::Centipawns(cp) => (Some(f64::from(cp) / 100.0), None),
            Score::Mate(n) => (None, Some(n)),
        };
        Self {
            depth: info.depth,
            score,
            mate_in,
            principal_line: info.pv.clone(),
            suggested_move: None,
            complete: false,
        }
    }

    pub fn complete_with(&mut self, best: Option<SuggestedMove>) {
        self.suggested_move = best;
        self.complete = true;
    }
}
