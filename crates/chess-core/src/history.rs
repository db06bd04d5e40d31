//! Move-history controller.
//!
//! Owns one shakmaty position per open game. The recorded plies are resolved
//! once at load time; every navigation rebuilds the displayed position by
//! replaying from the start position rather than undoing incrementally.
//!
//! Board clicks compute legality against whatever position is displayed, but
//! moves are only applied once the cursor sits on the final recorded ply. Such
//! moves form an unrecorded continuation that the next navigation discards.

use std::sync::mpsc::{channel, Receiver, Sender};

use serde::{Deserialize, Serialize};
use shakmaty::{
    san::SanPlus, uci::UciMove, CastlingMode, Chess, Color, Move, Piece, Position, Role, Square,
};
use tracing::{debug, warn};

use crate::error::NotationError;
use crate::game_data::{pair_plies, GameMetadata, MoveRecord, Ply};
use crate::pgn::{parse_game, parse_headers, start_position, to_fen};

/// Origin and destination of the most recently shown move.
/// Castling is reported as the king's two-square step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastMove {
    pub from: Square,
    pub to: Square,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    White,
    Black,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::White => Orientation::Black,
            Orientation::Black => Orientation::White,
        }
    }
}

/// Notifications for whoever renders the move list and cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// Sent exactly once per `load`, empty when the notation was rejected.
    MovesLoaded(Vec<MoveRecord>),
    PlyChanged(usize),
}

/// What a board click did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected {
        square: Square,
        destinations: Vec<Square>,
    },
    Moved(LastMove),
    Cleared,
}

pub struct MoveHistory {
    loaded: bool,
    metadata: GameMetadata,
    start: Chess,
    plies: Vec<Ply>,
    records: Vec<MoveRecord>,
    position: Chess,
    current_ply: usize,
    continuation: Vec<Ply>,
    selected: Option<Square>,
    destinations: Vec<Square>,
    last_move: Option<LastMove>,
    orientation: Orientation,
    subscribers: Vec<Sender<HistoryEvent>>,
}

impl Default for MoveHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveHistory {
    /// An unloaded controller: standard start position, no plies.
    pub fn new() -> Self {
        Self {
            loaded: false,
            metadata: GameMetadata::default(),
            start: Chess::default(),
            plies: Vec::new(),
            records: Vec::new(),
            position: Chess::default(),
            current_ply: 0,
            continuation: Vec::new(),
            selected: None,
            destinations: Vec::new(),
            last_move: None,
            orientation: Orientation::default(),
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<HistoryEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Load a game, discarding any previous one.
    ///
    /// Rejected notation still leaves the controller loaded, with zero moves
    /// at the best start position that could be read.
    pub fn load(
        &mut self,
        initial_fen: Option<&str>,
        text: &str,
    ) -> Result<&[MoveRecord], NotationError> {
        let result = match parse_game(text, initial_fen) {
            Ok(game) => {
                self.metadata = game.metadata;
                self.start = game.start;
                self.plies = game.plies;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Rejected game notation");
                let metadata = parse_headers(text);
                self.start = start_position(initial_fen.or(metadata.fen.as_deref()))
                    .or_else(|_| start_position(metadata.fen.as_deref()))
                    .unwrap_or_default();
                self.metadata = metadata;
                self.plies.clear();
                Err(err)
            }
        };

        let sans: Vec<&str> = self.plies.iter().map(|p| p.san.as_str()).collect();
        self.records = pair_plies(&sans);
        self.loaded = true;
        self.replay_to(0);

        debug!(plies = self.plies.len(), "Game loaded");
        self.emit(HistoryEvent::MovesLoaded(self.records.clone()));
        self.emit(HistoryEvent::PlyChanged(0));

        result.map(|()| self.records.as_slice())
    }

    /// Jump to the position after `ply` plies. Out-of-range requests change
    /// nothing and return `false`.
    pub fn go_to_ply(&mut self, ply: usize) -> bool {
        if !self.loaded || ply > self.total_plies() {
            debug!(ply, total = self.total_plies(), "Ignoring out-of-range navigation");
            return false;
        }
        self.replay_to(ply);
        self.emit(HistoryEvent::PlyChanged(ply));
        true
    }

    pub fn step_forward(&mut self) -> bool {
        self.go_to_ply(self.current_ply + 1)
    }

    pub fn step_back(&mut self) -> bool {
        match self.current_ply.checked_sub(1) {
            Some(ply) => self.go_to_ply(ply),
            None => false,
        }
    }

    pub fn go_to_start(&mut self) -> bool {
        self.go_to_ply(0)
    }

    pub fn go_to_end(&mut self) -> bool {
        self.go_to_ply(self.total_plies())
    }

    /// Handle a click on `square`.
    pub fn select_square(&mut self, square: Square) -> SelectOutcome {
        if !self.loaded {
            return SelectOutcome::Cleared;
        }

        let turn = self.position.turn();
        let own_piece = self
            .position
            .board()
            .piece_at(square)
            .is_some_and(|p| p.color == turn);

        if own_piece {
            self.destinations = legal_destinations(&self.position, square);
            self.selected = Some(square);
            return SelectOutcome::Selected {
                square,
                destinations: self.destinations.clone(),
            };
        }

        let from = self
            .selected
            .filter(|_| self.destinations.contains(&square));

        let outcome = match from {
            Some(from) if self.is_at_end() => self.play_click(from, square),
            Some(_) => {
                debug!(ply = self.current_ply, "Recorded history is read-only");
                SelectOutcome::Cleared
            }
            None => SelectOutcome::Cleared,
        };

        self.clear_selection();
        outcome
    }

    pub fn flip(&mut self) -> Orientation {
        self.orientation = self.orientation.flipped();
        self.orientation
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_at_end(&self) -> bool {
        self.current_ply == self.total_plies()
    }

    pub fn fen(&self) -> String {
        to_fen(&self.position)
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(square)
    }

    pub fn side_to_move(&self) -> Color {
        self.position.turn()
    }

    pub fn selected_square(&self) -> Option<Square> {
        self.selected
    }

    pub fn legal_destinations(&self) -> &[Square] {
        &self.destinations
    }

    pub fn last_move(&self) -> Option<LastMove> {
        self.last_move
    }

    pub fn current_ply(&self) -> usize {
        self.current_ply
    }

    pub fn total_plies(&self) -> usize {
        self.plies.len()
    }

    pub fn records(&self) -> &[MoveRecord] {
        &self.records
    }

    pub fn plies(&self) -> &[Ply] {
        &self.plies
    }

    /// SAN of moves clicked in past the end of the recorded game.
    pub fn continuation(&self) -> Vec<&str> {
        self.continuation.iter().map(|p| p.san.as_str()).collect()
    }

    pub fn metadata(&self) -> &GameMetadata {
        &self.metadata
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn replay_to(&mut self, ply: usize) {
        let mut pos = self.start.clone();
        for p in &self.plies[..ply] {
            pos.play_unchecked(p.mv);
        }

        self.position = pos;
        self.current_ply = ply;
        self.last_move = ply
            .checked_sub(1)
            .and_then(|i| self.plies.get(i))
            .and_then(|p| move_squares(p.mv))
            .map(|(from, to)| LastMove { from, to });
        self.continuation.clear();
        self.clear_selection();
    }

    fn play_click(&mut self, from: Square, to: Square) -> SelectOutcome {
        let candidates: Vec<Move> = self
            .position
            .legal_moves()
            .into_iter()
            .filter(|m| move_squares(*m) == Some((from, to)))
            .collect();

        let chosen = candidates
            .iter()
            .copied()
            .find(|m| m.promotion() == Some(Role::Queen))
            .or_else(|| candidates.first().copied());

        let Some(mv) = chosen else {
            return SelectOutcome::Cleared;
        };

        let san = SanPlus::from_move_and_play_unchecked(&mut self.position, mv);
        debug!(san = %san, "Continuation move played");
        self.continuation.push(Ply {
            san: san.to_string(),
            mv,
        });

        let last = LastMove { from, to };
        self.last_move = Some(last);
        SelectOutcome::Moved(last)
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.destinations.clear();
    }

    fn emit(&mut self, event: HistoryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// From/to squares as a board UI sees them (castling lands on g1/c1).
pub fn move_squares(mv: Move) -> Option<(Square, Square)> {
    match UciMove::from_move(mv, CastlingMode::Standard) {
        UciMove::Normal { from, to, .. } => Some((from, to)),
        _ => None,
    }
}

/// Destinations reachable by the piece on `square`, promotions collapsed.
pub fn legal_destinations(pos: &Chess, square: Square) -> Vec<Square> {
    let mut destinations = Vec::new();
    for mv in pos.legal_moves() {
        if let Some((from, to)) = move_squares(mv) {
            if from == square && !destinations.contains(&to) {
                destinations.push(to);
            }
        }
    }
    destinations
}
