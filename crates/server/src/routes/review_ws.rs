//! WebSocket review session.
//!
//! One connection owns one move history and one engine bridge. Every change
//! of the displayed position is pushed to the engine, and evaluations stream
//! back to the client as the engine reports them.

use std::future::pending;
use std::sync::mpsc::Receiver;

use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use chess_core::{
    GameMetadata, HistoryEvent, LastMove, MoveHistory, MoveRecord, Orientation, SelectOutcome,
};
use engine_bridge::{EngineConfig, EngineStatus, EvalBridge, EvalSnapshot, SuggestedMove};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use shakmaty::{Color, Square};
use tokio::sync::watch;

use crate::config::Config;

// ---- Message types ----

/// Client → Server messages
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Load {
        pgn: String,
        initial_fen: Option<String>,
    },
    GoToPly {
        ply: usize,
    },
    Step {
        direction: StepDirection,
    },
    SelectSquare {
        square: String,
    },
    Flip,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDirection {
    Forward,
    Back,
    Start,
    End,
}

/// Server → Client messages
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Moves {
        game: GameMetadata,
        records: Vec<MoveRecord>,
    },
    Board(BoardView),
    Evaluation(EvaluationView),
    /// The shown position changed; any earlier evaluation no longer applies.
    EvaluationCleared,
    EngineStatus {
        status: EngineStatus,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SquarePair {
    pub from: String,
    pub to: String,
}

impl From<LastMove> for SquarePair {
    fn from(m: LastMove) -> Self {
        Self {
            from: m.from.to_string(),
            to: m.to.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoardView {
    pub fen: String,
    pub ply: usize,
    pub total_plies: usize,
    pub turn: &'static str,
    pub last_move: Option<SquarePair>,
    pub selected: Option<String>,
    pub destinations: Vec<String>,
    pub orientation: Orientation,
    /// Moves played on the board past the end of the recorded game.
    pub continuation: Vec<String>,
}

impl BoardView {
    fn of(history: &MoveHistory) -> Self {
        Self {
            fen: history.fen(),
            ply: history.current_ply(),
            total_plies: history.total_plies(),
            turn: match history.side_to_move() {
                Color::White => "white",
                Color::Black => "black",
            },
            last_move: history.last_move().map(SquarePair::from),
            selected: history.selected_square().map(|s| s.to_string()),
            destinations: history
                .legal_destinations()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            orientation: history.orientation(),
            continuation: history
                .continuation()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EvaluationView {
    pub depth: u32,
    /// Pawns, from the side to move.
    pub score: Option<f64>,
    pub mate_in: Option<i32>,
    pub principal_line: Vec<String>,
    pub suggested_move: Option<SquarePair>,
    pub complete: bool,
}

impl From<EvalSnapshot> for EvaluationView {
    fn from(s: EvalSnapshot) -> Self {
        Self {
            depth: s.depth,
            score: s.score,
            mate_in: s.mate_in,
            principal_line: s.principal_line,
            suggested_move: s.suggested_move.map(|m: SuggestedMove| SquarePair {
                from: m.from.to_string(),
                to: m.to.to_string(),
            }),
            complete: s.complete,
        }
    }
}

// ---- Session state ----

pub struct ReviewSession {
    history: MoveHistory,
    events: Receiver<HistoryEvent>,
    bridge: Option<EvalBridge>,
}

impl ReviewSession {
    pub fn new(bridge: Option<EvalBridge>) -> Self {
        let mut history = MoveHistory::new();
        let events = history.subscribe();
        Self {
            history,
            events,
            bridge,
        }
    }

    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    /// Apply one client message and collect the replies, in send order.
    pub fn handle(&mut self, msg: ClientMessage) -> Vec<ServerMessage> {
        let mut out = Vec::new();

        match msg {
            ClientMessage::Load { pgn, initial_fen } => {
                if let Err(e) = self.history.load(initial_fen.as_deref(), &pgn) {
                    out.push(ServerMessage::Error {
                        message: format!("Could not load game: {e}"),
                    });
                }
            }
            ClientMessage::GoToPly { ply } => {
                // Out of range leaves the board where it is.
                self.history.go_to_ply(ply);
            }
            ClientMessage::Step { direction } => {
                match direction {
                    StepDirection::Forward => self.history.step_forward(),
                    StepDirection::Back => self.history.step_back(),
                    StepDirection::Start => self.history.go_to_start(),
                    StepDirection::End => self.history.go_to_end(),
                };
            }
            ClientMessage::SelectSquare { square } => match square.parse::<Square>() {
                Ok(square) => {
                    if let SelectOutcome::Moved(_) = self.history.select_square(square) {
                        self.submit_position();
                    }
                }
                Err(_) => out.push(ServerMessage::Error {
                    message: format!("Invalid square: {square}"),
                }),
            },
            ClientMessage::Flip => {
                self.history.flip();
            }
        }

        let mut position_changed = false;
        while let Ok(event) = self.events.try_recv() {
            match event {
                HistoryEvent::MovesLoaded(records) => out.push(ServerMessage::Moves {
                    game: self.history.metadata().clone(),
                    records,
                }),
                HistoryEvent::PlyChanged(_) => position_changed = true,
            }
        }
        if position_changed {
            self.submit_position();
        }

        out.push(ServerMessage::Board(BoardView::of(&self.history)));
        out
    }

    fn submit_position(&self) {
        if let Some(bridge) = &self.bridge {
            bridge.submit(&self.history.fen());
        }
    }

    pub async fn close(&mut self) {
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.terminate().await;
        }
    }
}

// ---- WebSocket handler ----

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(config): Extension<Config>,
) -> impl IntoResponse {
    let engine = config.engine();
    ws.on_upgrade(move |socket| handle_socket(socket, engine))
}

async fn handle_socket(socket: WebSocket, engine: EngineConfig) {
    let (mut sender, mut receiver) = socket.split();

    let (bridge, start_failure) = match EvalBridge::start(&engine) {
        Ok(bridge) => (Some(bridge), None),
        Err(e) => {
            tracing::warn!("Review session without engine: {e}");
            (None, Some(EngineStatus::Unavailable(e.to_string())))
        }
    };
    let mut evaluations = bridge.as_ref().map(EvalBridge::subscribe);
    let mut statuses = bridge.as_ref().map(EvalBridge::subscribe_status);
    let mut session = ReviewSession::new(bridge);

    if let Err(e) = run_session(
        &mut sender,
        &mut receiver,
        &mut session,
        &mut evaluations,
        &mut statuses,
        start_failure,
    )
    .await
    {
        tracing::debug!("Review socket closed: {e}");
    }

    session.close().await;
}

async fn run_session(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    session: &mut ReviewSession,
    evaluations: &mut Option<watch::Receiver<Option<EvalSnapshot>>>,
    statuses: &mut Option<watch::Receiver<EngineStatus>>,
    start_failure: Option<EngineStatus>,
) -> Result<()> {
    if let Some(status) = start_failure {
        send_msg(sender, &ServerMessage::EngineStatus { status }).await?;
    }
    send_msg(sender, &ServerMessage::Board(BoardView::of(session.history()))).await?;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(t))) => t.to_string(),
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };

                let replies = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => session.handle(client_msg),
                    Err(e) => vec![ServerMessage::Error {
                        message: format!("Invalid message: {e}"),
                    }],
                };
                for reply in &replies {
                    send_msg(sender, reply).await?;
                }
            }
            snapshot = next_change(evaluations) => {
                send_msg(sender, &evaluation_message(snapshot)).await?;
            }
            status = next_change(statuses) => {
                send_msg(sender, &ServerMessage::EngineStatus { status }).await?;
            }
        }
    }
}

fn evaluation_message(snapshot: Option<EvalSnapshot>) -> ServerMessage {
    match snapshot {
        Some(snapshot) => ServerMessage::Evaluation(snapshot.into()),
        None => ServerMessage::EvaluationCleared,
    }
}

/// Wait for the next value on an optional watch channel. A missing or closed
/// channel never yields.
async fn next_change<T: Clone>(rx: &mut Option<watch::Receiver<T>>) -> T {
    let Some(inner) = rx.as_mut() else {
        return pending().await;
    };
    if inner.changed().await.is_err() {
        *rx = None;
        return pending().await;
    }
    inner.borrow_and_update().clone()
}

// ---- Helper: send message ----

async fn send_msg(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> Result<()> {
    let json = serde_json::to_string(msg)?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    fn parse(json: &str) -> ClientMessage {
        serde_json::from_str(json).unwrap()
    }

    fn board(replies: &[ServerMessage]) -> &BoardView {
        match replies.last() {
            Some(ServerMessage::Board(view)) => view,
            other => panic!("expected trailing board message, got {other:?}"),
        }
    }

    #[test]
    fn test_client_messages_deserialize() {
        assert!(matches!(
            parse(r#"{"type":"load","pgn":"1. e4"}"#),
            ClientMessage::Load { initial_fen: None, .. }
        ));
        assert!(matches!(
            parse(r#"{"type":"go_to_ply","ply":3}"#),
            ClientMessage::GoToPly { ply: 3 }
        ));
        assert!(matches!(
            parse(r#"{"type":"step","direction":"back"}"#),
            ClientMessage::Step { direction: StepDirection::Back }
        ));
        assert!(matches!(parse(r#"{"type":"flip"}"#), ClientMessage::Flip));
    }

    #[test]
    fn test_load_sends_moves_then_board() {
        let mut session = ReviewSession::new(None);
        let replies = session.handle(parse(r#"{"type":"load","pgn":"1. e4 e5 2. Nf3"}"#));

        assert_eq!(replies.len(), 2);
        let ServerMessage::Moves { game, records } = &replies[0] else {
            panic!("expected moves first");
        };
        assert_eq!(game.white, "Unknown");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], MoveRecord::new(2, "Nf3", ""));

        let view = board(&replies);
        assert_eq!(view.ply, 0);
        assert_eq!(view.total_plies, 3);
        assert_eq!(view.last_move, None);
    }

    #[test]
    fn test_rejected_notation_reports_error() {
        let mut session = ReviewSession::new(None);
        let replies = session.handle(parse(r#"{"type":"load","pgn":"1. e4 e5 2. Qxf7"}"#));

        assert!(matches!(&replies[0], ServerMessage::Error { .. }));
        assert!(matches!(&replies[1], ServerMessage::Moves { records, .. } if records.is_empty()));
        assert_eq!(board(&replies).total_plies, 0);
    }

    #[test]
    fn test_navigation_and_out_of_range() {
        let mut session = ReviewSession::new(None);
        session.handle(parse(r#"{"type":"load","pgn":"1. e4 e5"}"#));

        let replies = session.handle(parse(r#"{"type":"go_to_ply","ply":1}"#));
        let view = board(&replies);
        assert_eq!(view.fen, AFTER_E4);
        assert_eq!(view.turn, "black");
        assert_eq!(
            view.last_move,
            Some(SquarePair {
                from: "e2".into(),
                to: "e4".into()
            })
        );

        let replies = session.handle(parse(r#"{"type":"go_to_ply","ply":9}"#));
        assert_eq!(replies.len(), 1);
        assert_eq!(board(&replies).ply, 1);
        assert_eq!(board(&replies).fen, AFTER_E4);

        let replies = session.handle(parse(r#"{"type":"step","direction":"end"}"#));
        assert_eq!(board(&replies).ply, 2);
    }

    #[test]
    fn test_moves_carry_game_headers() {
        let mut session = ReviewSession::new(None);
        let replies = session.handle(parse(
            r#"{"type":"load","pgn":"[White \"Morphy\"]\n[Black \"Isouard\"]\n\n1. e4 e5"}"#,
        ));
        let ServerMessage::Moves { game, .. } = &replies[0] else {
            panic!("expected moves first");
        };
        assert_eq!(game.white, "Morphy");
        assert_eq!(game.black, "Isouard");
    }

    #[test]
    fn test_click_to_move_at_end() {
        let mut session = ReviewSession::new(None);
        session.handle(parse(r#"{"type":"load","pgn":""}"#));

        let replies = session.handle(parse(r#"{"type":"select_square","square":"e2"}"#));
        let view = board(&replies);
        assert_eq!(view.selected.as_deref(), Some("e2"));
        let mut destinations = view.destinations.clone();
        destinations.sort();
        assert_eq!(destinations, vec!["e3", "e4"]);

        let replies = session.handle(parse(r#"{"type":"select_square","square":"e4"}"#));
        let view = board(&replies);
        assert_eq!(view.fen, AFTER_E4);
        assert_eq!(view.continuation, vec!["e4"]);
        assert_eq!(view.selected, None);
    }

    #[test]
    fn test_invalid_square_and_flip() {
        let mut session = ReviewSession::new(None);
        let replies = session.handle(parse(r#"{"type":"select_square","square":"z9"}"#));
        assert!(matches!(&replies[0], ServerMessage::Error { .. }));

        let replies = session.handle(parse(r#"{"type":"flip"}"#));
        assert_eq!(board(&replies).orientation, Orientation::Black);
    }

    #[test]
    fn test_engine_status_serializes() {
        let msg = ServerMessage::EngineStatus {
            status: EngineStatus::Unavailable("no binary".into()),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "engine_status");
        assert_eq!(json["status"]["state"], "unavailable");
        assert_eq!(json["status"]["reason"], "no binary");
    }

    mod with_engine {
        use super::*;
        use engine_bridge::HANDSHAKE;
        use std::time::Duration;
        use tokio::io::{
            duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines,
            ReadHalf, WriteHalf,
        };
        use tokio::time::timeout;

        const WAIT: Duration = Duration::from_secs(2);

        struct Engine {
            commands: Lines<BufReader<ReadHalf<DuplexStream>>>,
            output: WriteHalf<DuplexStream>,
        }

        impl Engine {
            async fn read(&mut self) -> String {
                timeout(WAIT, self.commands.next_line())
                    .await
                    .unwrap()
                    .unwrap()
                    .unwrap()
            }

            async fn expect_search(&mut self, fen: &str) {
                assert_eq!(self.read().await, "stop");
                assert_eq!(self.read().await, format!("position fen {fen}"));
                assert_eq!(self.read().await, "go movetime 500 depth 15");
            }

            async fn say(&mut self, text: &str) {
                self.output.write_all(text.as_bytes()).await.unwrap();
            }
        }

        async fn next_message(
            evaluations: &mut Option<watch::Receiver<Option<EvalSnapshot>>>,
        ) -> ServerMessage {
            evaluation_message(timeout(WAIT, next_change(evaluations)).await.unwrap())
        }

        async fn until_complete(
            evaluations: &mut Option<watch::Receiver<Option<EvalSnapshot>>>,
        ) -> EvaluationView {
            loop {
                if let ServerMessage::Evaluation(view) = next_message(evaluations).await {
                    if view.complete {
                        return view;
                    }
                }
            }
        }

        #[tokio::test]
        async fn test_navigation_clears_finished_evaluation() {
            let (bridge_side, engine_side) = duplex(8192);
            let (bridge_read, bridge_write) = split(bridge_side);
            let (engine_read, engine_write) = split(engine_side);
            let mut engine = Engine {
                commands: BufReader::new(engine_read).lines(),
                output: engine_write,
            };
            let bridge = EvalBridge::from_io(BufReader::new(bridge_read), bridge_write);

            for cmd in HANDSHAKE {
                assert_eq!(engine.read().await, *cmd);
            }
            engine.say("readyok\n").await;
            timeout(WAIT, bridge.ready()).await.unwrap().unwrap();

            let mut evaluations = Some(bridge.subscribe());
            let mut session = ReviewSession::new(Some(bridge));

            // Position A: the start of the game.
            session.handle(parse(r#"{"type":"load","pgn":"1. e4 e5"}"#));
            let start = session.history().fen();
            engine.expect_search(&start).await;
            engine
                .say("info depth 10 score cp 40 pv e2e4\nbestmove e2e4\n")
                .await;
            let a = until_complete(&mut evaluations).await;
            assert_eq!(a.score, Some(0.4));

            // Position B: the engine has not answered yet.
            session.handle(parse(r#"{"type":"go_to_ply","ply":1}"#));
            engine.expect_search(AFTER_E4).await;
            assert!(matches!(
                next_message(&mut evaluations).await,
                ServerMessage::EvaluationCleared
            ));

            engine
                .say("info depth 8 score cp -15 pv e7e5\nbestmove e7e5\n")
                .await;
            let b = until_complete(&mut evaluations).await;
            assert_eq!(b.score, Some(-0.15));

            session.close().await;
        }

        #[tokio::test]
        async fn test_cleared_evaluation_serializes() {
            let (tx, rx) = watch::channel(None);
            let mut evaluations = Some(rx);
            tx.send_replace(Some(EvalSnapshot::default()));
            assert!(matches!(
                next_message(&mut evaluations).await,
                ServerMessage::Evaluation(_)
            ));
            tx.send_replace(None);
            let cleared = next_message(&mut evaluations).await;
            let json = serde_json::to_value(&cleared).unwrap();
            assert_eq!(json["type"], "evaluation_cleared");
        }
    }
}
