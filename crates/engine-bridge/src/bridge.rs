//! Evaluation bridge: one engine process per instance, driven by a tokio
//! task that owns its stdin/stdout.
//!
//! Callers never block. Positions go in through an unbounded command channel
//! and evaluations come back through a `watch` channel. Every submission sends
//! `stop`, `position` and `go` in that order. The engine answers each search
//! with exactly one `bestmove` in command order, so counting outstanding
//! searches is enough to tell a superseded search's output from the latest.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, HANDSHAKE, SEARCH_LIMITS};
use crate::error::EngineError;
use crate::snapshot::EvalSnapshot;
use crate::uci::{parse_line, EngineMessage, InfoLine, SuggestedMove};

/// How long `terminate` waits for the driver before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum EngineStatus {
    Starting,
    Ready,
    Unavailable(String),
    Terminated,
}

#[derive(Debug)]
enum Command {
    Submit(String),
    Quit,
}

pub struct EvalBridge {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: Arc<watch::Sender<Option<EvalSnapshot>>>,
    status: Arc<watch::Sender<EngineStatus>>,
    driver: Option<JoinHandle<()>>,
}

impl EvalBridge {
    /// Spawn the engine binary and begin the handshake.
    /// A spawn failure is returned once; nothing is retried.
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut process = ProcessCommand::new(&config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", config.path)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdout not captured".into()))?;

        info!(path = %config.path, "Engine process spawned");
        Ok(Self::launch(BufReader::new(stdout), stdin, Some(process)))
    }

    /// Drive an engine reachable over arbitrary async streams.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::launch(reader, writer, None)
    }

    fn launch<R, W>(reader: R, writer: W, child: Option<Child>) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(None);
        let (status, _) = watch::channel(EngineStatus::Starting);
        let snapshots = Arc::new(snapshots);
        let status = Arc::new(status);

        let driver = Driver {
            writer,
            child,
            snapshots: Arc::clone(&snapshots),
            status: Arc::clone(&status),
            ready: false,
            pending: None,
            searches: SearchSequencer::default(),
        };
        let handle = tokio::spawn(driver.run(reader.lines(), command_rx));

        Self {
            commands,
            snapshots,
            status,
            driver: Some(handle),
        }
    }

    /// Resolve once the engine acknowledged the handshake, or failed.
    pub async fn ready(&self) -> Result<(), EngineError> {
        let mut status = self.status.subscribe();
        let status = status
            .wait_for(|s| *s != EngineStatus::Starting)
            .await
            .map_err(|_| EngineError::Terminated)?;
        match &*status {
            EngineStatus::Ready => Ok(()),
            EngineStatus::Unavailable(reason) => Err(EngineError::Unavailable(reason.clone())),
            EngineStatus::Starting | EngineStatus::Terminated => Err(EngineError::Terminated),
        }
    }

    /// Analyse `fen`, superseding any earlier submission.
    pub fn submit(&self, fen: &str) {
        if self.commands.send(Command::Submit(fen.to_string())).is_err() {
            debug!("Engine driver gone; submission dropped");
        }
    }

    pub fn snapshot(&self) -> Option<EvalSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<EvalSnapshot>> {
        self.snapshots.subscribe()
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_some()
    }

    /// Stop the engine and release it. Safe to call any number of times.
    pub async fn terminate(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };

        let _ = self.commands.send(Command::Quit);
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut driver).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Engine driver ended abnormally"),
            Err(_) => {
                warn!("Engine did not shut down in time; aborting");
                driver.abort();
            }
        }
        self.status.send_replace(EngineStatus::Terminated);
        info!("Engine terminated");
    }
}

impl Drop for EvalBridge {
    fn drop(&mut self) {
        // Aborting drops the child, which kills the process.
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Counts searches that have been started but not yet answered by `bestmove`.
#[derive(Debug, Default)]
struct SearchSequencer {
    outstanding: u32,
}

impl SearchSequencer {
    fn started(&mut self) {
        self.outstanding += 1;
    }

    /// Progress lines belong to the latest search only when nothing older is pending.
    fn accepts_info(&self) -> bool {
        self.outstanding == 1
    }

    /// Retire one search; `true` when it was the latest.
    fn finished(&mut self) -> bool {
        match self.outstanding {
            0 => false,
            n => {
                self.outstanding = n - 1;
                n == 1
            }
        }
    }
}

struct Driver<W> {
    writer: W,
    child: Option<Child>,
    snapshots: Arc<watch::Sender<Option<EvalSnapshot>>>,
    status: Arc<watch::Sender<EngineStatus>>,
    ready: bool,
    /// Latest position submitted before `readyok`.
    pending: Option<String>,
    searches: SearchSequencer,
}

impl<W: AsyncWrite + Unpin> Driver<W> {
    async fn run<R: AsyncBufRead + Unpin>(
        mut self,
        mut lines: Lines<R>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        if let Err(e) = self.handshake().await {
            self.fail(e);
            self.shutdown().await;
            return;
        }

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Submit(fen)) => {
                        if let Err(e) = self.submit(fen).await {
                            self.fail(e);
                            break;
                        }
                    }
                    Some(Command::Quit) | None => {
                        let _ = self.send("quit").await;
                        self.status.send_replace(EngineStatus::Terminated);
                        break;
                    }
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Err(e) = self.handle_line(&line).await {
                            self.fail(e);
                            break;
                        }
                    }
                    Ok(None) => {
                        self.fail("engine closed its output".to_string());
                        break;
                    }
                    Err(e) => {
                        self.fail(format!("failed to read from engine: {e}"));
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
    }

    async fn handshake(&mut self) -> Result<(), String> {
        for cmd in HANDSHAKE {
            self.send(cmd).await?;
        }
        Ok(())
    }

    async fn submit(&mut self, fen: String) -> Result<(), String> {
        if !self.ready {
            debug!(fen = %fen, "Engine not ready; keeping latest position");
            self.pending = Some(fen);
            return Ok(());
        }
        self.start_search(&fen).await
    }

    async fn start_search(&mut self, fen: &str) -> Result<(), String> {
        self.snapshots.send_replace(None);
        self.send("stop").await?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&SEARCH_LIMITS.go_command()).await?;
        self.searches.started();
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<(), String> {
        match parse_line(line) {
            Some(EngineMessage::ReadyOk) => {
                if !self.ready {
                    self.ready = true;
                    self.status.send_replace(EngineStatus::Ready);
                    info!("Engine ready");
                    if let Some(fen) = self.pending.take() {
                        self.start_search(&fen).await?;
                    }
                }
            }
            Some(EngineMessage::Info(info)) => self.apply_info(&info),
            Some(EngineMessage::BestMove(best)) => self.apply_best_move(best),
            None => {}
        }
        Ok(())
    }

    fn apply_info(&self, info: &InfoLine) {
        if self.searches.accepts_info() {
            self.snapshots
                .send_replace(Some(EvalSnapshot::from_info(info)));
        }
    }

    fn apply_best_move(&mut self, best: Option<SuggestedMove>) {
        if !self.searches.finished() {
            debug!("Dropped result of a superseded search");
            return;
        }
        self.snapshots.send_modify(|snapshot| {
            snapshot
                .get_or_insert_with(EvalSnapshot::default)
                .complete_with(best);
        });
    }

    /// Send a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), String> {
        debug!(cmd, "SF <");
        self.writer
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| format!("failed to write to engine: {e}"))?;
        self.writer
            .flush()
            .await
            .map_err(|e| format!("failed to flush engine stdin: {e}"))
    }

    fn fail(&self, reason: String) {
        error!(reason = %reason, "Engine unavailable for this session");
        self.status.send_replace(EngineStatus::Unavailable(reason));
    }

    async fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}
