//! The owning event loop: every piece of conversation state is mutated here
//! and nowhere else.
//!
//! Two independently timed sources feed this loop: the poll timer and the
//! streaming reader. Both marshal their results through channels into this
//! single task, which is what lets the rest of the crate hold state without
//! locks. The two sources are not ordered relative to each other; a poll
//! merge and a stream frame landing in the same interval can apply in
//! either order.

use crate::error::ChannelError;
use crate::models::Message;
use crate::poller::SnapshotPoller;
use crate::reconcile::ConversationReconciler;
use crate::speech::{SpeechSynthesizer, SpeechTrigger};
use crate::streaming::{LiveTranscript, StreamSignal, StreamingClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Requests from presentation into the engine.
#[derive(Debug)]
pub enum Command {
    /// Forward a user-authored message to the backend.
    SendMessage(String),
    /// Cut playback off immediately.
    StopSpeaking,
    /// Tear everything down and exit the loop.
    Shutdown,
}

/// State pushed from the engine toward presentation.
#[derive(Debug, Clone)]
pub enum Update {
    /// The authoritative conversation after a merge.
    Conversation(Vec<Message>),
    /// The live transcription view changed.
    LiveTranscript(LiveTranscript),
    /// The streaming channel died; live transcription is over for good.
    StreamClosed,
}

/// The synchronization engine. Construct with [`Engine::new`], then hand
/// the returned future to a task via [`Engine::run`].
pub struct Engine {
    poller: SnapshotPoller,
    reconciler: ConversationReconciler,
    streaming: StreamingClient,
    trigger: SpeechTrigger,
    poll_interval: Duration,
    stream_url: Option<String>,
    commands: mpsc::Receiver<Command>,
    updates: mpsc::Sender<Update>,
}

impl Engine {
    /// Wires up an engine. `stream_url: None` runs with polling only.
    pub fn new(
        poller: SnapshotPoller,
        voice: Arc<dyn SpeechSynthesizer>,
        stream_url: Option<String>,
        poll_interval: Duration,
    ) -> (Self, mpsc::Sender<Command>, mpsc::Receiver<Update>) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (update_tx, update_rx) = mpsc::channel(64);
        let engine = Self {
            poller,
            reconciler: ConversationReconciler::new(),
            streaming: StreamingClient::new(),
            trigger: SpeechTrigger::new(voice),
            poll_interval,
            stream_url,
            commands: command_rx,
            updates: update_tx,
        };
        (engine, command_tx, update_rx)
    }

    /// Runs until `Shutdown` arrives or the command channel is dropped.
    pub async fn run(mut self) {
        let mut stream_signals = match self.stream_url.take() {
            Some(url) => match self.streaming.connect(&url).await {
                Ok(rx) => Some(rx),
                Err(e) => {
                    warn!(error = %e, "streaming channel unavailable; continuing with polling only");
                    None
                }
            },
            None => None,
        };

        let (snapshot_tx, mut snapshots) =
            mpsc::channel::<Result<Vec<Message>, ChannelError>>(4);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Each fetch runs as its own task so a slow response
                    // never stalls the loop. In-flight polls are not
                    // cancelled; results apply in arrival order, stale or
                    // not.
                    let poller = self.poller.clone();
                    let tx = snapshot_tx.clone();
                    tokio::spawn(async move {
                        let _ = tx.send(poller.poll().await).await;
                    });
                }
                Some(outcome) = snapshots.recv() => match outcome {
                    Ok(snapshot) => self.apply_snapshot(snapshot).await,
                    // The next scheduled poll is the retry.
                    Err(e) => warn!(error = %e, "poll skipped"),
                },
                signal = recv_signal(&mut stream_signals) => match signal {
                    Some(signal) => {
                        let closing = matches!(signal, StreamSignal::Closed);
                        let before = self.streaming.live_transcript().clone();
                        self.streaming.handle_signal(signal);
                        if *self.streaming.live_transcript() != before {
                            let update = Update::LiveTranscript(
                                self.streaming.live_transcript().clone(),
                            );
                            let _ = self.updates.send(update).await;
                        }
                        if closing {
                            stream_signals = None;
                            let _ = self.updates.send(Update::StreamClosed).await;
                        }
                    }
                    None => stream_signals = None,
                },
                command = self.commands.recv() => match command {
                    Some(Command::SendMessage(text)) => self.poller.send_user_message(text),
                    Some(Command::StopSpeaking) => self.trigger.interrupt(),
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        self.streaming.disconnect();
        info!("engine stopped");
    }

    async fn apply_snapshot(&mut self, snapshot: Vec<Message>) {
        let result = self.reconciler.merge(snapshot);
        self.trigger.maybe_speak(&result);
        let conversation = self.reconciler.messages().to_vec();
        let _ = self.updates.send(Update::Conversation(conversation)).await;
    }
}

async fn recv_signal(
    rx: &mut Option<mpsc::UnboundedReceiver<StreamSignal>>,
) -> Option<StreamSignal> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
