//! The persistent streaming connection: handshake state machine, receive
//! loop, and live-transcription state.

use crate::codec::{self, FrameEvent};
use crate::error::ChannelError;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{debug, info, warn};

/// Where the connection currently is in its lifecycle. One instance per
/// connection: created on `connect`, dead at `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Connecting,
    ProbeSent,
    Confirmed,
    Streaming,
    Closed,
}

/// The in-flight transcription as last reported by the backend. Read by
/// presentation, mutated only by decoded frames.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveTranscript {
    pub is_transcribing: bool,
    pub text: String,
}

/// Raised by the reader task toward the owning loop.
#[derive(Debug)]
pub enum StreamSignal {
    /// One raw text frame, not yet decoded.
    Frame(String),
    /// The transport failed or the server closed. No reconnect follows.
    Closed,
}

const LISTENING_PLACEHOLDER: &str = "Listening...";

/// Client side of the streaming channel.
///
/// All state mutation happens on the owning task: the spawned reader only
/// forwards raw frames through the channel returned by [`Self::connect`],
/// and the owner feeds each signal back in via [`Self::handle_signal`].
/// Outbound frames go through a writer task and are fire-and-forget.
pub struct StreamingClient {
    phase: HandshakePhase,
    live: LiveTranscript,
    out_tx: Option<mpsc::UnboundedSender<String>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl StreamingClient {
    pub fn new() -> Self {
        Self {
            phase: HandshakePhase::Closed,
            live: LiveTranscript::default(),
            out_tx: None,
            reader: None,
            writer: None,
        }
    }

    /// Opens the socket and starts the handshake by sending the probe.
    ///
    /// Returns the signal channel the owning loop must drain. The reader
    /// re-arms itself for the next frame as long as the transport is open
    /// and stops on the first receive failure, signalling `Closed` once.
    pub async fn connect(
        &mut self,
        url: &str,
    ) -> Result<mpsc::UnboundedReceiver<StreamSignal>, ChannelError> {
        self.phase = HandshakePhase::Connecting;
        let (socket, _) = match connect_async(url).await {
            Ok(connected) => connected,
            Err(e) => {
                self.phase = HandshakePhase::Closed;
                return Err(e.into());
            }
        };
        info!(%url, "streaming channel connected");

        let (mut sink, mut stream) = socket.split();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        // A send failure is reported and otherwise ignored; the reader is
        // the one that settles the connection's fate.
        self.writer = Some(tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = sink.send(WsMessage::text(frame)).await {
                    warn!(error = %e, "streaming send failed");
                }
            }
        }));

        self.reader = Some(tokio::spawn(async move {
            while let Some(next) = stream.next().await {
                match next {
                    Ok(WsMessage::Text(text)) => {
                        if signal_tx.send(StreamSignal::Frame(text.to_string())).is_err() {
                            // Owner is gone; nothing left to report to.
                            return;
                        }
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "streaming receive failed");
                        break;
                    }
                }
            }
            let _ = signal_tx.send(StreamSignal::Closed);
        }));

        self.begin_handshake(out_tx);
        Ok(signal_rx)
    }

    fn begin_handshake(&mut self, out_tx: mpsc::UnboundedSender<String>) {
        self.out_tx = Some(out_tx);
        self.send(codec::PROBE);
        self.phase = HandshakePhase::ProbeSent;
    }

    /// Feeds one signal from the reader back into the state machine.
    pub fn handle_signal(&mut self, signal: StreamSignal) {
        match signal {
            StreamSignal::Frame(frame) => self.handle_frame(&frame),
            StreamSignal::Closed => self.mark_closed(),
        }
    }

    fn handle_frame(&mut self, frame: &str) {
        match codec::decode(frame) {
            FrameEvent::ProbeConfirm => {
                if self.phase == HandshakePhase::ProbeSent {
                    self.send(codec::PROBE_ACK);
                    self.phase = HandshakePhase::Confirmed;
                } else {
                    warn!(phase = ?self.phase, "probe confirmation outside handshake");
                }
            }
            FrameEvent::StartTranscribing => match self.phase {
                HandshakePhase::Confirmed | HandshakePhase::Streaming => {
                    self.live.is_transcribing = true;
                    self.live.text = LISTENING_PLACEHOLDER.to_string();
                    self.phase = HandshakePhase::Streaming;
                }
                phase => warn!(?phase, "transcription start before handshake completed"),
            },
            FrameEvent::PartialTranscript(text) => {
                if self.phase == HandshakePhase::Streaming {
                    // Each update replaces the previous partial outright.
                    self.live.text = text;
                } else {
                    warn!(phase = ?self.phase, "partial transcript outside streaming phase");
                }
            }
            FrameEvent::Unrecognized => debug!(frame, "ignoring unrecognized frame"),
        }
    }

    fn send(&self, frame: &str) {
        if let Some(tx) = &self.out_tx {
            if tx.send(frame.to_string()).is_err() {
                warn!(frame, "streaming writer is gone; frame dropped");
            }
        }
    }

    fn mark_closed(&mut self) {
        self.phase = HandshakePhase::Closed;
        self.live = LiveTranscript::default();
        self.out_tx = None;
    }

    /// Tears the connection down. Idempotent; safe to call in any phase.
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        if let Some(handle) = self.writer.take() {
            handle.abort();
        }
        self.mark_closed();
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn live_transcript(&self) -> &LiveTranscript {
        &self.live
    }
}

impl Default for StreamingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshaken_client() -> (StreamingClient, mpsc::UnboundedReceiver<String>) {
        let mut client = StreamingClient::new();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        client.begin_handshake(out_tx);
        (client, out_rx)
    }

    #[test]
    fn probe_confirmation_completes_the_handshake() {
        let (mut client, mut sent) = handshaken_client();
        assert_eq!(client.phase(), HandshakePhase::ProbeSent);
        assert_eq!(sent.try_recv().unwrap(), codec::PROBE);

        client.handle_signal(StreamSignal::Frame("3probe".to_string()));
        assert_eq!(client.phase(), HandshakePhase::Confirmed);
        assert_eq!(sent.try_recv().unwrap(), codec::PROBE_ACK);
        assert!(sent.try_recv().is_err());
    }

    #[test]
    fn duplicate_probe_confirmation_is_swallowed() {
        let (mut client, mut sent) = handshaken_client();
        client.handle_signal(StreamSignal::Frame("3probe".to_string()));
        client.handle_signal(StreamSignal::Frame("3probe".to_string()));

        assert_eq!(client.phase(), HandshakePhase::Confirmed);
        let acks: Vec<String> = std::iter::from_fn(|| sent.try_recv().ok()).collect();
        assert_eq!(acks, vec![codec::PROBE.to_string(), codec::PROBE_ACK.to_string()]);
    }

    #[test]
    fn transcription_frames_drive_the_live_transcript() {
        let (mut client, _sent) = handshaken_client();
        client.handle_signal(StreamSignal::Frame("3probe".to_string()));

        client.handle_signal(StreamSignal::Frame(
            r#"42["start_transcribing",{}]"#.to_string(),
        ));
        assert_eq!(client.phase(), HandshakePhase::Streaming);
        assert!(client.live_transcript().is_transcribing);
        assert_eq!(client.live_transcript().text, "Listening...");

        client.handle_signal(StreamSignal::Frame(
            r#"42["partial_transcript","{\"text\": \"turn on the\"}"]"#.to_string(),
        ));
        assert_eq!(client.live_transcript().text, "turn on the");

        client.handle_signal(StreamSignal::Frame(
            r#"42["partial_transcript","{\"text\": \"turn on the lights\"}"]"#.to_string(),
        ));
        // Replacement, not append.
        assert_eq!(client.live_transcript().text, "turn on the lights");
    }

    #[test]
    fn partial_transcript_before_start_is_ignored() {
        let (mut client, _sent) = handshaken_client();
        client.handle_signal(StreamSignal::Frame("3probe".to_string()));

        client.handle_signal(StreamSignal::Frame(
            r#"42["partial_transcript","{\"text\": \"early\"}"]"#.to_string(),
        ));
        assert!(!client.live_transcript().is_transcribing);
        assert_eq!(client.live_transcript().text, "");
    }

    #[test]
    fn close_resets_phase_and_transcript() {
        let (mut client, _sent) = handshaken_client();
        client.handle_signal(StreamSignal::Frame("3probe".to_string()));
        client.handle_signal(StreamSignal::Frame(
            r#"42["start_transcribing",{}]"#.to_string(),
        ));

        client.handle_signal(StreamSignal::Closed);
        assert_eq!(client.phase(), HandshakePhase::Closed);
        assert_eq!(client.live_transcript(), &LiveTranscript::default());
    }

    #[test]
    fn garbage_frames_leave_the_state_machine_untouched() {
        let (mut client, _sent) = handshaken_client();
        client.handle_signal(StreamSignal::Frame("3probe".to_string()));

        for frame in ["", "0{\"sid\":\"abc\"}", "40", "not a frame"] {
            client.handle_signal(StreamSignal::Frame(frame.to_string()));
        }
        assert_eq!(client.phase(), HandshakePhase::Confirmed);
    }

    #[tokio::test]
    async fn handshake_emits_probe_then_ack_in_order() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let first = socket.next().await.unwrap().unwrap();
            assert_eq!(first.to_text().unwrap(), codec::PROBE);
            socket.send(WsMessage::text(codec::PROBE_CONFIRM)).await.unwrap();

            let second = socket.next().await.unwrap().unwrap();
            assert_eq!(second.to_text().unwrap(), codec::PROBE_ACK);
            socket.close(None).await.unwrap();
        });

        let mut client = StreamingClient::new();
        let mut signals = client.connect(&format!("ws://{addr}")).await.unwrap();
        while let Some(signal) = signals.recv().await {
            client.handle_signal(signal);
        }

        // Server-side asserts verified the order; the client ends closed.
        server.await.unwrap();
        assert_eq!(client.phase(), HandshakePhase::Closed);
    }

    #[tokio::test]
    async fn server_drop_without_close_frame_signals_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let _probe = socket.next().await.unwrap().unwrap();
            drop(socket);
        });

        let mut client = StreamingClient::new();
        let mut signals = client.connect(&format!("ws://{addr}")).await.unwrap();
        while let Some(signal) = signals.recv().await {
            client.handle_signal(signal);
        }

        server.await.unwrap();
        assert_eq!(client.phase(), HandshakePhase::Closed);
        assert_eq!(client.live_transcript(), &LiveTranscript::default());
    }

    #[tokio::test]
    async fn connect_failure_reports_transport_error() {
        let mut client = StreamingClient::new();
        let result = client.connect("ws://127.0.0.1:9/").await;
        assert!(matches!(result, Err(ChannelError::Transport(_))));
        assert_eq!(client.phase(), HandshakePhase::Closed);
    }
}
