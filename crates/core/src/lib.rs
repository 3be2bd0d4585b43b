//! parley-core: client-side synchronization between a local conversation
//! view and a remote agent process.
//!
//! Two independently timed channels feed the same state: a periodic
//! full-snapshot poll over HTTP and a handshake-based WebSocket stream of
//! live transcription events. The [`engine`] module owns the single loop
//! that reconciles them and drives spoken playback of new agent replies
//! exactly once per reply; everything else is a leaf it drives.

pub mod codec;
pub mod engine;
pub mod error;
pub mod models;
pub mod poller;
pub mod reconcile;
pub mod speech;
pub mod streaming;

pub use engine::{Command, Engine, Update};
pub use error::ChannelError;
pub use models::{ConversationResponse, Message, Role};
pub use poller::SnapshotPoller;
pub use reconcile::{ConversationReconciler, ReconcileResult};
pub use speech::{SpeechSynthesizer, SpeechTrigger};
pub use streaming::{HandshakePhase, LiveTranscript, StreamSignal, StreamingClient};
