//! Wire framing for the streaming channel.
//!
//! The backend speaks a socket.io-flavoured framing: a fixed probe/ack token
//! exchange up front, then plain text frames carrying event markers with the
//! payload embedded as an escaped, quoted JSON fragment. This module keeps
//! the rest of the crate away from that encoding.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// Initial probe sent by the client as soon as the socket opens.
pub const PROBE: &str = "2probe";
/// The server's confirmation of the probe, matched exactly.
pub const PROBE_CONFIRM: &str = "3probe";
/// Acknowledgement sent after the confirmation, completing the handshake.
pub const PROBE_ACK: &str = "5";

const START_MARKER: &str = "start_transcribing";
const PARTIAL_MARKER: &str = "partial_transcript";

/// One structured event decoded from a raw frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// The server confirmed our probe; the handshake can complete.
    ProbeConfirm,
    /// The backend started transcribing microphone input.
    StartTranscribing,
    /// A replacement (not incremental) live-transcript update.
    PartialTranscript(String),
    /// Anything else. Discarded without effect.
    Unrecognized,
}

/// Decodes a raw text frame. Never fails: frames that match nothing, or
/// whose payload is unrecoverable, come back as [`FrameEvent::Unrecognized`].
pub fn decode(frame: &str) -> FrameEvent {
    if frame == PROBE_CONFIRM {
        return FrameEvent::ProbeConfirm;
    }
    if frame.contains(START_MARKER) {
        return FrameEvent::StartTranscribing;
    }
    if frame.contains(PARTIAL_MARKER) {
        return match extract_transcript_text(frame) {
            Some(text) => FrameEvent::PartialTranscript(text),
            None => FrameEvent::Unrecognized,
        };
    }
    FrameEvent::Unrecognized
}

// Minimal `{"text": ...}`-shaped span, quotes possibly backslash-escaped.
static TRANSCRIPT_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\\?"text\\?":.*?\}"#).expect("transcript span pattern"));

#[derive(Deserialize)]
struct TranscriptPayload {
    text: String,
}

/// Best-effort recovery of the transcript text from a `partial_transcript`
/// frame.
///
/// The server embeds the payload as a backslash-escaped JSON fragment inside
/// the frame rather than clean JSON, so this scans for the smallest
/// `{"text": ...}` span, strips the escaping and any surrounding quotes, and
/// only then attempts a structured decode. A payload that is still malformed
/// after that yields `None`; the connection is never failed over one bad
/// frame. Compatibility shim: do not generalize this into the main decode
/// path.
pub fn extract_transcript_text(frame: &str) -> Option<String> {
    let span = TRANSCRIPT_SPAN.find(frame)?.as_str();
    let unescaped = span.replace('\\', "");
    let trimmed = unescaped.trim_matches('"');
    serde_json::from_str::<TranscriptPayload>(trimmed)
        .ok()
        .map(|payload| payload.text)
}
