//! Speech synthesis backed by a system text-to-speech command.

use parley_core::SpeechSynthesizer;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Speaks by spawning one TTS process per utterance (`say` on macOS,
/// `espeak` and friends elsewhere).
///
/// A new utterance kills whatever is still playing before starting, which
/// is the cancel-and-restart contract the engine relies on.
pub struct ProcessSpeaker {
    program: String,
    current: Mutex<Option<Child>>,
}

impl ProcessSpeaker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            current: Mutex::new(None),
        }
    }
}

impl SpeechSynthesizer for ProcessSpeaker {
    fn speak(&self, text: &str) {
        let mut current = self.current.lock().unwrap();
        if let Some(mut child) = current.take() {
            let _ = child.start_kill();
        }
        let spawned = Command::new(&self.program)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        match spawned {
            Ok(child) => *current = Some(child),
            Err(e) => warn!(program = %self.program, error = %e, "failed to start speech process"),
        }
    }

    fn stop(&self) {
        if let Some(mut child) = self.current.lock().unwrap().take() {
            let _ = child.start_kill();
        }
    }

    fn is_speaking(&self) -> bool {
        let mut current = self.current.lock().unwrap();
        match current.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                _ => {
                    *current = None;
                    false
                }
            },
            None => false,
        }
    }
}

/// Stands in when no speech command is configured; replies stay on screen.
pub struct MutedSpeaker;

impl SpeechSynthesizer for MutedSpeaker {
    fn speak(&self, text: &str) {
        debug!(chars = text.len(), "speech muted; dropping utterance");
    }

    fn stop(&self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}
