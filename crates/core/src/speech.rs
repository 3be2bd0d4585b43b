//! Playback gating in front of the text-to-speech capability.

use crate::reconcile::ReconcileResult;
use std::sync::Arc;

/// The opaque text-to-speech capability.
///
/// Implementations must cancel any in-flight utterance when `speak` is
/// called again; callers never queue.
#[cfg_attr(test, mockall::automock)]
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str);
    fn stop(&self);
    fn is_speaking(&self) -> bool;
}

/// Thin policy object deciding whether reconciler output reaches the voice.
pub struct SpeechTrigger {
    voice: Arc<dyn SpeechSynthesizer>,
}

impl SpeechTrigger {
    pub fn new(voice: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { voice }
    }

    /// Voices the reply when the merge produced one. A fresh reply
    /// supersedes an in-flight utterance, so the current speaking state is
    /// deliberately not consulted.
    pub fn maybe_speak(&self, result: &ReconcileResult) {
        if let ReconcileResult::Speak(text) = result {
            self.voice.speak(text);
        }
    }

    /// Routes a manual stop request straight to the capability. The
    /// reconciler never observes this.
    pub fn interrupt(&self) {
        self.voice.stop();
    }

    pub fn is_speaking(&self) -> bool {
        self.voice.is_speaking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speak_signal_reaches_the_voice_once() {
        let mut voice = MockSpeechSynthesizer::new();
        voice
            .expect_speak()
            .withf(|text| text == "hello")
            .times(1)
            .return_const(());

        let trigger = SpeechTrigger::new(Arc::new(voice));
        trigger.maybe_speak(&ReconcileResult::Speak("hello".to_string()));
    }

    #[test]
    fn silent_result_never_touches_the_voice() {
        let mut voice = MockSpeechSynthesizer::new();
        voice.expect_speak().times(0);

        let trigger = SpeechTrigger::new(Arc::new(voice));
        trigger.maybe_speak(&ReconcileResult::Silent);
    }

    #[test]
    fn in_flight_playback_is_superseded_not_skipped() {
        let mut voice = MockSpeechSynthesizer::new();
        voice.expect_is_speaking().return_const(true);
        voice
            .expect_speak()
            .withf(|text| text == "newer reply")
            .times(1)
            .return_const(());

        let trigger = SpeechTrigger::new(Arc::new(voice));
        assert!(trigger.is_speaking());
        trigger.maybe_speak(&ReconcileResult::Speak("newer reply".to_string()));
    }

    #[test]
    fn interrupt_routes_to_stop() {
        let mut voice = MockSpeechSynthesizer::new();
        voice.expect_stop().times(1).return_const(());

        let trigger = SpeechTrigger::new(Arc::new(voice));
        trigger.interrupt();
    }
}
