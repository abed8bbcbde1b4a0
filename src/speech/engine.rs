//! The platform speech-synthesis capability surface.
//!
//! The engine is process-wide singleton state: one utterance can be active
//! across the whole application. [`crate::speech::SpeechDriver`] owns its
//! engine exclusively and always cancels before speaking, so a new session
//! silences whatever was playing before.

use anyhow::Result;

/// One platform voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub id: String,
    pub name: String,
    /// BCP 47 language tag, e.g. "en-US".
    pub language: String,
}

/// A single utterance request with its delivery configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Playback speed multiplier.
    pub rate: f32,
    pub pitch: f32,
    /// 0.0 to 1.0.
    pub volume: f32,
    /// Voice id; `None` lets the platform pick.
    pub voice: Option<String>,
}

/// Lifecycle and boundary callbacks surfaced by the platform, dispatched into
/// the driver by the host glue.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started,
    Finished,
    Paused,
    Resumed,
    /// A word of the current utterance is being spoken. The offset is within
    /// the utterance's own text and only approximate: anywhere from the exact
    /// word start to a few characters off.
    WordBoundary { word: String, char_offset: usize },
    Failed { message: String },
}

/// Imperative controls over the platform engine. Implementations wrap one
/// concrete speech API; the crate ships a scripted in-memory one in
/// [`crate::speech::mock`].
pub trait SpeechEngine {
    /// Whether synthesis is available at all. Checked once per session; a
    /// `false` here disables speech controls rather than raising errors.
    fn is_supported(&self) -> bool {
        true
    }

    /// Currently known voices. May be empty early on; implementations that
    /// load voices asynchronously should prompt a re-query through the
    /// session's voices-changed notification.
    fn voices(&self) -> Vec<Voice>;

    fn speak(&mut self, utterance: Utterance) -> Result<()>;

    /// Cancel the active utterance and anything queued, synchronously.
    fn cancel(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);
}

/// Pick the default voice: the first whose language tag starts with "en-",
/// else the platform's first voice.
pub fn default_voice(voices: &[Voice]) -> Option<&Voice> {
    voices
        .iter()
        .find(|voice| voice.language.starts_with("en-"))
        .or_else(|| voices.first())
}
