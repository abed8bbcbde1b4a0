//! The speech driver: owns the platform engine session, queues chunk
//! utterances sequentially, and translates per-chunk boundary callbacks into
//! full-text coordinates.
//!
//! State machine: `Idle → Speaking ⇄ Paused`, with stop/end/error returning
//! to `Idle` from anywhere. The driver's state follows the commands it is
//! given, never the engine's pause/resume echoes, which is what keeps the
//! keep-alive cycle invisible.

pub mod engine;
pub mod mock;

use crate::chunker::{self, Chunk};
use engine::{EngineEvent, SpeechEngine, Utterance};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Interval between keep-alive pause/resume cycles while speaking. Some
/// platform engines silently stop a few seconds into a long utterance unless
/// nudged.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// A boundary event translated into the full-text coordinate space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenWord {
    pub word: String,
    /// Approximate char offset of the word within the full text.
    pub char_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Speaking,
    Paused,
}

/// Outputs surfaced to the session per command or engine event.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Started,
    Finished,
    Word(SpokenWord),
    /// `speak` was called with nothing to say; no state changed.
    NoText,
    /// The platform reported an utterance error; all pending chunks were
    /// cancelled and the driver is back to `Idle`.
    PlaybackError { message: String },
}

/// Delivery configuration applied identically to every chunk of a `speak`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParams {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<String>,
}

pub struct SpeechDriver {
    engine: Box<dyn SpeechEngine>,
    state: DriverState,
    params: SpeechParams,
    max_chunk_chars: usize,
    keep_alive_interval: Duration,
    chunks: Vec<Chunk>,
    current_chunk: usize,
    last_word: Option<SpokenWord>,
    last_keep_alive: Option<Instant>,
}

impl SpeechDriver {
    pub fn new(
        engine: Box<dyn SpeechEngine>,
        params: SpeechParams,
        max_chunk_chars: usize,
        keep_alive_interval: Duration,
    ) -> Self {
        Self {
            engine,
            state: DriverState::Idle,
            params,
            max_chunk_chars,
            keep_alive_interval,
            chunks: Vec::new(),
            current_chunk: 0,
            last_word: None,
            last_keep_alive: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_speaking(&self) -> bool {
        self.state == DriverState::Speaking
    }

    pub fn is_paused(&self) -> bool {
        self.state == DriverState::Paused
    }

    pub fn current_chunk(&self) -> usize {
        self.current_chunk
    }

    pub fn last_word(&self) -> Option<&SpokenWord> {
        self.last_word.as_ref()
    }

    pub fn params(&self) -> &SpeechParams {
        &self.params
    }

    pub fn set_params(&mut self, params: SpeechParams) {
        self.params = params;
    }

    pub fn is_supported(&self) -> bool {
        self.engine.is_supported()
    }

    pub fn voices(&self) -> Vec<engine::Voice> {
        self.engine.voices()
    }

    /// Cancel anything in flight, chunk `text`, and start speaking chunk 0.
    ///
    /// The engine is shared process-wide, so the leading cancel also silences
    /// utterances started by other sessions.
    pub fn speak(&mut self, text: &str, now: Instant) -> Vec<DriverEvent> {
        self.engine.cancel();
        self.chunks.clear();
        self.current_chunk = 0;
        self.last_word = None;

        if text.trim().is_empty() {
            warn!("No text available to speak");
            self.state = DriverState::Idle;
            self.last_keep_alive = None;
            return vec![DriverEvent::NoText];
        }

        self.chunks = chunker::chunk_text(text, self.max_chunk_chars);
        self.state = DriverState::Speaking;
        self.last_keep_alive = Some(now);
        info!(
            chunks = self.chunks.len(),
            chars = text.chars().count(),
            "Starting speech"
        );
        if let Err(err) = self.speak_current_chunk() {
            return self.fail(format!("{err:#}"));
        }
        Vec::new()
    }

    /// Valid from `Speaking`; a no-op otherwise.
    pub fn pause(&mut self) {
        if self.state != DriverState::Speaking {
            debug!(state = ?self.state, "Ignoring pause outside Speaking");
            return;
        }
        self.engine.pause();
        self.state = DriverState::Paused;
        info!("Paused speech");
    }

    /// Valid from `Paused`; a no-op otherwise.
    pub fn resume(&mut self, now: Instant) {
        if self.state != DriverState::Paused {
            debug!(state = ?self.state, "Ignoring resume outside Paused");
            return;
        }
        self.engine.resume();
        self.state = DriverState::Speaking;
        self.last_keep_alive = Some(now);
        info!("Resumed speech");
    }

    /// Universal cancellation: safe from any state, leaves nothing dangling.
    pub fn stop(&mut self) {
        self.engine.cancel();
        self.state = DriverState::Idle;
        self.chunks.clear();
        self.current_chunk = 0;
        self.last_word = None;
        self.last_keep_alive = None;
        info!("Stopped speech");
    }

    /// Dispatch a platform callback into the state machine.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Vec<DriverEvent> {
        match event {
            EngineEvent::Started => {
                if self.state == DriverState::Speaking && self.current_chunk == 0 {
                    vec![DriverEvent::Started]
                } else {
                    // Chunk continuations start silently; the listener hears
                    // one uninterrupted reading.
                    Vec::new()
                }
            }
            EngineEvent::WordBoundary { word, char_offset } => {
                if self.state == DriverState::Idle {
                    return Vec::new();
                }
                let Some(chunk) = self.chunks.get(self.current_chunk) else {
                    return Vec::new();
                };
                let spoken = SpokenWord {
                    word,
                    char_offset: chunk.start_offset + char_offset,
                };
                self.last_word = Some(spoken.clone());
                vec![DriverEvent::Word(spoken)]
            }
            EngineEvent::Finished => self.advance_chunk(),
            EngineEvent::Paused | EngineEvent::Resumed => {
                // Keep-alive cycles echo back as pause/resume; driver state
                // only ever follows explicit commands.
                debug!(state = ?self.state, "Engine pause/resume echo");
                Vec::new()
            }
            EngineEvent::Failed { message } => {
                if self.state == DriverState::Idle {
                    return Vec::new();
                }
                self.fail(message)
            }
        }
    }

    /// Keep-alive: while speaking, cycle the engine through pause/resume
    /// every interval to defeat auto-stop on long utterances. Self-cancels
    /// whenever the state machine leaves `Speaking`.
    pub fn tick(&mut self, now: Instant) {
        if self.state != DriverState::Speaking {
            self.last_keep_alive = None;
            return;
        }
        let due = self
            .last_keep_alive
            .map(|at| now.saturating_duration_since(at) >= self.keep_alive_interval)
            .unwrap_or(true);
        if due {
            self.engine.pause();
            self.engine.resume();
            self.last_keep_alive = Some(now);
            debug!("Issued keep-alive pause/resume cycle");
        }
    }

    fn advance_chunk(&mut self) -> Vec<DriverEvent> {
        if self.state == DriverState::Idle {
            // A cancel was already issued; late completion events are noise.
            return Vec::new();
        }
        if self.current_chunk + 1 < self.chunks.len() {
            self.current_chunk += 1;
            debug!(chunk = self.current_chunk, "Advancing to next chunk");
            if let Err(err) = self.speak_current_chunk() {
                return self.fail(format!("{err:#}"));
            }
            return Vec::new();
        }
        self.state = DriverState::Idle;
        self.chunks.clear();
        self.current_chunk = 0;
        self.last_word = None;
        self.last_keep_alive = None;
        info!("Finished speaking");
        vec![DriverEvent::Finished]
    }

    fn speak_current_chunk(&mut self) -> anyhow::Result<()> {
        let chunk = &self.chunks[self.current_chunk];
        debug!(
            chunk = self.current_chunk,
            start_offset = chunk.start_offset,
            chars = chunk.text.chars().count(),
            "Submitting chunk utterance"
        );
        self.engine.speak(Utterance {
            text: chunk.text.clone(),
            rate: self.params.rate,
            pitch: self.params.pitch,
            volume: self.params.volume,
            voice: self.params.voice.clone(),
        })
    }

    fn fail(&mut self, message: String) -> Vec<DriverEvent> {
        warn!(%message, "Speech engine error; cancelling pending chunks");
        self.engine.cancel();
        self.state = DriverState::Idle;
        self.chunks.clear();
        self.current_chunk = 0;
        self.last_word = None;
        self.last_keep_alive = None;
        vec![DriverEvent::PlaybackError { message }]
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{EngineCommand, MockEngine, MockHandle};
    use super::*;

    fn params() -> SpeechParams {
        SpeechParams {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: Some("mock-en".to_string()),
        }
    }

    fn driver_with(max_chunk_chars: usize) -> (SpeechDriver, MockHandle) {
        let (engine, handle) = MockEngine::new();
        let driver = SpeechDriver::new(
            Box::new(engine),
            params(),
            max_chunk_chars,
            KEEP_ALIVE_INTERVAL,
        );
        (driver, handle)
    }

    #[test]
    fn speak_cancels_then_submits_first_chunk() {
        let (mut driver, handle) = driver_with(100);
        let events = driver.speak("Hello world. This is a test.", Instant::now());
        assert!(events.is_empty());
        assert_eq!(driver.state(), DriverState::Speaking);
        assert_eq!(
            handle.commands()[0],
            EngineCommand::Cancel,
            "shared engine must be silenced before a new utterance"
        );
        assert_eq!(
            handle.spoken_texts(),
            vec!["Hello world. This is a test.".to_string()]
        );
    }

    #[test]
    fn empty_text_is_a_warning_not_a_state_change() {
        let (mut driver, handle) = driver_with(100);
        let events = driver.speak("   ", Instant::now());
        assert_eq!(events, vec![DriverEvent::NoText]);
        assert_eq!(driver.state(), DriverState::Idle);
        assert!(handle.spoken_texts().is_empty());
    }

    #[test]
    fn chunks_advance_seamlessly_with_same_params() {
        let (mut driver, handle) = driver_with(25);
        let now = Instant::now();
        driver.speak("First sentence here. Second sentence here. Third one.", now);
        assert_eq!(handle.spoken_texts().len(), 1);

        let events = driver.handle_engine_event(EngineEvent::Finished);
        assert!(events.is_empty(), "intermediate chunk end is silent");
        assert_eq!(driver.current_chunk(), 1);
        let utterances: Vec<_> = handle
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                EngineCommand::Speak(u) => Some(u),
                _ => None,
            })
            .collect();
        assert_eq!(utterances.len(), 2);
        assert_eq!(utterances[0].rate, utterances[1].rate);
        assert_eq!(utterances[0].voice, utterances[1].voice);
    }

    #[test]
    fn final_chunk_completion_goes_idle() {
        let (mut driver, _handle) = driver_with(100);
        let now = Instant::now();
        driver.speak("Only one chunk.", now);
        let events = driver.handle_engine_event(EngineEvent::Finished);
        assert_eq!(events, vec![DriverEvent::Finished]);
        assert_eq!(driver.state(), DriverState::Idle);
        assert!(driver.last_word().is_none());
    }

    #[test]
    fn word_boundaries_translate_into_global_offsets() {
        let (mut driver, _handle) = driver_with(25);
        let now = Instant::now();
        driver.speak("First sentence here. Second sentence here.", now);
        driver.handle_engine_event(EngineEvent::Finished);
        assert_eq!(driver.current_chunk(), 1);

        let events = driver.handle_engine_event(
            EngineEvent::WordBoundary {
                word: "Second".to_string(),
                char_offset: 0,
            },
        );
        assert_eq!(
            events,
            vec![DriverEvent::Word(SpokenWord {
                word: "Second".to_string(),
                char_offset: 21,
            })]
        );
    }

    #[test]
    fn pause_and_resume_only_apply_from_matching_states() {
        let (mut driver, handle) = driver_with(100);
        let now = Instant::now();

        driver.pause();
        driver.resume(now);
        assert_eq!(driver.state(), DriverState::Idle);
        assert!(handle.commands().is_empty(), "no-ops must not reach the engine");

        driver.speak("Some text.", now);
        driver.pause();
        assert_eq!(driver.state(), DriverState::Paused);
        driver.resume(now);
        assert_eq!(driver.state(), DriverState::Speaking);
    }

    #[test]
    fn stop_is_total_from_any_state() {
        let (mut driver, handle) = driver_with(100);
        let now = Instant::now();
        driver.speak("Some text to read.", now);
        driver.handle_engine_event(
            EngineEvent::WordBoundary {
                word: "Some".to_string(),
                char_offset: 0,
            },
        );
        driver.stop();
        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(driver.current_chunk(), 0);
        assert!(driver.last_word().is_none());
        assert!(handle.commands().contains(&EngineCommand::Cancel));

        // Safe to call again from Idle.
        driver.stop();
        assert_eq!(driver.state(), DriverState::Idle);
    }

    #[test]
    fn engine_error_cancels_pending_chunks() {
        let (mut driver, handle) = driver_with(25);
        let now = Instant::now();
        driver.speak("First sentence here. Second sentence here.", now);
        handle.clear_commands();

        let events = driver.handle_engine_event(
            EngineEvent::Failed {
                message: "synthesis-failed".to_string(),
            },
        );
        assert_eq!(
            events,
            vec![DriverEvent::PlaybackError {
                message: "synthesis-failed".to_string()
            }]
        );
        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(handle.commands(), vec![EngineCommand::Cancel]);
        // No retry: a later completion echo must not restart anything.
        assert!(driver.handle_engine_event(EngineEvent::Finished).is_empty());
        assert!(handle.spoken_texts().is_empty());
    }

    #[test]
    fn keep_alive_cycles_engine_while_speaking_only() {
        let (mut driver, handle) = driver_with(100);
        let start = Instant::now();
        driver.speak("A long reading passage.", start);
        handle.clear_commands();

        driver.tick(start + Duration::from_secs(5));
        assert!(handle.commands().is_empty(), "not due yet");

        driver.tick(start + Duration::from_secs(10));
        assert_eq!(
            handle.commands(),
            vec![EngineCommand::Pause, EngineCommand::Resume]
        );
        assert_eq!(
            driver.state(),
            DriverState::Speaking,
            "keep-alive must not flicker the driver state"
        );

        handle.clear_commands();
        driver.stop();
        handle.clear_commands();
        driver.tick(start + Duration::from_secs(30));
        assert!(handle.commands().is_empty(), "keep-alive stops outside Speaking");
    }

    #[test]
    fn keep_alive_pauses_with_user_pause() {
        let (mut driver, handle) = driver_with(100);
        let start = Instant::now();
        driver.speak("A passage.", start);
        driver.pause();
        handle.clear_commands();
        driver.tick(start + Duration::from_secs(60));
        assert!(handle.commands().is_empty());
    }

    #[test]
    fn speak_failure_surfaces_as_playback_error() {
        let (engine, handle) = MockEngine::new();
        let mut driver =
            SpeechDriver::new(Box::new(engine), params(), 100, KEEP_ALIVE_INTERVAL);
        handle.fail_next_speak();
        let events = driver.speak("Text.", Instant::now());
        assert!(matches!(
            events.as_slice(),
            [DriverEvent::PlaybackError { .. }]
        ));
        assert_eq!(driver.state(), DriverState::Idle);
    }
}
