//! The reader session: wires normalizer, indexer, chunking speech driver,
//! matcher and highlighter together for one piece of open content.
//!
//! Everything is single-threaded and event-driven. Work that must wait (the
//! view settling after a content swap, the platform settling after a restart)
//! is returned as a schedule effect; the host calls back with the session's
//! content version, and stale callbacks are discarded against the current
//! version. That generation check is what keeps slow results from a previous
//! (title, content) pair from clobbering newer state.

use crate::config::{MAX_PITCH, MAX_RATE, MIN_PITCH, MIN_RATE, ReaderConfig};
use crate::highlight::{HighlightController, HighlightEffect};
use crate::indexer::{self, WordUnit};
use crate::matcher;
use crate::normalizer;
use crate::speech::engine::{EngineEvent, SpeechEngine, Voice, default_voice};
use crate::speech::{DriverEvent, SpeechDriver, SpeechParams};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing message for the host's notification sink. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notification {
    fn warning(message: &str) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.to_string(),
        }
    }

    fn error(message: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.to_string(),
        }
    }
}

/// Work for the host shell: rendering, highlight marks, notifications, and
/// deferred callbacks carrying the content version they were scheduled for.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Swap the rendered content for this annotated markup.
    RenderContent { version: u64, html: String },
    Highlight(HighlightEffect),
    Notify(Notification),
    /// Call [`ReaderSession::run_indexing`] with this version after `delay`.
    ScheduleIndex { version: u64, delay: Duration },
    /// Call [`ReaderSession::resume_speaking`] with this version after `delay`.
    ScheduleSpeak { version: u64, delay: Duration },
}

pub struct ReaderSession {
    config: ReaderConfig,
    driver: SpeechDriver,
    highlight: HighlightController,
    speech_available: bool,
    title: String,
    body_html: String,
    full_text: String,
    version: u64,
    units: Vec<WordUnit>,
    last_word_index: Option<usize>,
}

impl ReaderSession {
    pub fn new(engine: Box<dyn SpeechEngine>, mut config: ReaderConfig) -> Self {
        config.clamp();
        let speech_available = engine.is_supported();
        if !speech_available {
            warn!("Speech synthesis unavailable; playback controls are disabled");
        }
        let voice = config
            .voice
            .clone()
            .or_else(|| default_voice(&engine.voices()).map(|v| v.id.clone()));
        let driver = SpeechDriver::new(
            engine,
            SpeechParams {
                rate: config.rate,
                pitch: config.pitch,
                volume: config.volume,
                voice,
            },
            config.max_chunk_chars,
            config.keep_alive_interval(),
        );
        let highlight = HighlightController::new(config.scroll_debounce());
        Self {
            config,
            driver,
            highlight,
            speech_available,
            title: String::new(),
            body_html: String::new(),
            full_text: String::new(),
            version: 0,
            units: Vec::new(),
            last_word_index: None,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn speaking(&self) -> bool {
        self.driver.is_speaking()
    }

    pub fn paused(&self) -> bool {
        self.driver.is_paused()
    }

    pub fn current_chunk(&self) -> usize {
        self.driver.current_chunk()
    }

    pub fn last_word_index(&self) -> Option<usize> {
        self.last_word_index
    }

    pub fn highlighted_word(&self) -> Option<usize> {
        self.highlight.current()
    }

    pub fn units(&self) -> &[WordUnit] {
        &self.units
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn speech_available(&self) -> bool {
        self.speech_available
    }

    pub fn voices(&self) -> Vec<Voice> {
        self.driver.voices()
    }

    /// Present a new `(title, content)` pair. Bumps the content version so
    /// indexing work still in flight for the old pair gets discarded, and
    /// schedules fresh indexing after a short settle delay.
    pub fn open(&mut self, title: &str, html: &str) -> Vec<SessionEffect> {
        self.driver.stop();
        let mut effects = self.clear_highlights();
        self.version += 1;
        self.last_word_index = None;
        self.title = title.to_string();
        self.body_html = html.to_string();
        self.full_text = normalizer::compose_full_text(title, &indexer::extract_text(html));
        self.units.clear();
        info!(
            version = self.version,
            chars = self.full_text.chars().count(),
            "Opened reader content"
        );
        effects.push(SessionEffect::ScheduleIndex {
            version: self.version,
            delay: self.config.index_settle(),
        });
        effects
    }

    /// Deferred indexing callback. A result computed for a stale version is
    /// dropped without touching session state.
    pub fn run_indexing(&mut self, version: u64) -> Vec<SessionEffect> {
        if version != self.version {
            debug!(
                version,
                current = self.version,
                "Ignoring stale indexing request"
            );
            return Vec::new();
        }
        let document = indexer::index_document(&self.title, &self.body_html, version);
        self.units = document.units;
        info!(version, units = self.units.len(), "Applied content index");
        vec![SessionEffect::RenderContent {
            version,
            html: document.annotated_html,
        }]
    }

    /// Start speaking the full text from the beginning.
    pub fn play(&mut self, now: Instant) -> Vec<SessionEffect> {
        if !self.speech_available {
            debug!("Ignoring play; speech synthesis unavailable");
            return Vec::new();
        }
        let text = self.full_text.clone();
        let events = self.driver.speak(&text, now);
        self.absorb(events, now)
    }

    pub fn pause(&mut self) -> Vec<SessionEffect> {
        self.driver.pause();
        Vec::new()
    }

    pub fn resume(&mut self, now: Instant) -> Vec<SessionEffect> {
        self.driver.resume(now);
        Vec::new()
    }

    /// Universal cancellation: silence the engine and clear all visual state.
    pub fn stop(&mut self) -> Vec<SessionEffect> {
        self.driver.stop();
        self.last_word_index = None;
        self.clear_highlights()
    }

    /// Stop, clear the word cursor and highlights, then re-speak from chunk 0
    /// after a short delay so the platform engine can settle.
    pub fn restart(&mut self) -> Vec<SessionEffect> {
        info!("Restarting playback from the beginning");
        let mut effects = self.stop();
        effects.push(SessionEffect::ScheduleSpeak {
            version: self.version,
            delay: self.config.restart_settle(),
        });
        effects
    }

    /// Deferred speak callback (restart path); stale versions are discarded.
    pub fn resume_speaking(&mut self, version: u64, now: Instant) -> Vec<SessionEffect> {
        if version != self.version {
            debug!(
                version,
                current = self.version,
                "Ignoring stale speak request"
            );
            return Vec::new();
        }
        self.play(now)
    }

    pub fn set_rate(&mut self, rate: f32, now: Instant) -> Vec<SessionEffect> {
        self.config.rate = rate.clamp(MIN_RATE, MAX_RATE);
        info!(rate = self.config.rate, "Adjusted speech rate");
        self.apply_params(now)
    }

    pub fn set_pitch(&mut self, pitch: f32, now: Instant) -> Vec<SessionEffect> {
        self.config.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
        info!(pitch = self.config.pitch, "Adjusted speech pitch");
        self.apply_params(now)
    }

    pub fn set_volume(&mut self, volume: f32, now: Instant) -> Vec<SessionEffect> {
        self.config.volume = volume.clamp(0.0, 1.0);
        info!(volume = self.config.volume, "Adjusted speech volume");
        self.apply_params(now)
    }

    pub fn set_voice(&mut self, voice_id: Option<String>, now: Instant) -> Vec<SessionEffect> {
        self.config.voice = voice_id;
        info!(voice = ?self.config.voice, "Selected voice");
        self.apply_params(now)
    }

    /// The platform's voice list changed (voices often load late). Re-pick
    /// the default when no explicit voice is configured.
    pub fn voices_changed(&mut self) {
        if self.config.voice.is_some() {
            return;
        }
        let voice = default_voice(&self.driver.voices()).map(|v| v.id.clone());
        debug!(voice = ?voice, "Re-selected default voice after voice-list change");
        let mut params = self.driver.params().clone();
        params.voice = voice;
        self.driver.set_params(params);
    }

    /// Dispatch a platform callback into the engine state machine and apply
    /// whatever falls out (highlight moves, notifications).
    pub fn handle_engine_event(&mut self, event: EngineEvent, now: Instant) -> Vec<SessionEffect> {
        let events = self.driver.handle_engine_event(event);
        self.absorb(events, now)
    }

    /// Periodic timer from the host; drives the speech keep-alive.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEffect> {
        self.driver.tick(now);
        Vec::new()
    }

    /// Closing implies stop: no utterance or highlight survives the session.
    pub fn close(&mut self) -> Vec<SessionEffect> {
        info!(version = self.version, "Closing reader session");
        self.stop()
    }

    /// No mid-utterance parameter hot-swap exists on platform speech APIs, so
    /// changing rate/pitch/volume/voice while speaking stops and re-speaks
    /// the full text from the beginning with the new settings.
    fn apply_params(&mut self, now: Instant) -> Vec<SessionEffect> {
        let voice = self
            .config
            .voice
            .clone()
            .or_else(|| self.driver.params().voice.clone());
        self.driver.set_params(SpeechParams {
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
            voice,
        });
        if self.driver.is_speaking() || self.driver.is_paused() {
            info!("Speech setting changed mid-utterance; restarting from the top");
            let mut effects = self.stop();
            effects.extend(self.play(now));
            return effects;
        }
        Vec::new()
    }

    fn absorb(&mut self, events: Vec<DriverEvent>, now: Instant) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        for event in events {
            match event {
                DriverEvent::Started => debug!("Speech started"),
                DriverEvent::Word(spoken) => {
                    let resolved = matcher::resolve(
                        &spoken,
                        &self.units,
                        self.last_word_index,
                        self.config.match_tolerance,
                    )
                    .map(|unit| unit.index);
                    match resolved {
                        Some(index) => {
                            self.last_word_index = Some(index);
                            effects.extend(
                                self.highlight
                                    .mark(index, now)
                                    .into_iter()
                                    .map(SessionEffect::Highlight),
                            );
                        }
                        None => {
                            trace!(word = %spoken.word, "No match; keeping previous highlight")
                        }
                    }
                }
                DriverEvent::Finished => {
                    self.last_word_index = None;
                    effects.extend(self.clear_highlights());
                }
                DriverEvent::NoText => {
                    effects.push(SessionEffect::Notify(Notification::warning(
                        "No text available to read aloud.",
                    )));
                }
                DriverEvent::PlaybackError { .. } => {
                    effects.push(SessionEffect::Notify(Notification::error(
                        "Playback failed; try a different voice or refresh.",
                    )));
                }
            }
        }
        effects
    }

    fn clear_highlights(&mut self) -> Vec<SessionEffect> {
        self.highlight
            .clear_all()
            .into_iter()
            .map(SessionEffect::Highlight)
            .collect()
    }
}
