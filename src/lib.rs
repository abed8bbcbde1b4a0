//! Speech-synchronized reading engine.
//!
//! Pairs a chunking text-to-speech driver with a content-indexing and
//! highlighting pipeline: sanitized HTML goes in, word-boundary events from
//! the platform speech engine come back, and each spoken word is resolved to
//! the exact rendered word it belongs to despite noisy offsets, chunk seams
//! and repeated words.
//!
//! The host shell supplies a [`speech::engine::SpeechEngine`] implementation
//! wrapping its platform speech API, feeds platform callbacks and timer ticks
//! into a [`session::ReaderSession`], and applies the returned
//! [`session::SessionEffect`]s to its view.

pub mod chunker;
pub mod config;
pub mod highlight;
pub mod indexer;
pub mod matcher;
pub mod normalizer;
pub mod session;
pub mod speech;

pub use config::{ReaderConfig, load_config};
pub use highlight::HighlightEffect;
pub use indexer::{IndexedDocument, WordUnit};
pub use session::{Notification, NoticeLevel, ReaderSession, SessionEffect};
pub use speech::engine::{EngineEvent, SpeechEngine, Utterance, Voice};
pub use speech::{DriverEvent, SpokenWord};

use tracing_subscriber::{EnvFilter, fmt};

/// Install the default tracing subscriber: env-filtered, compact fmt output.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
