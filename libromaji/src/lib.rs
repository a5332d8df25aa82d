//! libromaji crate root
//!
//! Kana front end for `libtyping-core`: converts hiragana/katakana phrases
//! into romaji syllable units and wires them into a `TypingEngine`.
//!
//! Public API exported here:
//! - `KanaConverter` from `converter`
//! - `RomajiConfig` from `config`
//! - the static spelling tables from `table`

pub mod config;
pub mod converter;
pub mod table;

// Re-export the engine types callers need alongside the converter.
pub use libtyping_core::{
    AcceptResult, DisplayInfo, Keystroke, LeaderboardSubmission, Phrase, PhoneticConverter,
    Rejection, ScoreRecord, SyllableUnit, TelemetryEvent, TypingEngine, TypingSession,
};

pub use config::RomajiConfig;
pub use converter::KanaConverter;

/// Engine typing kana phrases in romaji.
pub type RomajiEngine = TypingEngine<KanaConverter>;

/// Build an engine from a romaji config.
///
/// Starts the offload worker when `config.base.offload_enabled` is set.
pub fn create_engine(config: RomajiConfig) -> libtyping_core::Result<RomajiEngine> {
    let converter = KanaConverter::new(&config);
    TypingEngine::new(converter, config.into_base())
}

/// Session for a single kana phrase, without an engine around it.
pub fn session_for(text: &str, config: &RomajiConfig) -> TypingSession {
    let units = KanaConverter::new(config).convert(text);
    TypingSession::with_time_limit(units, config.base.time_limit_ms)
}
