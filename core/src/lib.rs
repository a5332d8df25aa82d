//! libtyping-core
//!
//! Script-agnostic keystroke matching engine shared by typing front ends
//! (libromaji for kana).
//!
//! A phrase is converted into syllable units with ranked phonetic spellings,
//! each keystroke is validated against those spellings, and finished phrases
//! feed speed/accuracy/rank scoring.
//!
//! Public API:
//! - `SyllableUnit` / `SyllableInputState` - per-syllable spellings and partial input
//! - `TypingSession` - per-phrase state, the per-keystroke entry point
//! - `ScoringEngine` - per-segment speed, accuracy and rank
//! - `OffloadCache` / `OffloadClient` - memoized transitions on a worker thread
//! - `TypingEngine` - owns the current session across phrase loads
//! - `Config` - configuration and feature flags
use serde::{Deserialize, Serialize};

pub mod syllable;
pub use syllable::{fold_key, HandleResult, InputStatus, SyllableInputState, SyllableUnit};

pub mod session;
pub use session::{
    AcceptResult, Keystroke, Rejection, SegmentStats, SessionBookkeeping, Transition, TypingSession,
    UnitChange,
};

pub mod scoring;
pub use scoring::{
    segment_speed, LeaderboardSubmission, RankTable, RankThreshold, ScoreRecord, ScoringEngine,
};

pub mod offload;
pub use offload::{CacheKey, OffloadCache, OffloadClient, OffloadResponse};

pub mod display;
pub use display::{DisplayInfo, TelemetryEvent};

pub mod engine;
pub use engine::{Phrase, PhoneticConverter, TypingEngine};

pub mod error;
pub use error::{Error, Result};

/// Generic configuration for the typing engine.
///
/// This config contains only script-agnostic fields. Script-specific options
/// (nasal and geminate spellings for kana, etc.) belong in the front end's
/// own config, which flattens this one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Run the keystroke bookkeeping a second time on a worker thread
    pub offload_enabled: bool,

    /// Maximum number of memoized transitions kept by the offload cache
    pub max_cache_size: usize,

    /// Capacity of the request channel to the offload worker.
    /// When full, keystrokes are buffered and sent later as one batch.
    pub offload_queue_capacity: usize,

    /// Per-phrase time budget, counted from the first accepted keystroke
    pub time_limit_ms: Option<u64>,

    /// Name attached to leaderboard submissions
    pub username: String,

    /// Rank table, evaluated top-down; speeds below every row rank "F"
    pub rank_thresholds: Vec<RankThreshold>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            offload_enabled: false,
            // a phrase rarely produces more than a few hundred distinct states
            max_cache_size: 1000,
            offload_queue_capacity: 64,
            time_limit_ms: None,
            username: "guest".to_string(),
            rank_thresholds: RankTable::default_thresholds(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Rank table built from `rank_thresholds`.
    pub fn rank_table(&self) -> RankTable {
        RankTable::new(self.rank_thresholds.clone())
    }
}

/// Utility helpers.
pub mod utils {
    /// Compatibility-normalize (NFKC) and trim.
    ///
    /// Folds full-width ASCII to ASCII and half-width katakana (with its
    /// separate sound marks) to composed full-width katakana.
    pub fn normalize_compat(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfkc().collect::<String>().trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.time_limit_ms = Some(30_000);
        config.username = "tester".into();
        let text = config.to_toml_string().unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = Config::from_toml_str("offload_enabled = true\n").unwrap();
        assert!(config.offload_enabled);
        assert_eq!(config.max_cache_size, 1000);
        assert_eq!(config.rank_table().rank(250.0), "B");
    }

    #[test]
    fn custom_rank_rows_from_toml() {
        let text = r#"
            [[rank_thresholds]]
            min_speed = 500.0
            label = "S+"

            [[rank_thresholds]]
            min_speed = 100.0
            label = "C"
        "#;
        let config = Config::from_toml_str(text).unwrap();
        let table = config.rank_table();
        assert_eq!(table.rank(600.0), "S+");
        assert_eq!(table.rank(200.0), "C");
        assert_eq!(table.rank(50.0), "F");
    }

    #[test]
    fn normalize_compat_composes_and_folds() {
        assert_eq!(utils::normalize_compat(" か\u{3099} "), "が");
        assert_eq!(utils::normalize_compat("ＡＢ！"), "AB!");
        assert_eq!(utils::normalize_compat("ｶﾞｯｺｳ\u{3000}"), "ガッコウ");
    }
}
