//! Records handed to the presentation and analytics collaborators.
//!
//! Like the rest of the engine's outputs these are plain data: the caller
//! reads the fields and renders or ships them however it likes.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Live state of the phrase being typed.
///
/// # Fields
///
/// - `canonical_text`: romanized phrase, using what was actually typed for
///   finished units and the canonical spelling for the rest
/// - `typed_length`: number of leading characters of `canonical_text` already typed
/// - `next_expected_char`: canonical next key, for the highlighted key cap
/// - `next_expected_chars`: every key that would be accepted right now
/// - `current_partial_input`: what has been typed for the unit under the cursor
/// - `is_error`: whether the most recent keystroke was rejected
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub canonical_text: String,
    pub typed_length: usize,
    pub next_expected_char: Option<char>,
    pub next_expected_chars: Vec<char>,
    pub current_partial_input: String,
    pub is_error: bool,
    pub progress_percent: f64,
    pub combo: u32,
}

/// Analytics payloads. Delivery is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    ProblemStart {
        session_id: u64,
        display_text: String,
        canonical_length: usize,
        timestamp_ms: u64,
    },
    ProblemComplete {
        session_id: u64,
        key_count: u32,
        mistake_count: u32,
        elapsed_ms: u64,
        speed: f64,
        max_combo: u32,
        leftover_keys: u32,
    },
}

impl TelemetryEvent {
    pub fn session_id(&self) -> u64 {
        match self {
            Self::ProblemStart { session_id, .. } | Self::ProblemComplete { session_id, .. } => {
                *session_id
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
