//! Typing session for one phrase.
//!
//! `TypingSession` owns the ordered `SyllableInputState`s of a phrase and is
//! the per-keystroke entry point. Every keystroke is split in two steps:
//!
//! - `plan()` computes a `Transition` from `(cursor, typed, char)` without
//!   touching the session. For a given phrase this is a pure function, which
//!   is what lets the offload cache memoize it.
//! - `apply()` writes the transition back and does the bookkeeping (timer,
//!   key and mistake counters, combo, completion).
//!
//! `accept()` is simply `plan()` followed by `apply()`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::display::DisplayInfo;
use crate::syllable::{fold_key, InputStatus, SyllableInputState, SyllableUnit};

/// A single keystroke event with its arrival time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystroke {
    pub ch: char,
    pub timestamp_ms: u64,
}

impl Keystroke {
    pub fn new(ch: char, timestamp_ms: u64) -> Self {
        Self { ch, timestamp_ms }
    }
}

/// Why a keystroke was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// The key matches no variant prefix of the current unit.
    InputRejected,
    /// The session already finished; the key is ignored.
    AlreadyCompleted,
}

/// Outcome of `TypingSession::accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptResult {
    pub success: bool,
    pub completes_unit: bool,
    pub completes_session: bool,
    /// Next canonical key after this keystroke was applied.
    pub expected_char: Option<char>,
    pub rejection: Option<Rejection>,
}

/// New state of one unit produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitChange {
    pub index: usize,
    pub typed: String,
    pub status: InputStatus,
}

/// Planned effect of one keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub rejection: Option<Rejection>,
    pub changes: Vec<UnitChange>,
    pub cursor_after: usize,
    pub completes_unit: bool,
}

impl Transition {
    fn rejected(reason: Rejection, cursor: usize) -> Self {
        Self {
            rejection: Some(reason),
            changes: Vec::new(),
            cursor_after: cursor,
            completes_unit: false,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Key/time sample of one finished phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SegmentStats {
    pub key_count: u32,
    pub mistake_count: u32,
    pub elapsed_ms: u64,
}

/// Timing and score fields of a session.
///
/// These are the fields the offload worker is authoritative for; display
/// fields always come from the interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionBookkeeping {
    pub key_count: u32,
    pub mistake_count: u32,
    pub elapsed_ms: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub completed: bool,
    pub leftover_keys: u32,
}

/// Per-phrase typing session.
#[derive(Debug, Clone)]
pub struct TypingSession {
    units: Vec<SyllableInputState>,
    cursor: usize,
    combo: u32,
    max_combo: u32,
    key_count: u32,
    mistake_count: u32,
    started_at: Option<u64>,
    finished_at: Option<u64>,
    completed: bool,
    timed_out: bool,
    last_rejected: bool,
    leftover_keys: u32,
    time_limit_ms: Option<u64>,
    total_canonical: usize,
}

impl TypingSession {
    /// Create a session over `units`. An empty phrase is complete on arrival.
    pub fn new(units: Vec<SyllableUnit>) -> Self {
        let total_canonical = units.iter().map(SyllableUnit::canonical_len).sum();
        let completed = units.is_empty();
        Self {
            units: units.into_iter().map(SyllableInputState::new).collect(),
            cursor: 0,
            combo: 0,
            max_combo: 0,
            key_count: 0,
            mistake_count: 0,
            started_at: None,
            finished_at: None,
            completed,
            timed_out: false,
            last_rejected: false,
            leftover_keys: 0,
            time_limit_ms: None,
            total_canonical,
        }
    }

    /// Create a session that force-completes `limit_ms` after the first accepted key.
    pub fn with_time_limit(units: Vec<SyllableUnit>, limit_ms: Option<u64>) -> Self {
        let mut session = Self::new(units);
        session.time_limit_ms = limit_ms;
        session
    }

    pub fn units(&self) -> &[SyllableInputState] {
        &self.units
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn key_count(&self) -> u32 {
        self.key_count
    }

    pub fn mistake_count(&self) -> u32 {
        self.mistake_count
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn leftover_keys(&self) -> u32 {
        self.leftover_keys
    }

    /// Milliseconds between the first accepted key and completion (or `now`).
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match self.started_at {
            Some(start) => self.finished_at.unwrap_or(now_ms).saturating_sub(start),
            None => 0,
        }
    }

    /// `typed` of the unit under the cursor (empty once completed).
    pub fn current_typed(&self) -> &str {
        self.units.get(self.cursor).map_or("", |u| u.typed())
    }

    /// Process one keystroke.
    pub fn accept(&mut self, ch: char, timestamp_ms: u64) -> AcceptResult {
        let transition = self.plan(ch);
        self.apply(&transition, timestamp_ms)
    }

    /// Compute the effect of `ch` without mutating the session.
    pub fn plan(&self, ch: char) -> Transition {
        if self.completed || self.cursor >= self.units.len() {
            return self
                .plan_final_extension(ch)
                .unwrap_or_else(|| Transition::rejected(Rejection::AlreadyCompleted, self.cursor));
        }
        let current = &self.units[self.cursor];

        if let Some((typed, completes)) = current.probe(ch) {
            let mut changes = Vec::with_capacity(1);
            let cursor_after = self.advance(self.cursor, typed, completes, &mut changes);
            return Transition {
                rejection: None,
                completes_unit: cursor_after > self.cursor,
                changes,
                cursor_after,
            };
        }

        // "n" before a consonant: the key belongs to the next unit, so the
        // completable unit is committed with what it has.
        let next_index = self.cursor + 1;
        if current.is_completable() && next_index < self.units.len() {
            if let Some((typed, completes)) = self.units[next_index].probe(ch) {
                let mut changes = Vec::with_capacity(2);
                changes.push(UnitChange {
                    index: self.cursor,
                    typed: current.typed().to_string(),
                    status: InputStatus::Completed,
                });
                let cursor_after = self.advance(next_index, typed, completes, &mut changes);
                return Transition {
                    rejection: None,
                    changes,
                    cursor_after,
                    completes_unit: true,
                };
            }
        }

        Transition::rejected(Rejection::InputRejected, self.cursor)
    }

    /// After the phrase was finished by typing, a key that turns the last unit
    /// into a longer spelling of itself (the second "n" of a final ん).
    fn plan_final_extension(&self, ch: char) -> Option<Transition> {
        if self.timed_out || self.key_count == 0 {
            return None;
        }
        let index = self.units.len().checked_sub(1)?;
        let last = &self.units[index];
        let mut typed = last.typed().to_string();
        typed.push(fold_key(ch));
        if !last.unit().variants.iter().any(|v| *v == typed) {
            return None;
        }
        Some(Transition {
            rejection: None,
            changes: vec![UnitChange {
                index,
                typed,
                status: InputStatus::Completed,
            }],
            cursor_after: self.units.len(),
            completes_unit: false,
        })
    }

    /// Record the new state of unit `index` and return the cursor after it.
    fn advance(
        &self,
        index: usize,
        typed: String,
        completes: bool,
        changes: &mut Vec<UnitChange>,
    ) -> usize {
        let is_last = index + 1 == self.units.len();
        let whole = self.units[index].unit().variants.iter().any(|v| *v == typed);
        // A phrase-final completable unit has nothing after it to disambiguate.
        let done = completes || (is_last && whole);
        changes.push(UnitChange {
            index,
            typed,
            status: if done {
                InputStatus::Completed
            } else {
                InputStatus::Partial
            },
        });
        if done {
            index + 1
        } else {
            index
        }
    }

    /// Apply a planned transition and update counters.
    ///
    /// A transition planned for the current `(cursor, typed)` pair always
    /// applies cleanly; rejected transitions never move the cursor.
    pub fn apply(&mut self, transition: &Transition, timestamp_ms: u64) -> AcceptResult {
        match transition.rejection {
            Some(Rejection::AlreadyCompleted) => {
                return AcceptResult {
                    success: false,
                    completes_unit: false,
                    completes_session: false,
                    expected_char: None,
                    rejection: Some(Rejection::AlreadyCompleted),
                };
            }
            Some(Rejection::InputRejected) => {
                self.combo = 0;
                self.mistake_count += 1;
                self.last_rejected = true;
                trace!(cursor = self.cursor, "keystroke rejected");
                return AcceptResult {
                    success: false,
                    completes_unit: false,
                    completes_session: false,
                    expected_char: self.expected_char(),
                    rejection: Some(Rejection::InputRejected),
                };
            }
            None => {}
        }

        for change in &transition.changes {
            if let Some(state) = self.units.get_mut(change.index) {
                state.restore(&change.typed, change.status);
            }
        }
        if self.completed {
            // final-unit extension: the segment was already measured
            self.last_rejected = false;
            trace!("final unit extended after completion");
            return AcceptResult {
                success: true,
                completes_unit: false,
                completes_session: false,
                expected_char: None,
                rejection: None,
            };
        }
        self.cursor = self.cursor.max(transition.cursor_after);
        self.started_at.get_or_insert(timestamp_ms);
        self.key_count += 1;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        self.last_rejected = false;

        let mut completes_session = false;
        if self.cursor >= self.units.len() {
            self.finish(timestamp_ms);
            completes_session = true;
        }

        AcceptResult {
            success: true,
            completes_unit: transition.completes_unit,
            completes_session,
            expected_char: self.expected_char(),
            rejection: None,
        }
    }

    fn finish(&mut self, timestamp_ms: u64) {
        self.completed = true;
        self.finished_at = Some(timestamp_ms);
        debug!(
            keys = self.key_count,
            mistakes = self.mistake_count,
            elapsed_ms = self.elapsed_ms(timestamp_ms),
            "session completed"
        );
    }

    /// Check the time budget. Returns true if this call forced completion.
    ///
    /// The deadline is measured from the first accepted keystroke, so idle time
    /// before typing starts never counts. Idempotent once completed.
    pub fn update(&mut self, now_ms: u64) -> bool {
        if self.completed {
            return false;
        }
        let (Some(limit), Some(start)) = (self.time_limit_ms, self.started_at) else {
            return false;
        };
        if now_ms < start.saturating_add(limit) {
            return false;
        }
        self.leftover_keys = self.remaining_key_count() as u32;
        for state in &mut self.units[self.cursor..] {
            state.force_complete();
        }
        self.cursor = self.units.len();
        self.timed_out = true;
        self.finish(start.saturating_add(limit));
        debug!(leftover = self.leftover_keys, "time limit reached");
        true
    }

    /// Next canonical key: the remainder of the current unit, or the next unit's
    /// canonical start when the current unit is already a whole variant.
    pub fn expected_char(&self) -> Option<char> {
        let current = self.units.get(self.cursor)?;
        if current.is_completed() {
            return None;
        }
        if let Some(c) = current.remaining_of_canonical().chars().next() {
            return Some(c);
        }
        self.units
            .get(self.cursor + 1)
            .and_then(|next| next.unit().canonical().chars().next())
    }

    /// Every key that would currently be accepted.
    pub fn next_expected_chars(&self) -> BTreeSet<char> {
        let Some(current) = self.units.get(self.cursor) else {
            return BTreeSet::new();
        };
        let mut out = current.next_expected_chars();
        if current.is_completable() {
            if let Some(next) = self.units.get(self.cursor + 1) {
                out.extend(next.unit().first_chars());
            }
        }
        out
    }

    /// Percentage of canonical keystrokes typed so far.
    ///
    /// Each unit contributes at most its canonical length, so progress does not
    /// depend on which variant the user chose.
    pub fn progress_percent(&self) -> f64 {
        if self.total_canonical == 0 {
            return 100.0;
        }
        let done: usize = self
            .units
            .iter()
            .take((self.cursor + 1).min(self.units.len()))
            .map(|state| {
                let canonical = state.unit().canonical_len();
                let whole = state.unit().variants.iter().any(|v| v == state.typed());
                let typed = state.typed().chars().count();
                if state.is_completed() && whole {
                    canonical
                } else if state.is_completed() {
                    typed.min(canonical)
                } else {
                    // a longer spelling in progress is not done yet
                    typed.min(canonical.saturating_sub(1))
                }
            })
            .sum();
        (done as f64 / self.total_canonical as f64 * 100.0).min(100.0)
    }

    /// Canonical keystrokes still needed to finish the phrase.
    pub fn remaining_key_count(&self) -> usize {
        self.units
            .iter()
            .skip(self.cursor)
            .map(|state| state.remaining_of_canonical().chars().count())
            .sum()
    }

    /// Key/time sample once the session has completed.
    pub fn segment_stats(&self) -> Option<SegmentStats> {
        let finished = self.finished_at?;
        Some(SegmentStats {
            key_count: self.key_count,
            mistake_count: self.mistake_count,
            elapsed_ms: self.elapsed_ms(finished),
        })
    }

    pub fn bookkeeping(&self) -> SessionBookkeeping {
        SessionBookkeeping {
            key_count: self.key_count,
            mistake_count: self.mistake_count,
            elapsed_ms: self.finished_at.map_or(0, |f| self.elapsed_ms(f)),
            combo: self.combo,
            max_combo: self.max_combo,
            completed: self.completed,
            leftover_keys: self.leftover_keys,
        }
    }

    /// Presentation record for the current state.
    pub fn display_info(&self) -> DisplayInfo {
        let mut canonical_text = String::new();
        let mut typed_length = 0usize;
        for (i, state) in self.units.iter().enumerate() {
            if i < self.cursor {
                canonical_text.push_str(state.typed());
                typed_length += state.typed().chars().count();
                // force-completed units show the rest of their spelling untyped
                if !state.unit().variants.iter().any(|v| v == state.typed()) {
                    let rest = state
                        .unit()
                        .variants
                        .iter()
                        .find(|v| v.starts_with(state.typed()))
                        .map_or("", |v| &v[state.typed().len()..]);
                    canonical_text.push_str(rest);
                }
            } else if i == self.cursor {
                canonical_text.push_str(state.typed());
                canonical_text.push_str(state.remaining_of_canonical());
                typed_length += state.typed().chars().count();
            } else {
                canonical_text.push_str(state.unit().canonical());
            }
        }
        DisplayInfo {
            canonical_text,
            typed_length,
            next_expected_char: self.expected_char(),
            next_expected_chars: self.next_expected_chars().into_iter().collect(),
            current_partial_input: self.current_typed().to_string(),
            is_error: self.last_rejected,
            progress_percent: self.progress_percent(),
            combo: self.combo,
        }
    }
}
