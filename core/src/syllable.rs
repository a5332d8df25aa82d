//! Syllable units and the per-syllable partial-input state machine.
//!
//! A `SyllableUnit` is one grapheme of the target phrase together with every
//! phonetic spelling that is accepted for it. A `SyllableInputState` tracks
//! what the user has typed so far for one unit. The transition is pure: a
//! keystroke either extends `typed` into a prefix of some variant, or it is
//! rejected and nothing changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lowercase a keystroke the same way variants are lowercased.
pub fn fold_key(ch: char) -> char {
    if ch.is_ascii() {
        ch.to_ascii_lowercase()
    } else {
        ch.to_lowercase().next().unwrap_or(ch)
    }
}

/// One grapheme of the script text mapped to its accepted spellings.
///
/// `variants[0]` is the canonical spelling used for display and for
/// progress-length accounting. The list is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyllableUnit {
    pub grapheme: String,
    pub variants: Vec<String>,
}

impl SyllableUnit {
    /// Build a unit, dropping empty and duplicate spellings while keeping order.
    ///
    /// If no usable spelling remains the grapheme itself becomes the only variant.
    pub fn new<G: Into<String>>(grapheme: G, variants: Vec<String>) -> Self {
        let grapheme = grapheme.into();
        let mut out: Vec<String> = Vec::with_capacity(variants.len());
        for v in variants {
            let v = v.to_lowercase();
            if !v.is_empty() && !out.contains(&v) {
                out.push(v);
            }
        }
        if out.is_empty() {
            out.push(grapheme.to_lowercase());
        }
        Self {
            grapheme,
            variants: out,
        }
    }

    /// Single-spelling unit for characters without a table entry.
    pub fn passthrough(ch: char) -> Self {
        let s = ch.to_string();
        Self::new(s.clone(), vec![s])
    }

    /// Canonical spelling (`variants[0]`).
    pub fn canonical(&self) -> &str {
        &self.variants[0]
    }

    /// Length of the canonical spelling in keystrokes.
    pub fn canonical_len(&self) -> usize {
        self.canonical().chars().count()
    }

    /// First characters of every variant, in variant order without repeats.
    pub fn first_chars(&self) -> Vec<char> {
        let mut out = Vec::new();
        for v in &self.variants {
            if let Some(c) = v.chars().next() {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Whether `ch` would be accepted as the first keystroke for this unit.
    pub fn accepts_first(&self, ch: char) -> bool {
        let ch = fold_key(ch);
        self.variants.iter().any(|v| v.starts_with(ch))
    }
}

/// Progress of a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputStatus {
    #[default]
    Pending,
    Partial,
    Completed,
}

/// Result of feeding one character to a `SyllableInputState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleResult {
    pub accepted: bool,
    pub completes_unit: bool,
}

impl HandleResult {
    const REJECTED: Self = Self {
        accepted: false,
        completes_unit: false,
    };
}

/// Partial-input state for one `SyllableUnit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyllableInputState {
    unit: SyllableUnit,
    typed: String,
    status: InputStatus,
}

impl SyllableInputState {
    pub fn new(unit: SyllableUnit) -> Self {
        Self {
            unit,
            typed: String::new(),
            status: InputStatus::Pending,
        }
    }

    pub fn unit(&self) -> &SyllableUnit {
        &self.unit
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn status(&self) -> InputStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == InputStatus::Completed
    }

    /// Feed one keystroke.
    ///
    /// The unit completes only when `typed` equals a variant that no longer
    /// variant extends. When `typed` equals a variant that is still a prefix
    /// of a longer one (e.g. "n" against "nn") the state stays `Partial` and
    /// `is_completable()` reports true; the session decides when to commit.
    pub fn handle_input(&mut self, ch: char) -> HandleResult {
        if self.is_completed() {
            return HandleResult::REJECTED;
        }
        match self.probe(ch) {
            Some((candidate, completes)) => {
                self.typed = candidate;
                self.status = if completes {
                    InputStatus::Completed
                } else {
                    InputStatus::Partial
                };
                HandleResult {
                    accepted: true,
                    completes_unit: completes,
                }
            }
            None => HandleResult::REJECTED,
        }
    }

    /// Compute what `handle_input` would do without mutating.
    ///
    /// Returns the new `typed` string and whether it completes the unit.
    pub fn probe(&self, ch: char) -> Option<(String, bool)> {
        if self.is_completed() {
            return None;
        }
        let mut candidate = String::with_capacity(self.typed.len() + 1);
        candidate.push_str(&self.typed);
        candidate.push(fold_key(ch));

        let mut any_prefix = false;
        let mut exact = false;
        let mut extended = false;
        for v in &self.unit.variants {
            if v.starts_with(candidate.as_str()) {
                any_prefix = true;
                if v.len() == candidate.len() {
                    exact = true;
                } else {
                    extended = true;
                }
            }
        }
        if !any_prefix {
            return None;
        }
        Some((candidate, exact && !extended))
    }

    /// True when `typed` is a whole variant but the unit is not yet committed.
    pub fn is_completable(&self) -> bool {
        !self.is_completed()
            && !self.typed.is_empty()
            && self.unit.variants.iter().any(|v| *v == self.typed)
    }

    /// Commit a completable unit as-is. Returns false if `typed` is not a whole variant.
    pub fn commit(&mut self) -> bool {
        if !self.is_completable() {
            return false;
        }
        self.status = InputStatus::Completed;
        true
    }

    /// Force completion regardless of what was typed (deadline expiry).
    pub(crate) fn force_complete(&mut self) {
        self.status = InputStatus::Completed;
    }

    /// Overwrite the state with a previously planned outcome.
    pub(crate) fn restore(&mut self, typed: &str, status: InputStatus) {
        self.typed.clear();
        self.typed.push_str(typed);
        self.status = status;
    }

    /// Characters at position `typed.len()` over every still-compatible variant.
    pub fn next_expected_chars(&self) -> BTreeSet<char> {
        if self.is_completed() {
            return BTreeSet::new();
        }
        let n = self.typed.len();
        self.compatible_variants()
            .filter_map(|v| v[n..].chars().next())
            .collect()
    }

    /// Untyped remainder of the first variant compatible with `typed`.
    ///
    /// The canonical spelling is preferred whenever it is still compatible.
    pub fn remaining_of_canonical(&self) -> &str {
        if self.is_completed() {
            return "";
        }
        let n = self.typed.len();
        self.compatible_variants().next().map_or("", |v| &v[n..])
    }

    fn compatible_variants(&self) -> impl Iterator<Item = &String> + '_ {
        self.unit
            .variants
            .iter()
            .filter(move |v| v.starts_with(self.typed.as_str()))
    }
}
