// core/src/engine.rs
//
// Generic typing engine that works with any phonetic converter.
// Owns the current phrase's session explicitly: created on load, replaced on
// the next load. Nothing here is global.

use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::display::{DisplayInfo, TelemetryEvent};
use crate::error::Result;
use crate::offload::{OffloadClient, OffloadResponse};
use crate::scoring::{segment_speed, LeaderboardSubmission, RankTable, ScoreRecord, ScoringEngine};
use crate::session::{
    AcceptResult, Keystroke, Rejection, SegmentStats, SessionBookkeeping, TypingSession,
};
use crate::syllable::SyllableUnit;
use crate::Config;

/// Trait that script front ends implement to feed the generic engine.
pub trait PhoneticConverter {
    /// Split script text into syllable units with ranked spellings.
    ///
    /// Must never fail: characters without a table entry become single
    /// passthrough units.
    fn convert(&self, text: &str) -> Vec<SyllableUnit>;
}

/// A target phrase: what is shown, and the script text that is typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub display_text: String,
    pub script_text: String,
}

impl Phrase {
    pub fn new<D: Into<String>, S: Into<String>>(display_text: D, script_text: S) -> Self {
        Self {
            display_text: display_text.into(),
            script_text: script_text.into(),
        }
    }
}

struct ActiveSession {
    id: u64,
    session: TypingSession,
    segment_index: Option<usize>,
    authoritative: Option<SessionBookkeeping>,
}

/// Typing engine combining a converter, the current session and run scoring.
///
/// Type parameter C is the converter (e.g. the kana converter in libromaji).
pub struct TypingEngine<C> {
    converter: C,
    config: Config,
    scoring: ScoringEngine,
    active: Option<ActiveSession>,
    /// Session finished by typing just before the current one was loaded.
    finished: Option<TypingSession>,
    next_session_id: u64,
    offload: Option<OffloadClient>,
    events: Vec<TelemetryEvent>,
}

impl<C: PhoneticConverter> TypingEngine<C> {
    /// Create an engine. Starts the offload worker when the config enables it.
    pub fn new(converter: C, config: Config) -> Result<Self> {
        let offload = if config.offload_enabled {
            Some(OffloadClient::spawn(&config)?)
        } else {
            None
        };
        let scoring =
            ScoringEngine::with_rank_table(RankTable::new(config.rank_thresholds.clone()));
        Ok(Self {
            converter,
            config,
            scoring,
            active: None,
            finished: None,
            next_session_id: 1,
            offload,
            events: Vec::new(),
        })
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn session(&self) -> Option<&TypingSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn session_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn is_offloading(&self) -> bool {
        self.offload.is_some()
    }

    /// Convert the phrase and start a fresh session for it.
    ///
    /// Empty script text falls back to the display text. The previous session
    /// is dropped and any offload work still tagged with it is cancelled.
    pub fn load_phrase(&mut self, phrase: &Phrase, now_ms: u64) -> Result<TelemetryEvent> {
        let mut units = self.converter.convert(&phrase.script_text);
        if units.is_empty() {
            warn!(
                display = %phrase.display_text,
                "empty script text, falling back to display text"
            );
            units = self.converter.convert(&phrase.display_text);
        }

        let id = self.next_session_id;
        self.next_session_id += 1;
        let canonical_length = units.iter().map(SyllableUnit::canonical_len).sum();

        if let Some(offload) = self.offload.as_mut() {
            offload.load(id, units.clone(), self.config.time_limit_ms)?;
        }

        let session = TypingSession::with_time_limit(units, self.config.time_limit_ms);
        debug!(session_id = id, units = session.len(), canonical_length, "phrase loaded");
        self.finished = self
            .active
            .take()
            .map(|a| a.session)
            .filter(TypingSession::is_completed);
        self.active = Some(ActiveSession {
            id,
            session,
            segment_index: None,
            authoritative: None,
        });

        Ok(TelemetryEvent::ProblemStart {
            session_id: id,
            display_text: phrase.display_text.clone(),
            canonical_length,
            timestamp_ms: now_ms,
        })
    }

    /// Feed one keystroke to the current session.
    ///
    /// Without a loaded phrase the key is reported as `AlreadyCompleted`.
    ///
    /// Until the new phrase has seen a keystroke, a key it would reject but
    /// that extends the last unit of the previous phrase ("hon" + "n") goes to
    /// the previous phrase. Its recorded segment is not touched.
    pub fn handle_key(&mut self, key: Keystroke) -> AcceptResult {
        let Some(active) = self.active.as_mut() else {
            return TypingSession::new(Vec::new()).accept(key.ch, key.timestamp_ms);
        };
        let untouched = active.session.key_count() == 0 && active.session.mistake_count() == 0;
        if let (true, Some(finished)) = (untouched, self.finished.as_mut()) {
            if !active.session.plan(key.ch).is_accepted() {
                let extension = finished.plan(key.ch);
                if extension.is_accepted() {
                    trace!(ch = %key.ch, "key extends the previous phrase");
                    return finished.apply(&extension, key.timestamp_ms);
                }
            }
        }
        self.finished = None;
        let result = active.session.accept(key.ch, key.timestamp_ms);
        if let Some(offload) = self.offload.as_mut() {
            if result.rejection != Some(Rejection::AlreadyCompleted) {
                offload.submit(key.ch, key.timestamp_ms);
            }
        }
        if result.completes_session {
            self.record_completion();
        }
        result
    }

    /// Check the time budget of the current session.
    ///
    /// The worker only gets a deadline tick while a limit is configured and
    /// the session was still running.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let running = !active.session.is_completed();
        let forced = active.session.update(now_ms);
        if let (true, Some(_), Some(offload)) =
            (running, self.config.time_limit_ms, self.offload.as_mut())
        {
            offload.tick(now_ms);
        }
        if forced {
            self.record_completion();
        }
        forced
    }

    fn record_completion(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.segment_index.is_some() {
            return;
        }
        let Some(stats) = active.session.segment_stats() else {
            return;
        };
        let index = self.scoring.record_stats(stats);
        active.segment_index = Some(index);
        let bookkeeping = active.session.bookkeeping();
        info!(session_id = active.id, segment = index, "phrase completed");
        self.events.push(TelemetryEvent::ProblemComplete {
            session_id: active.id,
            key_count: stats.key_count,
            mistake_count: stats.mistake_count,
            elapsed_ms: stats.elapsed_ms,
            speed: segment_speed(stats.key_count, stats.elapsed_ms),
            max_combo: bookkeeping.max_combo,
            leftover_keys: bookkeeping.leftover_keys,
        });
    }

    /// Apply offload results for the current session.
    ///
    /// Timing and score fields from the worker replace the local view; a
    /// recorded segment is overwritten if the worker's numbers differ.
    /// Returns how many responses were applied.
    pub fn poll_offload(&mut self) -> usize {
        let Some(offload) = self.offload.as_mut() else {
            return 0;
        };
        let responses = offload.poll();
        self.reconcile(&responses)
    }

    /// Block until every submitted job has been answered, then reconcile.
    ///
    /// Meant for the end of a run or for tests; the interactive path uses
    /// `poll_offload`.
    pub fn wait_offload(&mut self, timeout: Duration) -> usize {
        let Some(offload) = self.offload.as_mut() else {
            return 0;
        };
        let last = offload.last_submitted();
        let responses = offload.wait_for(last, timeout);
        self.reconcile(&responses)
    }

    fn reconcile(&mut self, responses: &[OffloadResponse]) -> usize {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        let mut applied = 0;
        for response in responses {
            if response.session_id != active.id {
                continue;
            }
            applied += 1;
            let book = response.bookkeeping;
            active.authoritative = Some(book);
            if let (true, Some(index)) = (book.completed, active.segment_index) {
                let recorded = self.scoring.segments().get(index).copied();
                let authoritative = SegmentStats {
                    key_count: book.key_count,
                    mistake_count: book.mistake_count,
                    elapsed_ms: book.elapsed_ms,
                };
                if recorded != Some(authoritative) {
                    warn!(segment = index, "segment replaced by offload result");
                    self.scoring.replace_segment(index, authoritative);
                }
            }
        }
        applied
    }

    /// Timing/score fields: the offload result when one has arrived, else local.
    pub fn bookkeeping(&self) -> Option<SessionBookkeeping> {
        let active = self.active.as_ref()?;
        Some(
            active
                .authoritative
                .unwrap_or_else(|| active.session.bookkeeping()),
        )
    }

    /// Display fields always come from the local session.
    pub fn display(&self) -> Option<DisplayInfo> {
        self.active.as_ref().map(|a| a.session.display_info())
    }

    /// Telemetry produced since the last call.
    pub fn take_events(&mut self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn score(&self) -> ScoreRecord {
        self.scoring.finalize()
    }

    pub fn submission(&self) -> LeaderboardSubmission {
        LeaderboardSubmission::from_record(self.config.username.clone(), &self.score())
    }

    /// Start a new run: forget recorded segments and the current session.
    pub fn reset_run(&mut self) {
        self.scoring.clear();
        self.active = None;
        self.finished = None;
        self.events.clear();
    }
}
