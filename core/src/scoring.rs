//! Speed, accuracy and rank over a run of phrases.
//!
//! Each finished phrase is one segment. The aggregate speed of a run is the
//! arithmetic mean of the per-segment speeds, not total keys over total time.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::session::SegmentStats;

/// One row of a rank table: speeds at or above `min_speed` earn `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankThreshold {
    pub min_speed: f64,
    pub label: String,
}

impl RankThreshold {
    pub fn new<L: Into<String>>(min_speed: f64, label: L) -> Self {
        Self {
            min_speed,
            label: label.into(),
        }
    }
}

/// Label for speeds below every threshold.
pub const LOWEST_RANK: &str = "F";

/// Step function from aggregate speed to a rank label, evaluated top-down.
#[derive(Debug, Clone, PartialEq)]
pub struct RankTable {
    thresholds: Vec<RankThreshold>,
}

impl RankTable {
    /// Build a table; rows are sorted by descending `min_speed`.
    pub fn new(mut thresholds: Vec<RankThreshold>) -> Self {
        thresholds.sort_by(|a, b| {
            b.min_speed
                .partial_cmp(&a.min_speed)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { thresholds }
    }

    /// S ≥ 400, A ≥ 300, B ≥ 200, C ≥ 150, D ≥ 100, E ≥ 50, otherwise F.
    pub fn default_thresholds() -> Vec<RankThreshold> {
        vec![
            RankThreshold::new(400.0, "S"),
            RankThreshold::new(300.0, "A"),
            RankThreshold::new(200.0, "B"),
            RankThreshold::new(150.0, "C"),
            RankThreshold::new(100.0, "D"),
            RankThreshold::new(50.0, "E"),
        ]
    }

    pub fn rank(&self, speed: f64) -> &str {
        self.thresholds
            .iter()
            .find(|t| speed >= t.min_speed)
            .map_or(LOWEST_RANK, |t| t.label.as_str())
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::new(Self::default_thresholds())
    }
}

/// Keys per minute for one segment; zero when no time elapsed.
pub fn segment_speed(key_count: u32, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    key_count as f64 / (elapsed_ms as f64 / 60_000.0)
}

/// Final numbers of a run. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub total_keys: u32,
    pub total_mistakes: u32,
    pub elapsed_ms: u64,
    pub per_segment_speed: Vec<f64>,
    pub speed: f64,
    pub accuracy_percent: f64,
    pub rank: String,
}

impl ScoreRecord {
    /// Leaderboard score: speed weighted by accuracy.
    pub fn score(&self) -> u64 {
        (self.speed * self.accuracy_percent / 100.0).round().max(0.0) as u64
    }
}

/// Payload for the leaderboard collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSubmission {
    pub username: String,
    pub score: u64,
    pub speed: f64,
    pub accuracy: f64,
    pub segment_count: usize,
}

impl LeaderboardSubmission {
    pub fn from_record<U: Into<String>>(username: U, record: &ScoreRecord) -> Self {
        Self {
            username: username.into(),
            score: record.score(),
            speed: record.speed,
            accuracy: record.accuracy_percent,
            segment_count: record.per_segment_speed.len(),
        }
    }
}

/// Accumulates segment samples across a run.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    segments: Vec<SegmentStats>,
    rank_table: RankTable,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rank_table(rank_table: RankTable) -> Self {
        Self {
            segments: Vec::new(),
            rank_table,
        }
    }

    /// Record a finished phrase without mistake information.
    pub fn record_segment(&mut self, key_count: u32, elapsed_ms: u64) -> usize {
        self.record_stats(SegmentStats {
            key_count,
            mistake_count: 0,
            elapsed_ms,
        })
    }

    /// Record a finished phrase. Returns the segment index.
    pub fn record_stats(&mut self, stats: SegmentStats) -> usize {
        info!(
            keys = stats.key_count,
            mistakes = stats.mistake_count,
            elapsed_ms = stats.elapsed_ms,
            speed = segment_speed(stats.key_count, stats.elapsed_ms),
            "segment recorded"
        );
        self.segments.push(stats);
        self.segments.len() - 1
    }

    /// Replace an earlier sample with authoritative numbers.
    pub fn replace_segment(&mut self, index: usize, stats: SegmentStats) -> bool {
        match self.segments.get_mut(index) {
            Some(slot) => {
                *slot = stats;
                true
            }
            None => false,
        }
    }

    pub fn segments(&self) -> &[SegmentStats] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn per_segment_speed(&self) -> Vec<f64> {
        self.segments
            .iter()
            .map(|s| segment_speed(s.key_count, s.elapsed_ms))
            .collect()
    }

    /// Mean of the per-segment speeds.
    pub fn current_speed(&self) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        let speeds = self.per_segment_speed();
        speeds.iter().sum::<f64>() / speeds.len() as f64
    }

    /// Correct keys over all keys, as a percentage. 100 before any key.
    pub fn accuracy(&self) -> f64 {
        let correct: u64 = self.segments.iter().map(|s| s.key_count as u64).sum();
        let mistakes: u64 = self.segments.iter().map(|s| s.mistake_count as u64).sum();
        let total = correct + mistakes;
        if total == 0 {
            return 100.0;
        }
        correct as f64 / total as f64 * 100.0
    }

    pub fn rank(&self) -> &str {
        self.rank_table.rank(self.current_speed())
    }

    pub fn rank_table(&self) -> &RankTable {
        &self.rank_table
    }

    pub fn finalize(&self) -> ScoreRecord {
        ScoreRecord {
            total_keys: self.segments.iter().map(|s| s.key_count).sum(),
            total_mistakes: self.segments.iter().map(|s| s.mistake_count).sum(),
            elapsed_ms: self.segments.iter().map(|s| s.elapsed_ms).sum(),
            per_segment_speed: self.per_segment_speed(),
            speed: self.current_speed(),
            accuracy_percent: self.accuracy(),
            rank: self.rank().to_string(),
        }
    }
}
