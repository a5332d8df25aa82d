// core/tests/session_flow.rs
//
// End-to-end keystroke matching through TypingSession with hand-built units.
//
// Tests cover:
// - canonical and alternative spellings
// - the ambiguous nasal unit ("n" vs "nn") mid-phrase and at phrase end
// - rejection bookkeeping (combo, mistakes, error flag)
// - time limit handling and leftover keys
// - scoring across several sessions

use libtyping_core::{
    InputStatus, Rejection, ScoringEngine, SyllableUnit, TypingSession,
};

fn unit(grapheme: &str, variants: &[&str]) -> SyllableUnit {
    SyllableUnit::new(grapheme, variants.iter().map(|s| s.to_string()).collect())
}

/// し ん ぶ ん : "shinbun"
fn shinbun() -> Vec<SyllableUnit> {
    vec![
        unit("し", &["si", "shi", "ci"]),
        unit("ん", &["n", "nn", "xn"]),
        unit("ぶ", &["bu"]),
        unit("ん", &["n", "nn", "xn"]),
    ]
}

fn type_all(session: &mut TypingSession, keys: &str, start_ms: u64, step_ms: u64) -> u64 {
    let mut t = start_ms;
    for ch in keys.chars() {
        let r = session.accept(ch, t);
        assert!(r.success, "'{ch}' rejected at cursor {}", session.cursor());
        t += step_ms;
    }
    t
}

#[test]
fn test_canonical_spelling_completes() {
    let mut s = TypingSession::new(shinbun());
    type_all(&mut s, "sinbun", 0, 100);
    assert!(s.is_completed());
    assert_eq!(s.key_count(), 6);
    assert_eq!(s.mistake_count(), 0);
    assert_eq!(s.max_combo(), 6);
}

#[test]
fn test_alternative_spellings_complete() {
    for keys in ["shinbun", "cinnbunn", "sixnbuxn", "shinnbun"] {
        let mut s = TypingSession::new(shinbun());
        type_all(&mut s, keys, 0, 50);
        assert!(s.is_completed(), "{keys} did not complete");
    }
}

#[test]
fn test_short_nasal_commits_on_next_consonant() {
    let mut s = TypingSession::new(shinbun());
    type_all(&mut s, "shin", 0, 10);
    // "n" alone is ambiguous: still on the nasal unit
    assert_eq!(s.cursor(), 1);
    assert_eq!(s.units()[1].status(), InputStatus::Partial);

    let r = s.accept('b', 40);
    assert!(r.success);
    assert!(r.completes_unit);
    assert_eq!(s.units()[1].status(), InputStatus::Completed);
    assert_eq!(s.units()[1].typed(), "n");
    assert_eq!(s.cursor(), 2);
    assert_eq!(s.current_typed(), "b");
}

#[test]
fn test_phrase_final_short_nasal_finishes() {
    let mut s = TypingSession::new(shinbun());
    let r_last = {
        type_all(&mut s, "sinbu", 0, 10);
        s.accept('n', 100)
    };
    assert!(r_last.completes_session);
    assert!(s.is_completed());
}

#[test]
fn test_nasal_before_vowel_needs_double() {
    // か ん い with ん limited to "nn"/"xn"
    let units = vec![
        unit("か", &["ka"]),
        unit("ん", &["nn", "xn"]),
        unit("い", &["i", "yi"]),
    ];
    let mut s = TypingSession::new(units);
    type_all(&mut s, "kan", 0, 10);
    let r = s.accept('i', 30);
    assert!(!r.success);
    assert_eq!(r.rejection, Some(Rejection::InputRejected));
    assert_eq!(r.expected_char, Some('n'));
    type_all(&mut s, "ni", 40, 10);
    assert!(s.is_completed());
    assert_eq!(s.mistake_count(), 1);
}

#[test]
fn test_rejection_resets_combo_and_flags_error() {
    let mut s = TypingSession::new(shinbun());
    type_all(&mut s, "shi", 0, 10);
    assert_eq!(s.combo(), 3);
    let r = s.accept('z', 40);
    assert!(!r.success);
    assert_eq!(s.combo(), 0);
    assert_eq!(s.max_combo(), 3);
    assert!(s.display_info().is_error);
    s.accept('n', 50);
    assert!(!s.display_info().is_error);
}

#[test]
fn test_keys_after_completion_change_nothing() {
    let mut s = TypingSession::new(vec![unit("あ", &["a"])]);
    s.accept('a', 0);
    let before = s.bookkeeping();
    let r = s.accept('a', 10);
    assert_eq!(r.rejection, Some(Rejection::AlreadyCompleted));
    assert_eq!(s.bookkeeping(), before);
}

#[test]
fn test_uppercase_keys_match() {
    let mut s = TypingSession::new(shinbun());
    type_all(&mut s, "SHINBUN", 0, 10);
    assert!(s.is_completed());
}

#[test]
fn test_expected_chars_include_next_unit_while_ambiguous() {
    let mut s = TypingSession::new(shinbun());
    type_all(&mut s, "shin", 0, 10);
    let expected = s.next_expected_chars();
    assert!(expected.contains(&'n'));
    assert!(expected.contains(&'b'));
    assert!(!expected.contains(&'a'));
}

#[test]
fn test_progress_tracks_canonical_length() {
    let mut s = TypingSession::new(shinbun());
    assert_eq!(s.progress_percent(), 0.0);
    // "shi" covers the whole canonical "si" for the first unit
    type_all(&mut s, "shi", 0, 10);
    let p = s.progress_percent();
    assert!((p - 2.0 / 6.0 * 100.0).abs() < 1e-9, "progress {p}");
    type_all(&mut s, "nbun", 40, 10);
    assert_eq!(s.progress_percent(), 100.0);
}

#[test]
fn test_final_double_nasal_keeps_segment_timing() {
    let mut s = TypingSession::new(shinbun());
    type_all(&mut s, "shinbun", 0, 100);
    assert!(s.is_completed());
    let stats = s.segment_stats().unwrap();
    assert_eq!(stats.elapsed_ms, 600);

    let r = s.accept('n', 2_000);
    assert!(r.success);
    assert!(!r.completes_session);
    assert_eq!(s.units()[3].typed(), "nn");
    assert_eq!(s.segment_stats(), Some(stats));
    assert_eq!(s.mistake_count(), 0);

    let r = s.accept('n', 2_100);
    assert_eq!(r.rejection, Some(Rejection::AlreadyCompleted));
}

#[test]
fn test_progress_stops_short_of_unfinished_unit() {
    let mut s = TypingSession::new(shinbun());
    type_all(&mut s, "sh", 0, 10);
    let p = s.progress_percent();
    assert!((p - 1.0 / 6.0 * 100.0).abs() < 1e-9, "progress {p}");
}

#[test]
fn test_time_limit_forces_completion() {
    let mut s = TypingSession::with_time_limit(shinbun(), Some(1_000));
    // the clock starts with the first accepted key
    assert!(!s.update(5_000));
    type_all(&mut s, "shi", 5_000, 100);
    assert!(!s.update(5_900));
    assert!(s.update(6_000));
    assert!(s.is_completed());
    assert_eq!(s.leftover_keys(), 4); // n, bu, n
    let stats = s.segment_stats().unwrap();
    assert_eq!(stats.elapsed_ms, 1_000);
    assert_eq!(stats.key_count, 3);
    // idempotent
    assert!(!s.update(7_000));
}

#[test]
fn test_scoring_over_sessions() {
    let mut scoring = ScoringEngine::new();

    // 6 keys in 3.6 s = 100 keys/min
    let mut a = TypingSession::new(shinbun());
    type_all(&mut a, "sinbun", 0, 720);
    scoring.record_stats(a.segment_stats().unwrap());

    // 6 keys in 1.2 s = 300 keys/min
    let mut b = TypingSession::new(shinbun());
    type_all(&mut b, "sinbun", 10_000, 240);
    scoring.record_stats(b.segment_stats().unwrap());

    let speeds = scoring.per_segment_speed();
    assert!((speeds[0] - 100.0).abs() < 1e-9);
    assert!((speeds[1] - 300.0).abs() < 1e-9);
    assert!((scoring.current_speed() - 200.0).abs() < 1e-9);
    assert_eq!(scoring.rank(), "B");
    assert_eq!(scoring.accuracy(), 100.0);
}
