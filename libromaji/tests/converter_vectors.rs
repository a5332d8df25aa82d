//! Conversion vectors: kana phrase -> units -> which keystroke strings finish it.

use libromaji::{session_for, KanaConverter, PhoneticConverter, RomajiConfig};

fn canonical(text: &str) -> Vec<String> {
    KanaConverter::default()
        .convert(text)
        .iter()
        .map(|u| u.canonical().to_string())
        .collect()
}

fn completes(text: &str, keys: &str) -> bool {
    let mut session = session_for(text, &RomajiConfig::default());
    for (i, ch) in keys.chars().enumerate() {
        if !session.accept(ch, i as u64 * 100).success {
            return false;
        }
    }
    session.is_completed()
}

#[test]
fn canonical_vectors() {
    let cases: &[(&str, &[&str])] = &[
        ("すし", &["su", "si"]),
        ("にほんご", &["ni", "ho", "n", "go"]),
        ("がっこう", &["ga", "k", "ko", "u"]),
        ("きょう", &["kyo", "u"]),
        ("ちゃんと", &["tya", "n", "to"]),
        ("しんあい", &["si", "nn", "a", "i"]),
        ("コーヒー", &["ko", "-", "hi", "-"]),
        ("ほん", &["ho", "n"]),
    ];
    for (text, expected) in cases {
        let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        assert_eq!(canonical(text), expected, "canonical spelling of {text}");
    }
}

#[test]
fn accepted_spellings() {
    let cases: &[(&str, &[&str])] = &[
        ("すし", &["susi", "sushi", "suci"]),
        ("にほんご", &["nihongo", "nihonngo", "nihoxngo"]),
        ("がっこう", &["gakkou", "galtukou", "gaxtsukou"]),
        ("きょう", &["kyou", "kilyou", "kixyou"]),
        ("ちゃんと", &["chanto", "tyanto", "cyannto"]),
        ("しんあい", &["shinnai", "sixnai"]),
        ("ほん", &["hon", "honn", "hoxn"]),
        ("ふじさん", &["fujisan", "huzisan"]),
        ("ヴァイオリン", &["vaiorin", "vuxaiorin"]),
        ("まっちゃ", &["matcha", "mattya", "maccha"]),
    ];
    for (text, spellings) in cases {
        for keys in *spellings {
            assert!(completes(text, keys), "{keys} should finish {text}");
        }
    }
}

#[test]
fn rejected_spellings() {
    let cases: &[(&str, &str)] = &[
        // single n before a vowel reads as な-row
        ("しんあい", "shinai"),
        // geminate cannot double a vowel
        ("がっあ", "gaaa"),
        ("すし", "sisi"),
    ];
    for (text, keys) in cases {
        assert!(!completes(text, keys), "{keys} must not finish {text}");
    }
}

#[test]
fn mixed_script_passes_through() {
    let units = KanaConverter::default().convert("JR東");
    let graphemes: Vec<&str> = units.iter().map(|u| u.grapheme.as_str()).collect();
    assert_eq!(graphemes, vec!["J", "R", "東"]);
    assert_eq!(units[0].canonical(), "j");
    assert!(completes("JR", "jr"));
}

#[test]
fn whitespace_is_trimmed() {
    assert_eq!(canonical("  すし\u{3000}"), vec!["su", "si"]);
}

#[test]
fn empty_text_has_no_units() {
    assert!(KanaConverter::default().convert("").is_empty());
    let session = session_for("", &RomajiConfig::default());
    assert!(session.is_completed());
}
