// libromaji/src/converter.rs
//
// Kana -> syllable unit conversion.
//
// A phrase is scanned left to right, preferring two-kana digraphs over single
// kana. っ and ん are left unresolved during the scan and resolved right to
// left afterwards, because their spellings depend on the unit that follows.

use tracing::{debug, warn};

use libtyping_core::{utils, PhoneticConverter, SyllableUnit};

use crate::config::RomajiConfig;
use crate::table::{
    to_hiragana, DIGRAPHS, GEMINATE_MARK, GEMINATE_SPELLINGS, MONOGRAPHS, NASAL_MARK,
    NASAL_SHORT, NASAL_SPELLINGS,
};

/// Keys that must not follow a single "n", or the "n" would be read as the
/// start of the next syllable instead of ん.
const NASAL_BLOCKERS: &[char] = &['a', 'i', 'u', 'e', 'o', 'y', 'w', 'n'];

/// First letters that a doubled consonant for っ may not use: vowels, the
/// nasal, and the small-kana prefixes.
const GEMINATE_EXCLUDED: &[char] = &['a', 'i', 'u', 'e', 'o', 'n', 'l', 'x'];

enum Scanned {
    Unit(SyllableUnit),
    Geminate(String),
    Nasal(String),
}

/// Converts hiragana/katakana text into romaji syllable units.
#[derive(Debug, Clone)]
pub struct KanaConverter {
    final_nasal_short_form: bool,
    geminate_single_consonant: bool,
}

impl Default for KanaConverter {
    fn default() -> Self {
        Self::new(&RomajiConfig::default())
    }
}

impl KanaConverter {
    pub fn new(config: &RomajiConfig) -> Self {
        Self {
            final_nasal_short_form: config.final_nasal_short_form,
            geminate_single_consonant: config.geminate_single_consonant,
        }
    }

    fn scan(&self, text: &str) -> Vec<Scanned> {
        let original: Vec<char> = utils::normalize_compat(text).chars().collect();
        let folded: Vec<char> = original.iter().map(|&c| to_hiragana(c)).collect();

        let mut out = Vec::with_capacity(original.len());
        let mut i = 0;
        while i < original.len() {
            if i + 1 < original.len() {
                let key: String = folded[i..i + 2].iter().collect();
                if let Some(dedicated) = DIGRAPHS.get(key.as_str()) {
                    let grapheme: String = original[i..i + 2].iter().collect();
                    let variants = digraph_variants(dedicated, folded[i], folded[i + 1]);
                    out.push(Scanned::Unit(SyllableUnit::new(grapheme, variants)));
                    i += 2;
                    continue;
                }
            }

            let grapheme = original[i].to_string();
            let scanned = match folded[i] {
                GEMINATE_MARK => Scanned::Geminate(grapheme),
                NASAL_MARK => Scanned::Nasal(grapheme),
                c => match MONOGRAPHS.get(&c) {
                    Some(spellings) => Scanned::Unit(SyllableUnit::new(
                        grapheme,
                        spellings.iter().map(|s| s.to_string()).collect(),
                    )),
                    None => {
                        if c.is_ascii() {
                            debug!(ch = %c, "ascii passthrough");
                        } else {
                            warn!(ch = %c, "no romaji entry, typed as itself");
                        }
                        Scanned::Unit(SyllableUnit::passthrough(original[i]))
                    }
                },
            };
            out.push(scanned);
            i += 1;
        }
        out
    }

    fn geminate(&self, grapheme: String, next: Option<&SyllableUnit>) -> SyllableUnit {
        let mut variants: Vec<String> = Vec::new();
        if self.geminate_single_consonant {
            if let Some(next) = next {
                for first in next.first_chars() {
                    if first.is_ascii_lowercase() && !GEMINATE_EXCLUDED.contains(&first) {
                        variants.push(first.to_string());
                    }
                }
            }
        }
        variants.extend(GEMINATE_SPELLINGS.iter().map(|s| s.to_string()));
        SyllableUnit::new(grapheme, variants)
    }

    fn nasal(&self, grapheme: String, next: Option<&SyllableUnit>) -> SyllableUnit {
        let short_ok = match next {
            None => self.final_nasal_short_form,
            Some(next) => !next
                .first_chars()
                .iter()
                .any(|c| NASAL_BLOCKERS.contains(c)),
        };
        let mut variants: Vec<String> = Vec::with_capacity(3);
        if short_ok {
            variants.push(NASAL_SHORT.to_string());
        }
        variants.extend(NASAL_SPELLINGS.iter().map(|s| s.to_string()));
        SyllableUnit::new(grapheme, variants)
    }
}

impl PhoneticConverter for KanaConverter {
    fn convert(&self, text: &str) -> Vec<SyllableUnit> {
        let scanned = self.scan(text);

        // Resolve right to left so each marker sees its finished successor.
        let mut reversed: Vec<SyllableUnit> = Vec::with_capacity(scanned.len());
        for item in scanned.into_iter().rev() {
            let unit = match item {
                Scanned::Unit(unit) => unit,
                Scanned::Geminate(g) => self.geminate(g, reversed.last()),
                Scanned::Nasal(g) => self.nasal(g, reversed.last()),
            };
            reversed.push(unit);
        }
        reversed.reverse();
        reversed
    }
}

/// Dedicated spellings first, then every pairing of the component spellings.
fn digraph_variants(dedicated: &[&str], first: char, second: char) -> Vec<String> {
    let mut variants: Vec<String> = dedicated.iter().map(|s| s.to_string()).collect();
    let heads = MONOGRAPHS.get(&first).copied().unwrap_or(&[]);
    let tails = MONOGRAPHS.get(&second).copied().unwrap_or(&[]);
    for head in heads {
        for tail in tails {
            let joined = format!("{head}{tail}");
            if !variants.contains(&joined) {
                variants.push(joined);
            }
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use libtyping_core::{InputStatus, SyllableInputState};

    fn convert(text: &str) -> Vec<SyllableUnit> {
        KanaConverter::default().convert(text)
    }

    fn type_str(unit: &SyllableUnit, keys: &str) -> SyllableInputState {
        let mut state = SyllableInputState::new(unit.clone());
        for ch in keys.chars() {
            assert!(state.handle_input(ch).accepted, "{keys} rejected at {ch}");
        }
        state
    }

    #[test]
    fn single_kana() {
        let units = convert("と");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].variants, vec!["to".to_string()]);
        assert_eq!(units[0].grapheme, "と");
    }

    #[test]
    fn katakana_keeps_its_grapheme() {
        let units = convert("カタ");
        assert_eq!(units[0].grapheme, "カ");
        assert_eq!(units[0].canonical(), "ka");
        assert_eq!(units[1].canonical(), "ta");
    }

    #[test]
    fn half_width_katakana_folds_to_kana() {
        let units = convert("ｶﾞｯｺｳ");
        let canonical: Vec<&str> = units.iter().map(|u| u.canonical()).collect();
        assert_eq!(canonical, vec!["ga", "k", "ko", "u"]);
        assert_eq!(units[0].grapheme, "ガ");
        let units = convert("ｺｰﾋｰ");
        assert_eq!(units[1].canonical(), "-");
    }

    #[test]
    fn digraph_is_one_unit() {
        let units = convert("しゃ");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].canonical(), "sya");
        assert!(units[0].variants.contains(&"sha".to_string()));
        assert!(units[0].variants.contains(&"shixya".to_string()));
    }

    #[test]
    fn geminate_doubles_next_consonant() {
        let units = convert("った");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].canonical(), "t");
        assert!(units[0].variants.contains(&"xtu".to_string()));
        let state = type_str(&units[0], "t");
        assert_eq!(state.status(), InputStatus::Completed);
    }

    #[test]
    fn geminate_takes_every_spelling_of_next() {
        // ち: ti / chi
        let units = convert("っち");
        assert!(units[0].variants.contains(&"t".to_string()));
        assert!(units[0].variants.contains(&"c".to_string()));
    }

    #[test]
    fn geminate_before_vowel_has_only_generic_forms() {
        let units = convert("っあ");
        assert_eq!(units[0].canonical(), "ltu");
    }

    #[test]
    fn geminate_shortcut_can_be_disabled() {
        let mut config = RomajiConfig::default();
        config.geminate_single_consonant = false;
        let units = KanaConverter::new(&config).convert("った");
        assert_eq!(units[0].canonical(), "ltu");
    }

    #[test]
    fn final_nasal_accepts_n_and_nn() {
        let units = convert("ほん");
        let nasal = &units[1];
        assert!(nasal.variants.contains(&"n".to_string()));
        assert!(nasal.variants.contains(&"nn".to_string()));
        // "n" is a prefix of "nn", so it waits to be committed
        let state = type_str(nasal, "n");
        assert!(state.is_completable());
        let state = type_str(nasal, "nn");
        assert!(state.is_completed());
    }

    #[test]
    fn nasal_before_vowel_requires_nn() {
        let units = convert("かんい");
        let nasal = &units[1];
        assert!(!nasal.variants.contains(&"n".to_string()));
        let state = type_str(nasal, "n");
        assert!(!state.is_completable());
        let state = type_str(nasal, "nn");
        assert!(state.is_completed());
    }

    #[test]
    fn nasal_before_consonant_allows_n() {
        let units = convert("かんじ");
        assert_eq!(units[1].canonical(), "n");
    }

    #[test]
    fn nasal_before_nasal_requires_nn() {
        let units = convert("んん");
        assert_eq!(units[0].canonical(), "nn");
        assert_eq!(units[1].canonical(), "n");
    }

    #[test]
    fn final_short_nasal_can_be_disabled() {
        let mut config = RomajiConfig::default();
        config.final_nasal_short_form = false;
        let units = KanaConverter::new(&config).convert("ほん");
        assert_eq!(units[1].canonical(), "nn");
    }

    #[test]
    fn unmapped_characters_pass_through() {
        let units = convert("漢a");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].variants, vec!["漢".to_string()]);
        assert_eq!(units[1].variants, vec!["a".to_string()]);
    }

    #[test]
    fn fullwidth_folds_to_ascii() {
        let units = convert("！");
        assert_eq!(units[0].canonical(), "!");
    }

    #[test]
    fn canonical_spelling_types_through() {
        for phrase in ["にほんご", "がっこう", "きょうしゃ", "ちゃんと", "ヴァイオリン"] {
            for unit in convert(phrase) {
                let canonical = unit.canonical().to_string();
                let state = type_str(&unit, &canonical);
                assert!(
                    state.is_completed() || state.is_completable(),
                    "{phrase}: {canonical} did not finish {}",
                    unit.grapheme
                );
            }
        }
    }
}
