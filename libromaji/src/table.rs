// libromaji/src/table.rs
//
// Static kana -> romaji spelling tables.
// - Keys are hiragana; katakana are folded to hiragana before lookup.
// - The first spelling of each entry is the canonical one shown to the user.
// - っ and ん are not listed: their spellings depend on the following syllable.

use phf::phf_map;

/// Generic spellings of the geminate marker っ when typed on its own.
pub const GEMINATE_SPELLINGS: &[&str] = &["ltu", "xtu", "ltsu", "xtsu"];

/// Spellings of ん that are valid in every position.
pub const NASAL_SPELLINGS: &[&str] = &["nn", "xn"];

/// Short form of ん, only valid where the next key cannot be misread.
pub const NASAL_SHORT: &str = "n";

pub const GEMINATE_MARK: char = 'っ';
pub const NASAL_MARK: char = 'ん';

/// Single kana (and kana punctuation).
pub static MONOGRAPHS: phf::Map<char, &'static [&'static str]> = phf_map! {
    'あ' => &["a"], 'い' => &["i", "yi"], 'う' => &["u", "wu", "whu"], 'え' => &["e"], 'お' => &["o"],
    'か' => &["ka", "ca"], 'き' => &["ki"], 'く' => &["ku", "cu", "qu"], 'け' => &["ke"], 'こ' => &["ko", "co"],
    'さ' => &["sa"], 'し' => &["si", "shi", "ci"], 'す' => &["su"], 'せ' => &["se", "ce"], 'そ' => &["so"],
    'た' => &["ta"], 'ち' => &["ti", "chi"], 'つ' => &["tu", "tsu"], 'て' => &["te"], 'と' => &["to"],
    'な' => &["na"], 'に' => &["ni"], 'ぬ' => &["nu"], 'ね' => &["ne"], 'の' => &["no"],
    'は' => &["ha"], 'ひ' => &["hi"], 'ふ' => &["hu", "fu"], 'へ' => &["he"], 'ほ' => &["ho"],
    'ま' => &["ma"], 'み' => &["mi"], 'む' => &["mu"], 'め' => &["me"], 'も' => &["mo"],
    'や' => &["ya"], 'ゆ' => &["yu"], 'よ' => &["yo"],
    'ら' => &["ra"], 'り' => &["ri"], 'る' => &["ru"], 'れ' => &["re"], 'ろ' => &["ro"],
    'わ' => &["wa"], 'ゐ' => &["wyi"], 'ゑ' => &["wye"], 'を' => &["wo"],
    'が' => &["ga"], 'ぎ' => &["gi"], 'ぐ' => &["gu"], 'げ' => &["ge"], 'ご' => &["go"],
    'ざ' => &["za"], 'じ' => &["zi", "ji"], 'ず' => &["zu"], 'ぜ' => &["ze"], 'ぞ' => &["zo"],
    'だ' => &["da"], 'ぢ' => &["di"], 'づ' => &["du"], 'で' => &["de"], 'ど' => &["do"],
    'ば' => &["ba"], 'び' => &["bi"], 'ぶ' => &["bu"], 'べ' => &["be"], 'ぼ' => &["bo"],
    'ぱ' => &["pa"], 'ぴ' => &["pi"], 'ぷ' => &["pu"], 'ぺ' => &["pe"], 'ぽ' => &["po"],
    'ゔ' => &["vu"],
    'ぁ' => &["la", "xa"], 'ぃ' => &["li", "xi", "lyi", "xyi"], 'ぅ' => &["lu", "xu"],
    'ぇ' => &["le", "xe", "lye", "xye"], 'ぉ' => &["lo", "xo"],
    'ゃ' => &["lya", "xya"], 'ゅ' => &["lyu", "xyu"], 'ょ' => &["lyo", "xyo"],
    'ゎ' => &["lwa", "xwa"], 'ゕ' => &["lka", "xka"], 'ゖ' => &["lke", "xke"],
    'ー' => &["-"], '、' => &[","], '。' => &["."], '「' => &["["], '」' => &["]"],
    '・' => &["/"], '〜' => &["~"],
};

/// Consonant + small kana pairs with dedicated spellings.
///
/// The converter appends every concatenation of the two component spellings
/// after these, so "きゃ" also accepts "kilya" and "kixya".
pub static DIGRAPHS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "きゃ" => &["kya"], "きぃ" => &["kyi"], "きゅ" => &["kyu"], "きぇ" => &["kye"], "きょ" => &["kyo"],
    "ぎゃ" => &["gya"], "ぎぃ" => &["gyi"], "ぎゅ" => &["gyu"], "ぎぇ" => &["gye"], "ぎょ" => &["gyo"],
    "しゃ" => &["sya", "sha"], "しぃ" => &["syi"], "しゅ" => &["syu", "shu"],
    "しぇ" => &["sye", "she"], "しょ" => &["syo", "sho"],
    "じゃ" => &["zya", "ja", "jya"], "じぃ" => &["zyi", "jyi"], "じゅ" => &["zyu", "ju", "jyu"],
    "じぇ" => &["zye", "je", "jye"], "じょ" => &["zyo", "jo", "jyo"],
    "ちゃ" => &["tya", "cha", "cya"], "ちぃ" => &["tyi", "cyi"], "ちゅ" => &["tyu", "chu", "cyu"],
    "ちぇ" => &["tye", "che", "cye"], "ちょ" => &["tyo", "cho", "cyo"],
    "ぢゃ" => &["dya"], "ぢぃ" => &["dyi"], "ぢゅ" => &["dyu"], "ぢぇ" => &["dye"], "ぢょ" => &["dyo"],
    "にゃ" => &["nya"], "にぃ" => &["nyi"], "にゅ" => &["nyu"], "にぇ" => &["nye"], "にょ" => &["nyo"],
    "ひゃ" => &["hya"], "ひぃ" => &["hyi"], "ひゅ" => &["hyu"], "ひぇ" => &["hye"], "ひょ" => &["hyo"],
    "びゃ" => &["bya"], "びぃ" => &["byi"], "びゅ" => &["byu"], "びぇ" => &["bye"], "びょ" => &["byo"],
    "ぴゃ" => &["pya"], "ぴぃ" => &["pyi"], "ぴゅ" => &["pyu"], "ぴぇ" => &["pye"], "ぴょ" => &["pyo"],
    "みゃ" => &["mya"], "みぃ" => &["myi"], "みゅ" => &["myu"], "みぇ" => &["mye"], "みょ" => &["myo"],
    "りゃ" => &["rya"], "りぃ" => &["ryi"], "りゅ" => &["ryu"], "りぇ" => &["rye"], "りょ" => &["ryo"],
    "てぃ" => &["thi"], "てゅ" => &["thu"], "でぃ" => &["dhi"], "でゅ" => &["dhu"],
    "ふぁ" => &["fa", "fwa"], "ふぃ" => &["fi", "fyi"], "ふぇ" => &["fe", "fye"],
    "ふぉ" => &["fo", "fwo"], "ふゅ" => &["fyu"],
    "うぃ" => &["wi", "whi"], "うぇ" => &["we", "whe"], "うぉ" => &["who"],
    "ゔぁ" => &["va"], "ゔぃ" => &["vi"], "ゔぇ" => &["ve"], "ゔぉ" => &["vo"], "ゔゅ" => &["vyu"],
    "つぁ" => &["tsa"], "つぃ" => &["tsi"], "つぇ" => &["tse"], "つぉ" => &["tso"],
    "とぅ" => &["twu"], "どぅ" => &["dwu"],
    "くぁ" => &["qa", "kwa"], "くぃ" => &["qi"], "くぇ" => &["qe"], "くぉ" => &["qo"],
    "ぐぁ" => &["gwa"], "すぃ" => &["swi"], "いぇ" => &["ye"],
};

/// Fold katakana to the matching hiragana; everything else passes unchanged.
pub fn to_hiragana(ch: char) -> char {
    match ch {
        // ァ..ヶ sit exactly 0x60 above ぁ..ゖ
        '\u{30A1}'..='\u{30F6}' => char::from_u32(ch as u32 - 0x60).unwrap_or(ch),
        _ => ch,
    }
}
