//! Company-name normalization shared by both sides of matching.
//!
//! The portfolio index and the disclosure queries both go through
//! [`variants`], so the two sides always agree on what a key looks like.

use std::collections::BTreeSet;

/// Legal-form words dropped by [`normalize`].
const LEGAL_FORMS: [&str; 9] = [
    "ab",
    "(publ)",
    "publ",
    "aktiebolag",
    "oyj",
    "asa",
    "a/s",
    "ltd",
    "plc",
];

/// Share-class suffixes dropped by [`share_class_base`].
const SHARE_CLASS_SUFFIXES: [&str; 6] = ["-sdb", " sdb", "-a", "-b", " a", " b"];

/// Generic legal-entity words that may prefix the brand name,
/// as in "Aktiebolaget Electrolux".
pub const HOLDING_PREFIXES: [&str; 1] = ["aktiebolaget"];

/// Variants shorter than this are too ambiguous to be match keys.
pub const MIN_VARIANT_LEN: usize = 3;

/// Known short names and the full names regulators file under.
const ALIASES: &[(&str, &[&str])] = &[
    ("handelsbanken", &["svenska handelsbanken"]),
    ("hm", &["hennes mauritz", "h m"]),
    ("h m", &["hennes mauritz"]),
    ("ericsson", &["telefonaktiebolaget lm ericsson", "lm ericsson"]),
    ("atlas copco", &["atlas copco aktiebolag"]),
    ("atlascopco", &["atlas copco aktiebolag", "atlas copco"]),
    ("autoliv", &["autoliv inc"]),
    ("assaabloy", &["assa abloy"]),
    ("skf", &["aktiebolaget skf"]),
    ("sca", &["svenska cellulosa aktiebolaget sca", "svenska cellulosa"]),
    ("seb", &["skandinaviska enskilda banken"]),
    ("finnair", &["finnair oyj"]),
    ("norwegian", &["norwegian air shuttle"]),
    ("dfds", &["dfds a/s"]),
    ("viscaria", &["gruvaktiebolaget viscaria"]),
    // Volvo Cars is a separate company from AB Volvo; "volvo" has no alias.
    ("volvocar", &["volvo car"]),
];

/// Lower-case, drop legal-form words and collapse whitespace.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .filter(|word| !LEGAL_FORMS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip trailing share-class markers ("-b", " a", "sdb") from a normalized name.
pub fn share_class_base(normalized: &str) -> String {
    let mut base = normalized.trim().to_string();
    loop {
        let stripped = SHARE_CLASS_SUFFIXES
            .iter()
            .find_map(|suffix| base.strip_suffix(suffix))
            .map(|s| s.trim_end().to_string());
        match stripped {
            Some(s) if !s.is_empty() => base = s,
            _ => return base,
        }
    }
}

/// Words of a normalized name, hyphens treated as separators.
pub fn words(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

/// If the name is "<holding prefix> <brand...>", return the part after the prefix.
pub fn strip_holding_prefix(normalized: &str) -> Option<String> {
    let words = words(normalized);
    if words.len() >= 2 && HOLDING_PREFIXES.contains(&words[0]) {
        Some(words[1..].join(" "))
    } else {
        None
    }
}

/// Every key a name may be found under.
pub fn variants(name: &str) -> BTreeSet<String> {
    let normalized = normalize(name);
    let spaced = collapse(&normalized.replace('-', " "));
    let joined = normalized.replace('-', "");
    let base = share_class_base(&normalized);

    let mut out = BTreeSet::new();
    out.insert(normalized.clone());
    out.insert(spaced.clone());
    out.insert(joined.clone());
    out.insert(base.clone());
    out.insert(collapse(&base.replace('-', " ")));
    out.insert(base.replace('-', ""));

    let name_words = words(&normalized);
    if let Some(first) = name_words.first() {
        out.insert(first.to_string());
    }
    if name_words.len() >= 2 && HOLDING_PREFIXES.contains(&name_words[0]) {
        out.insert(name_words[1].to_string());
        if name_words.len() > 2 {
            out.insert(name_words[1..].join(" "));
        }
    }

    for (key, aliases) in ALIASES {
        let hit = [&normalized, &spaced, &joined, &base]
            .iter()
            .any(|form| contains_phrase(form, key));
        if hit {
            for alias in *aliases {
                out.insert(alias.to_string());
                out.insert(normalize(alias));
            }
        }
    }

    out.retain(|v| v.chars().count() >= MIN_VARIANT_LEN);
    out
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True if `phrase` occurs in `haystack` as a run of whole words.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let hay: Vec<&str> = haystack.split_whitespace().collect();
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > hay.len() {
        return false;
    }
    hay.windows(needle.len()).any(|w| w == needle.as_slice())
}
