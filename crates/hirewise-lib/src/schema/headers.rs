//! Column header normalization
//!
//! Headers are trimmed, whitespace-collapsed, title-cased, and then passed
//! through a table of whole-word rewrites for known spelling variants.
//! Every rule's output maps back to itself, so normalization is idempotent.

/// Whole-word rewrites applied after title-casing
///
/// Matching is on entire words, so rule order never matters and a rule can
/// never rewrite part of a longer word.
pub const WORD_RULES: &[(&str, &str)] = &[
    ("Ta", "TA"),
    ("Tapartner", "TA Partner"),
    ("Cv", "CV"),
    ("Cvs", "CVs"),
    ("Id", "ID"),
    ("1St", "1st"),
    ("2Nd", "2nd"),
    ("3Rd", "3rd"),
];

/// Normalize one raw column header
pub fn normalize_header(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    title_case(&collapsed)
        .split(' ')
        .map(rewrite_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased alphanumerics only; used for synonym and field lookups
pub fn compact_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn rewrite_word(word: &str) -> &str {
    WORD_RULES
        .iter()
        .find(|(from, _)| *from == word)
        .map(|(_, to)| *to)
        .unwrap_or(word)
}

/// First letter after any non-letter is uppercased, the rest lowercased.
/// Digits therefore start a new word: "1st" becomes "1St".
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_cased {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(ch);
            prev_cased = false;
        }
    }
    out
}
