//! Term extraction rules for prescription text.
//!
//! Handles:
//! - Diagnosis splitting on CJK and ASCII punctuation
//! - Medicine name extraction (dose and unit suffixes stripped)
//! - Whole-line prescription phrases

/// Minimum length of a diagnosis term, in characters.
pub const MIN_DIAGNOSIS_CHARS: usize = 2;
/// Accepted medicine name lengths, in characters.
pub const MEDICINE_CHARS: std::ops::RangeInclusive<usize> = 2..=6;
/// Minimum length of a prescription line kept as a phrase.
pub const MIN_PHRASE_CHARS: usize = 4;

/// Unit characters that end a medicine name: grams, pills, tablets, packets,
/// qian, liang, litres, and the Latin gram.
const UNIT_CHARS: &[char] = &['克', 'g', '粒', '片', '包', '钱', '两', '升'];

fn is_diagnosis_delimiter(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '，' | ',' | '。' | '.' | '、' | '；' | ';' | '：' | ':' | '[' | ']' | '【' | '】'
        )
}

fn is_medicine_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '，' | ',' | '、')
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

/// Split a diagnosis into terms of at least two characters.
pub fn diagnosis_terms(diagnosis: &str) -> impl Iterator<Item = &str> {
    diagnosis
        .split(is_diagnosis_delimiter)
        .map(str::trim)
        .filter(|term| term.chars().count() >= MIN_DIAGNOSIS_CHARS)
}

/// Strip a dose suffix ("15g", "3片") from a token, leaving the name.
pub fn strip_dose(token: &str) -> &str {
    let token = token.trim();
    let token = match token.find(is_digit) {
        Some(idx) => &token[..idx],
        None => token,
    };
    match token.find(UNIT_CHARS) {
        Some(idx) => &token[..idx],
        None => token,
    }
}

/// Medicine names found on one prescription line.
pub fn medicine_terms(line: &str) -> impl Iterator<Item = &str> {
    line.split(is_medicine_delimiter)
        .map(strip_dose)
        .filter(|name| MEDICINE_CHARS.contains(&name.chars().count()))
}

/// Whether a trimmed line is long enough to suggest as a whole phrase.
pub fn is_phrase(line: &str) -> bool {
    line.chars().count() >= MIN_PHRASE_CHARS
}
