use once_cell::sync::Lazy;
use regex::Regex;

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{P}+").expect("punctuation regex compiles"));

/// Canonical comparison form shared by key text, recognized lines and claimed answers.
///
/// Folds case, turns punctuation runs into separators and collapses whitespace. Any caller
/// comparing key text against recognized text must route both sides through here.
pub fn normalize(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, " ");
    stripped.split_whitespace().collect::<Vec<&str>>().join(" ")
}

pub fn non_whitespace_char_count(text: &str) -> usize {
    text.chars()
        .filter(|character| !character.is_whitespace())
        .count()
}
