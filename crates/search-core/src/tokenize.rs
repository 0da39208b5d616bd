use ahash::AHashSet;

/// Tokens shorter than this many characters are dropped.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Characters that survive lowercasing as part of a word. Everything else,
/// including accented letters outside this set, acts as a separator.
fn is_word_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || matches!(c, 'á' | 'é' | 'í' | 'ó' | 'ú' | 'ü' | 'ñ')
}

/// Lowercases `text`, splits it on runs of non-word characters and returns
/// the distinct tokens of at least two characters in first-occurrence order.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = AHashSet::new();
    let mut out = Vec::new();
    for token in lowered.split(|c: char| !is_word_char(c)) {
        if token.chars().count() >= MIN_TOKEN_CHARS && seen.insert(token) {
            out.push(token.to_string());
        }
    }
    out
}

/// Picks up to `max_tokens` of the longest tokens (by character count) to
/// use as candidate filter terms. Equal lengths keep their original order.
pub fn select_filter_tokens(tokens: &[String], max_tokens: usize) -> Vec<String> {
    let mut ordered = tokens.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|token| std::cmp::Reverse(token.chars().count()));
    ordered.into_iter().take(max_tokens).cloned().collect()
}
