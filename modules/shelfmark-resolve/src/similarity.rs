//! Title similarity scoring.
//!
//! Blends normalized edit distance (70%) with token-set overlap (30%).
//! Unicode-aware: edit distance runs over chars, not bytes, so CJK titles
//! score sensibly against their romanized or annotated variants.

/// Weight of the character-level component.
const STRING_WEIGHT: f64 = 0.7;
/// Weight of the token-overlap component.
const WORD_WEIGHT: f64 = 0.3;

/// Similarity between two titles in [0, 1]. Symmetric; identical inputs
/// score 1.0, an empty input scores 0.0.
pub fn score(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let norm_a = normalize(a);
    let norm_b = normalize(b);
    if norm_a == norm_b {
        return 1.0;
    }

    let chars_a: Vec<char> = norm_a.chars().collect();
    let chars_b: Vec<char> = norm_b.chars().collect();
    let max_len = chars_a.len().max(chars_b.len());
    let string_similarity = if max_len == 0 {
        1.0
    } else {
        1.0 - levenshtein(&chars_a, &chars_b) as f64 / max_len as f64
    };

    STRING_WEIGHT * string_similarity + WORD_WEIGHT * word_similarity(&norm_a, &norm_b)
}

/// Lowercase, squash punctuation to spaces, collapse whitespace runs, trim.
fn normalize(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_space = false;
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            // Whitespace and punctuation both separate tokens.
            pending_space = true;
        }
    }
    out
}

/// Classic single-character insert/delete/substitute edit distance,
/// rolling single-row formulation.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitute = prev_diag + usize::from(ca != cb);
            prev_diag = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(prev_diag + 1);
        }
    }
    row[b.len()]
}

/// Shared-token fraction over the larger token set. Both sets empty counts
/// as full agreement.
fn word_similarity(norm_a: &str, norm_b: &str) -> f64 {
    let words_a: std::collections::HashSet<&str> = norm_a.split_whitespace().collect();
    let words_b: std::collections::HashSet<&str> = norm_b.split_whitespace().collect();
    let max_words = words_a.len().max(words_b.len());
    if max_words == 0 {
        return 1.0;
    }
    words_a.intersection(&words_b).count() as f64 / max_words as f64
}
