//! Token-level sequence similarity (spec section 4.7 Phase 1: "token-level
//! sequence-similarity ratio after normalisation"), plus the description-mode
//! marker family used to detect vision-OCR "describes instead of transcribes"
//! fabrication (spec section 4.7, GLOSSARY "Description mode").
//!
//! The ratio implements the Ratcliff/Obershelp algorithm (recursive longest
//! common contiguous subsequence), matching the semantics of Python's
//! `difflib.SequenceMatcher.ratio()` that the source pipeline's QA scripts
//! use for the same comparison.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Lowercase, strip punctuation to whitespace, collapse whitespace — the
/// normalisation the canary scan and adjudication steps apply before
/// comparing OCR engines against each other (spec 4.7).
pub fn normalize_for_comparison(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped: String = lower
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token-level similarity ratio in `[0, 1]` between two raw (unnormalised)
/// texts. Both empty is perfect agreement; one empty and one not is total
/// disagreement.
pub fn token_similarity_ratio(a: &str, b: &str) -> f64 {
    let a_norm = normalize_for_comparison(a);
    let b_norm = normalize_for_comparison(b);

    let a_words: Vec<&str> = a_norm.split_whitespace().collect();
    let b_words: Vec<&str> = b_norm.split_whitespace().collect();

    if a_words.is_empty() && b_words.is_empty() {
        return 1.0;
    }
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }

    let matches = matching_block_total(&a_words, &b_words);
    (2.0 * matches as f64) / (a_words.len() + b_words.len()) as f64
}

/// Sum of lengths of all matching blocks found by recursively locating the
/// longest common contiguous run and splitting left/right of it.
fn matching_block_total(a: &[&str], b: &[&str]) -> usize {
    // b2j: word -> sorted list of indices into b where it occurs.
    let mut b2j: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, w) in b.iter().enumerate() {
        b2j.entry(w).or_default().push(j);
    }

    let mut total = 0usize;
    let mut stack = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }
        let (mi, mj, size) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        stack.push((alo, mi, blo, mj));
        stack.push((mi + size, ahi, mj + size, bhi));
    }
    total
}

fn longest_match(
    a: &[&str],
    b2j: &HashMap<&str, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best_i = alo;
    let mut best_j = blo;
    let mut best_size = 0usize;

    // j2len[j] = length of the match ending at b-index j for the current i.
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();
        if let Some(js) = b2j.get(a[i]) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j2len.get(&j.wrapping_sub(1)).copied().unwrap_or(0) + 1;
                new_j2len.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = new_j2len;
    }
    (best_i, best_j, best_size)
}

/// Description-mode marker family (spec 4.7 / GLOSSARY): vision-OCR
/// "describing" an image instead of transcribing it, e.g. "The image is a
/// scanned document...". Checked at the start of the text and at each
/// paragraph boundary.
static DESCRIPTION_MODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)the image (?:is|shows|contains|appears|displays|presents)",
        r"(?i)this (?:is a|appears to be a) scanned",
        r"(?i)the document (?:is|appears|shows|contains)",
        r"(?i)(?:scanned|photographed) (?:image|copy|document) of",
        r"(?i)the (?:text|content) (?:of the|in the) (?:image|document)",
        r"(?i)this image (?:is|shows|contains)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Whether `chunk` opens with a description-mode marker (checked against the
/// first 500 characters, mirroring the source's per-chunk scan window).
pub fn has_description_mode_marker(chunk: &str) -> bool {
    let window = &chunk[..chunk.len().min(500)];
    DESCRIPTION_MODE_PATTERNS.iter().any(|re| re.is_match(window))
}

/// Detect description-mode markers across an entire vision-OCR text: checked
/// at the start of the text and at each paragraph boundary (double newline).
/// Returns `(is_description_mode, description_paragraph_indices)`.
pub fn detect_description_mode(text: &str) -> (bool, Vec<usize>) {
    let mut flagged = Vec::new();
    for (i, chunk) in text.split("\n\n").enumerate() {
        if has_description_mode_marker(chunk) {
            flagged.push(i);
        }
    }
    (!flagged.is_empty(), flagged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        assert_eq!(token_similarity_ratio("hello world", "hello world"), 1.0);
    }

    #[test]
    fn both_empty_is_agreement() {
        assert_eq!(token_similarity_ratio("", ""), 1.0);
    }

    #[test]
    fn one_empty_is_total_disagreement() {
        assert_eq!(token_similarity_ratio("hello", ""), 0.0);
        assert_eq!(token_similarity_ratio("", "hello"), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_zero_and_one() {
        let ratio = token_similarity_ratio(
            "the quick brown fox jumps over the lazy dog",
            "the quick brown fox leaps over a sleepy dog",
        );
        assert!(ratio > 0.4 && ratio < 1.0, "ratio={ratio}");
    }

    #[test]
    fn normalisation_ignores_punctuation_and_case() {
        let ratio = token_similarity_ratio("Hello, World!", "hello world");
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn detects_description_mode_marker() {
        let text = "The image is a scanned document of an agency letter describing the facts.";
        let (flagged, _) = detect_description_mode(text);
        assert!(flagged);
    }

    #[test]
    fn clean_transcription_is_not_description_mode() {
        let text = "QUESTION\n\nMay a council member vote on a contract?";
        let (flagged, pages) = detect_description_mode(text);
        assert!(!flagged);
        assert!(pages.is_empty());
    }

    #[test]
    fn description_mode_detected_mid_document_paragraph() {
        let text = "QUESTION\n\nMay a council member vote?\n\nThe image shows a signature block.";
        let (flagged, pages) = detect_description_mode(text);
        assert!(flagged);
        assert_eq!(pages, vec![1]);
    }
}
