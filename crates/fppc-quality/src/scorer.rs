//! Quality Scorer (spec section 4.3, component C3): a pure function of
//! `(text, page_count)` producing a scalar in `[0, 1]` plus five component
//! sub-scores. Weights are frozen contractual constants (SPEC_FULL.md,
//! Open Question "Quality-scorer component weights").

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dictionary;

pub const WEIGHT_DENSITY: f64 = 0.15;
pub const WEIGHT_CHAR_QUALITY: f64 = 0.15;
pub const WEIGHT_WORD_STRUCTURAL: f64 = 0.15;
pub const WEIGHT_DICTIONARY: f64 = 0.40;
pub const WEIGHT_CONTENT_PATTERN: f64 = 0.15;

/// Below this density sub-score the final score is scaled proportionally
/// toward 0 (spec "Gating rule").
const DENSITY_GATE_THRESHOLD: f64 = 0.20;

/// Evenly-sampled subset size for the dictionary hit ratio (spec: "bounded,
/// evenly-sampled subset of ~200 tokens").
const DICTIONARY_SAMPLE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct QualityMetrics {
    pub final_score: f64,
    pub density_score: f64,
    pub char_quality_score: f64,
    pub word_structural_score: f64,
    pub dictionary_hit_ratio_score: f64,
    pub content_pattern_score: f64,

    // Diagnostics, consumed by `should_use_vision_ocr`.
    pub words_per_page: f64,
    pub alpha_ratio: f64,
    pub garbage_token_count: usize,
    pub dictionary_hit_ratio: f64,
}

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}/\d{1,2}/\d{2,4}|(january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2},?\s+\d{4})\b").unwrap()
});

static AGENCY_SELF_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(fair political practices commission|\bfppc\b)").unwrap()
});

static SECTION_HEADERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(question(s)?( presented)?|conclusion(s)?|facts|analysis|discussion|background|short answer)\s*:?\s*$").unwrap()
});

fn piecewise_linear(x: f64, points: &[(f64, f64)]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    if x <= points[0].0 {
        return points[0].1;
    }
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            if (x1 - x0).abs() < f64::EPSILON {
                return y1;
            }
            let t = (x - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    points.last().unwrap().1
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

fn looks_like_url(token: &str) -> bool {
    let lower = token.to_lowercase();
    lower.contains("http") || lower.contains("www.") || lower.contains('/')
}

/// Whether `token` survives the structural-quality battery (spec 4.3: "no
/// script-outside-Latin, not an excessively long non-URL token, at least
/// one vowel in tokens of length >= 3, no runs of 4+ identical characters,
/// no runs of 5+ consonants").
fn token_is_structurally_sound(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    if !token.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '\'' | '-' | '.' | ',' | ':' | '/' | '_')
    }) {
        return false;
    }
    if token.chars().any(|c| c.is_alphabetic() && !c.is_ascii()) {
        return false;
    }
    if token.len() > 25 && !looks_like_url(token) {
        return false;
    }
    let alpha_only: String = token.chars().filter(|c| c.is_alphabetic()).collect();
    if alpha_only.len() >= 3 && !alpha_only.chars().any(is_vowel) {
        return false;
    }

    let mut run_char = '\0';
    let mut run_len = 0usize;
    let mut consonant_run = 0usize;
    for c in alpha_only.chars() {
        if c == run_char {
            run_len += 1;
        } else {
            run_char = c;
            run_len = 1;
        }
        if run_len >= 4 {
            return false;
        }
        if is_vowel(c) {
            consonant_run = 0;
        } else {
            consonant_run += 1;
            if consonant_run >= 5 {
                return false;
            }
        }
    }
    true
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

fn sample_evenly<'a>(tokens: &[&'a str], sample_size: usize) -> Vec<&'a str> {
    if tokens.len() <= sample_size {
        return tokens.to_vec();
    }
    let step = tokens.len() as f64 / sample_size as f64;
    (0..sample_size)
        .map(|i| tokens[((i as f64) * step) as usize])
        .collect()
}

fn strip_punctuation(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

fn compute_density_score(word_count: usize, page_count: usize) -> (f64, f64) {
    let pages = page_count.max(1) as f64;
    let words_per_page = word_count as f64 / pages;
    let score = piecewise_linear(
        words_per_page,
        &[
            (0.0, 0.0),
            (50.0, 0.3),
            (200.0, 1.0),
            (600.0, 1.0),
            (1200.0, 0.3),
            (2000.0, 0.0),
        ],
    );
    (score, words_per_page)
}

fn compute_char_quality_score(text: &str) -> (f64, f64) {
    let printable_non_ws = text
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .count();
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
    if printable_non_ws == 0 {
        return (0.0, 0.0);
    }
    let ratio = alpha as f64 / printable_non_ws as f64;
    let score = piecewise_linear(
        ratio,
        &[(0.0, 0.0), (0.5, 0.0), (0.6, 0.5), (0.95, 1.0), (1.0, 1.0)],
    );
    (score, ratio)
}

fn compute_word_structural_score(tokens: &[&str]) -> (f64, usize) {
    if tokens.is_empty() {
        return (0.0, 0);
    }
    let mut sound = 0usize;
    for token in tokens {
        if token_is_structurally_sound(token) {
            sound += 1;
        }
    }
    let garbage = tokens.len() - sound;
    (sound as f64 / tokens.len() as f64, garbage)
}

fn compute_dictionary_hit_ratio(tokens: &[&str]) -> (f64, f64) {
    let candidates: Vec<String> = tokens
        .iter()
        .map(|t| strip_punctuation(t).to_lowercase())
        .filter(|t| t.len() >= 3 && !t.chars().all(|c| c.is_ascii_digit()))
        .collect();

    if candidates.is_empty() {
        return (0.0, 0.0);
    }
    let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
    let sample = sample_evenly(&refs, DICTIONARY_SAMPLE_SIZE);
    let hits = sample.iter().filter(|w| dictionary::contains(w)).count();
    let ratio = hits as f64 / sample.len() as f64;

    let score = piecewise_linear(ratio, &[(0.0, 0.0), (0.40, 0.0), (0.85, 1.0), (1.0, 1.0)]);
    (score, ratio)
}

fn compute_content_pattern_score(text: &str) -> f64 {
    let mut score = 0.0;
    if DATE_PATTERN.is_match(text) {
        score += 0.33;
    }
    if AGENCY_SELF_MENTION.is_match(text) {
        score += 0.33;
    }
    if SECTION_HEADERS.find_iter(text).count() >= 2 {
        score += 0.33;
    }
    score.min(1.0)
}

/// Compute the Quality Scorer's five sub-scores and final weighted value
/// for `text` extracted from a document of `page_count` pages. Pure and
/// side-effect free (P7): repeated invocation on identical input returns
/// the same value.
pub fn compute_quality_score(text: &str, page_count: usize) -> QualityMetrics {
    let tokens = tokenize(text);
    let word_count = tokens.len();

    let (density_score, words_per_page) = compute_density_score(word_count, page_count);
    let (char_quality_score, alpha_ratio) = compute_char_quality_score(text);
    let (word_structural_score, garbage_token_count) = compute_word_structural_score(&tokens);
    let (dictionary_hit_ratio_score, dictionary_hit_ratio) = compute_dictionary_hit_ratio(&tokens);
    let content_pattern_score = compute_content_pattern_score(text);

    let mut final_score = density_score * WEIGHT_DENSITY
        + char_quality_score * WEIGHT_CHAR_QUALITY
        + word_structural_score * WEIGHT_WORD_STRUCTURAL
        + dictionary_hit_ratio_score * WEIGHT_DICTIONARY
        + content_pattern_score * WEIGHT_CONTENT_PATTERN;

    if density_score < DENSITY_GATE_THRESHOLD {
        let scale = (density_score / DENSITY_GATE_THRESHOLD).clamp(0.0, 1.0);
        final_score *= scale;
    }

    QualityMetrics {
        final_score: final_score.clamp(0.0, 1.0),
        density_score,
        char_quality_score,
        word_structural_score,
        dictionary_hit_ratio_score,
        content_pattern_score,
        words_per_page,
        alpha_ratio,
        garbage_token_count,
        dictionary_hit_ratio,
    }
}

/// OCR-fallback decision (spec 4.3 "The Scorer is also the source of the
/// OCR-fallback decision"). Thresholds are caller-supplied (config, not
/// constants) per SPEC_FULL.md's Open Question decisions.
#[allow(clippy::too_many_arguments)]
pub fn should_use_vision_ocr(
    year: i32,
    metrics: &QualityMetrics,
    legacy_year_cutoff: i32,
    quality_threshold: f64,
    min_words_per_page: f64,
    min_alpha_ratio: f64,
    max_garbage_tokens: usize,
) -> bool {
    year < legacy_year_cutoff
        || metrics.final_score < quality_threshold
        || metrics.words_per_page < min_words_per_page
        || metrics.alpha_ratio < min_alpha_ratio
        || metrics.garbage_token_count > max_garbage_tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN_LETTER: &str = "QUESTION\n\nMay a council member vote on a contract with a \
        company in which they own stock? This letter is issued by the Fair Political Practices \
        Commission on January 5, 2024 in response to your request for advice.\n\nCONCLUSION\n\n\
        No. Under Government Code Section 87100 and Regulation 18700, the council member must \
        disqualify themselves from any decision affecting their financial interest in the \
        company because the economic interest creates a conflict that the Political Reform Act \
        was designed to prevent for public officials making governmental decisions.\n\n\
        FACTS\n\nThe requestor is a city council member whose spouse owns stock in a local \
        business entity that has applied for a permit before the council this year.\n\n\
        ANALYSIS\n\nThe Political Reform Act generally disqualifies a public official from \
        participating in a governmental decision if it is reasonably foreseeable that the \
        decision will have a material financial effect on the official's economic interests, \
        distinguishable from its effect on the public generally, as set forth in the statute.";

    #[test]
    fn clean_modern_letter_scores_high() {
        let metrics = compute_quality_score(CLEAN_LETTER, 2);
        assert!(
            metrics.final_score >= 0.60,
            "expected high score, got {:?}",
            metrics
        );
        assert!(metrics.content_pattern_score > 0.9);
    }

    #[test]
    fn empty_text_scores_zero() {
        let metrics = compute_quality_score("", 1);
        assert_eq!(metrics.final_score, 0.0);
        assert_eq!(metrics.density_score, 0.0);
    }

    #[test]
    fn garbage_ocr_output_scores_low() {
        let garbage = "xqz kkkk jjjjj wwwww qqqqqqqqq zzzxxx rrrrr bbbbccc";
        let metrics = compute_quality_score(garbage, 1);
        assert!(metrics.final_score < 0.3, "{:?}", metrics);
    }

    #[test]
    fn density_gate_scales_near_empty_text_toward_zero() {
        let sparse = "the a of";
        let metrics = compute_quality_score(sparse, 5);
        assert!(metrics.density_score < DENSITY_GATE_THRESHOLD);
        assert!(metrics.final_score < 0.1);
    }

    #[test]
    fn pure_function_is_deterministic() {
        let a = compute_quality_score(CLEAN_LETTER, 2);
        let b = compute_quality_score(CLEAN_LETTER, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn should_use_vision_ocr_triggers_on_legacy_year() {
        let metrics = compute_quality_score(CLEAN_LETTER, 2);
        assert!(should_use_vision_ocr(1980, &metrics, 1995, 0.55, 50.0, 0.5, 30));
        assert!(!should_use_vision_ocr(2020, &metrics, 1995, 0.10, 1.0, 0.1, 1000));
    }

    #[test]
    fn structural_check_rejects_consonant_runs_and_repeats() {
        assert!(!token_is_structurally_sound("strngths"));
        assert!(!token_is_structurally_sound("aaaaa"));
        assert!(token_is_structurally_sound("council"));
        assert!(token_is_structurally_sound(
            "http://example.com/page/about/document"
        ));
    }
}
