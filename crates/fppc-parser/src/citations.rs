//! Citation Extractor (spec section 4.5.2): four independent, sorted,
//! de-duplicated reference lists scanned out of the document body.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use fppc_core::models::CitationSet;

/// Political Reform Act band (Government Code §§ 81000-91014).
const GOV_CODE_PRIMARY_BAND: (i64, i64) = (81000, 91014);
/// Government Code § 1090 is the common-law conflict-of-interest statute
/// enforced by district attorneys, not this agency; letters routinely
/// disclaim jurisdiction over it, so mentions are validated against a
/// narrow band and suppressed if every mention sits inside a disclaimer.
const GOV_CODE_DISCLAIMER_BAND: (i64, i64) = (1090, 1099);
/// Title 2 CCR §§ 18000-18999 regulations implementing the Act.
const REGULATION_BAND: (i64, i64) = (18000, 18999);

static GOV_CODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)Government\s+Code\s+[Ss]ection\s+(\d{3,5})(\([a-z0-9]+\))?").unwrap(),
        Regex::new(r"(?i)Gov\.?\s*Code\s*§{1,2}\s*(\d{3,5})(\([a-z0-9]+\))?").unwrap(),
        Regex::new(r"(?i)\bSection\s+(\d{3,5})(\([a-z0-9]+\))?\s+of\s+the\s+Government\s+Code").unwrap(),
        Regex::new(r"§\s*(\d{3,5})(\([a-z0-9]+\))?").unwrap(),
    ]
});

static DISCLAIMER_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(not\s+(?:providing|give|giving)\s+advice|no\s+advice|outside\s+(?:the\s+)?(?:jurisdiction|scope)|does\s+not\s+(?:interpret|apply|cover))[^.]{0,80}Section\s+1090").unwrap()
});

static REGULATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)Regulation\s+(\d{4,5})(\([a-z0-9]+\))?").unwrap(),
        Regex::new(r"(?i)2\s*C\.?C\.?R\.?\s*§{1,2}\s*(\d{4,5})(\([a-z0-9]+\))?").unwrap(),
        Regex::new(r"(?i)Cal\.?\s*Code\s*Regs\.?,?\s*tit\.?\s*2,?\s*§{1,2}\s*(\d{4,5})(\([a-z0-9]+\))?").unwrap(),
    ]
});

/// Dashed forms, one capture each: prefix letter (or OCR-misread digit),
/// two-digit year, three-digit sequence.
static PRIOR_OPINION_DASHED: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\b([AIM4])-(\d{2})-(\d{3})\b").unwrap(),
        Regex::new(r"\b([AIM])(\d{2})(\d{3})\b").unwrap(),
    ]
});

/// Older all-digit dashed form with no prefix letter, e.g. "82-060".
static PRIOR_OPINION_DIGITS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2})-(\d{3})\b").unwrap());

/// Contextual forms carrying a single combined reference in one capture.
static PRIOR_OPINION_CONTEXTUAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bIn\s+re\s+(?:Advice\s+Letter\s+)?(?:No\.?\s*)?([AIM]?-?\d{2}-?\d{3})").unwrap(),
        Regex::new(r"(?i)\bOpinion\s+No\.?\s*([AIM]?-?\d{2}-?\d{3})").unwrap(),
        Regex::new(r"(?i)\bFile\s+No\.?\s*([AIM]?-?\d{2}-?\d{3})").unwrap(),
    ]
});

static EXTERNAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\d+\s+Cal\.\s*(?:App\.)?\s*\d*(?:th|d|rd|st)?\s+\d+").unwrap(),
        Regex::new(r"\d+\s+Cal\.\s*Rptr\.\s*\d*(?:th|d|rd|st)?\s+\d+").unwrap(),
        Regex::new(r"\d+\s+U\.S\.\s+\d+").unwrap(),
        Regex::new(r"\d+\s+F\.\s*(?:2d|3d|Supp\.)\s+\d+").unwrap(),
    ]
});

fn normalize_spacing(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(" (", "(").replace(" )", ")")
}

fn parse_section_number(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn in_band(n: i64, band: (i64, i64)) -> bool {
    n >= band.0 && n <= band.1
}

/// Extract Government Code references, validated against the primary band
/// plus the disclaimer band, with disclaimer suppression.
pub fn extract_government_code(text: &str) -> Vec<String> {
    let mut hits: Vec<(String, bool)> = Vec::new(); // (formatted ref, is_disclaimer_band)
    for pattern in GOV_CODE_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            let num_str = &cap[1];
            let Some(num) = parse_section_number(num_str) else { continue };
            let subsection = cap.get(2).map(|m| m.as_str()).unwrap_or("");
            if in_band(num, GOV_CODE_PRIMARY_BAND) {
                hits.push((format!("{num_str}{subsection}"), false));
            } else if in_band(num, GOV_CODE_DISCLAIMER_BAND) {
                hits.push((format!("{num_str}{subsection}"), true));
            }
        }
    }

    // If every disclaimer-band mention sits inside a "not providing advice"
    // style sentence, suppress it entirely.
    let disclaimer_mentions: Vec<_> = hits.iter().filter(|(_, is_disclaimer)| *is_disclaimer).collect();
    let all_disclaimed = !disclaimer_mentions.is_empty() && DISCLAIMER_CONTEXT.is_match(text);

    let mut set: BTreeSet<String> = BTreeSet::new();
    for (value, is_disclaimer) in hits {
        if is_disclaimer && all_disclaimed {
            continue;
        }
        set.insert(normalize_spacing(&value));
    }
    set.into_iter().collect()
}

pub fn extract_regulations(text: &str) -> Vec<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for pattern in REGULATION_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            let num_str = &cap[1];
            let Some(num) = parse_section_number(num_str) else { continue };
            if in_band(num, REGULATION_BAND) {
                let subsection = cap.get(2).map(|m| m.as_str()).unwrap_or("");
                set.insert(normalize_spacing(&format!("{num_str}{subsection}")));
            }
        }
    }
    set.into_iter().collect()
}

/// Normalise a raw prior-opinion match (any supported variant form) to
/// canonical "X-YY-NNN".
fn canonicalize_prior_opinion(raw: &str) -> Option<String> {
    let upper = raw.to_uppercase();
    let digits_and_letter: String = upper.chars().filter(|c| c.is_alphanumeric()).collect();

    // Leading letter present (possibly OCR-misread digit standing in for one).
    let (prefix, rest): (char, &str) = match digits_and_letter.chars().next()? {
        'A' | 'I' | 'M' => (digits_and_letter.chars().next().unwrap(), &digits_and_letter[1..]),
        '4' => ('A', &digits_and_letter[1..]),
        '1' if digits_and_letter.len() == 6 => ('I', &digits_and_letter[1..]),
        c if c.is_ascii_digit() => ('A', digits_and_letter.as_str()),
        _ => return None,
    };

    if rest.len() != 5 || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (year, seq) = rest.split_at(2);
    Some(format!("{prefix}-{year}-{seq}"))
}

pub fn extract_prior_opinions(text: &str) -> Vec<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();

    for pattern in PRIOR_OPINION_DASHED.iter() {
        for cap in pattern.captures_iter(text) {
            let raw = format!("{}{}{}", &cap[1], &cap[2], &cap[3]);
            if let Some(canonical) = canonicalize_prior_opinion(&raw) {
                set.insert(canonical);
            }
        }
    }

    for cap in PRIOR_OPINION_DIGITS_ONLY.captures_iter(text) {
        let raw = format!("{}{}", &cap[1], &cap[2]);
        if let Some(canonical) = canonicalize_prior_opinion(&raw) {
            set.insert(canonical);
        }
    }

    for pattern in PRIOR_OPINION_CONTEXTUAL.iter() {
        for cap in pattern.captures_iter(text) {
            if let Some(canonical) = canonicalize_prior_opinion(&cap[1]) {
                set.insert(canonical);
            }
        }
    }

    set.into_iter().collect()
}

pub fn extract_external(text: &str) -> Vec<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for pattern in EXTERNAL_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            set.insert(normalize_spacing(m.as_str()));
        }
    }
    set.into_iter().collect()
}

/// Run all four extractors over `text`, returning the unfiltered citation
/// set (self-citation filtering is a separate pass, see [`crate::self_citation`]).
pub fn extract_citations(text: &str) -> CitationSet {
    CitationSet {
        government_code: extract_government_code(text),
        regulations: extract_regulations(text),
        prior_opinions: extract_prior_opinions(text),
        external: extract_external(text),
        cited_by: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_government_code_and_regulation_sections() {
        let text = "Under Government Code Section 87100, Regulation 18700 applies.";
        assert_eq!(extract_government_code(text), vec!["87100".to_string()]);
        assert_eq!(extract_regulations(text), vec!["18700".to_string()]);
    }

    #[test]
    fn disclaimer_suppresses_section_1090_when_only_mention() {
        let text = "This letter is not providing advice under Government Code Section 1090, which is enforced separately.";
        assert!(extract_government_code(text).is_empty());
    }

    #[test]
    fn section_1090_kept_when_discussed_substantively() {
        let text = "Government Code Section 1090 generally prohibits officials from having a financial interest in contracts they help make.";
        let result = extract_government_code(text);
        assert!(result.contains(&"1090".to_string()));
    }

    #[test]
    fn prior_opinion_canonical_and_ocr_misread_prefix_normalise() {
        let text = "See also A-22-078 and 4-22-079 for related guidance.";
        let result = extract_prior_opinions(text);
        assert!(result.contains(&"A-22-078".to_string()));
        assert!(result.contains(&"A-22-079".to_string()));
    }

    #[test]
    fn external_citation_captured_verbatim() {
        let text = "The court in 123 Cal.App.4th 456 reached a similar conclusion.";
        let result = extract_external(text);
        assert!(!result.is_empty());
    }

    #[test]
    fn results_are_sorted_and_deduplicated() {
        let text = "Section 87100 and Section 87100 again, plus Section 84100.";
        let result = extract_government_code(text);
        let mut sorted = result.clone();
        sorted.sort();
        assert_eq!(result, sorted);
        assert_eq!(result.iter().filter(|s| *s == "87100").count(), 1);
    }
}
