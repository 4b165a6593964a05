//! Letter-identifier recovery/synthesis, header date and requestor parsing,
//! and document-type determination (spec 4.4 steps 3, 6, 7).

use once_cell::sync::Lazy;
use regex::Regex;

use fppc_core::models::DocumentType;

const HEADER_WINDOW: usize = 3000;
const TYPE_WINDOW: usize = 5000;

static FILE_NO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)File\s+No\.?\s*([AIM]?-?\d{2}-?\d{3})").unwrap());

/// Canonicalise a raw "File No." capture (any of the supported spellings) to
/// "X-YY-NNN", tolerating the OCR-misread prefixes 4→A, 1→I.
fn canonicalize(raw: &str) -> Option<String> {
    let upper = raw.to_uppercase();
    let cleaned: String = upper.chars().filter(|c| c.is_alphanumeric()).collect();
    let (prefix, rest): (char, &str) = match cleaned.chars().next()? {
        c @ ('A' | 'I' | 'M') => (c, &cleaned[1..]),
        '4' => ('A', &cleaned[1..]),
        '1' if cleaned.len() == 6 => ('I', &cleaned[1..]),
        c if c.is_ascii_digit() => ('A', cleaned.as_str()),
        _ => return None,
    };
    if rest.len() != 5 || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (year, seq) = rest.split_at(2);
    Some(format!("{prefix}-{year}-{seq}"))
}

/// Recover the letter identifier from the catalog row if present; otherwise
/// search the first ~3000 characters for a "File No." marker; otherwise
/// synthesise a deterministic placeholder from year and surrogate key (spec
/// 4.4 step 3). The `Z` prefix marks a placeholder as distinct from any
/// genuine A/I/M identifier.
pub fn recover_or_synthesize_letter_id(existing: Option<&str>, text: &str, year: i32, id: i32) -> String {
    if let Some(existing) = existing {
        if !existing.trim().is_empty() {
            return existing.trim().to_string();
        }
    }

    let window = &text[..text.len().min(HEADER_WINDOW)];
    if let Some(cap) = FILE_NO_PATTERN.captures(window) {
        if let Some(canonical) = canonicalize(&cap[1]) {
            return canonical;
        }
    }

    format!("Z-{:02}-{:04}", year.rem_euclid(100), id)
}

const MONTHS: [(&str, u32); 12] = [
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

fn fuzzy_month(word: &str) -> Option<u32> {
    let lower = word.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    let prefix = &lower[..3];
    MONTHS.iter().find(|(name, _)| *name == prefix).map(|(_, n)| *n)
}

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9OolI]{1,2})[/\-]([0-9OolI]{1,2})[/\-]([0-9OolI]{2,4})\b").unwrap());

static WORDY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})\b").unwrap());

static RE_REQUESTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*Re:\s*(?:Request (?:for|by)\s*)?([A-Z][A-Za-z.,'&\- ]{2,60})\s*$").unwrap()
});

static DEAR_SALUTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Dear\s+(Mr\.|Ms\.|Mrs\.|Dr\.)\s+([A-Z][A-Za-z'\-]+)").unwrap());

static CITY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*([A-Z][A-Za-z .]+),\s*California\s*\d{5}?\s*$").unwrap());

fn ocr_normalize_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'l' | 'I' => '1',
            other => other,
        })
        .collect()
}

/// Parsed header-region fields: date (ISO and as-written), requestor name
/// and title, city (spec 4.4 step 6).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderFields {
    pub date_iso: Option<String>,
    pub date_as_written: Option<String>,
    pub requestor_name: Option<String>,
    pub requestor_title: Option<String>,
    pub city: Option<String>,
}

pub fn parse_header_fields(text: &str) -> HeaderFields {
    let window = &text[..text.len().min(HEADER_WINDOW)];
    let mut fields = HeaderFields::default();

    if let Some(cap) = WORDY_DATE.captures(window) {
        if let Some(month) = fuzzy_month(&cap[1]) {
            let day: u32 = cap[2].parse().unwrap_or(0);
            let year: i32 = cap[3].parse().unwrap_or(0);
            if let Some(date) = chrono::NaiveDate::from_ymd_opt(year, month, day) {
                fields.date_iso = Some(date.format("%Y-%m-%d").to_string());
                fields.date_as_written = Some(cap[0].to_string());
            }
        }
    }

    if fields.date_iso.is_none() {
        if let Some(cap) = NUMERIC_DATE.captures(window) {
            let month: u32 = ocr_normalize_digits(&cap[1]).parse().unwrap_or(0);
            let day: u32 = ocr_normalize_digits(&cap[2]).parse().unwrap_or(0);
            let year_raw = ocr_normalize_digits(&cap[3]);
            let year: i32 = match year_raw.len() {
                2 => year_raw.parse::<i32>().unwrap_or(0) + 2000,
                _ => year_raw.parse().unwrap_or(0),
            };
            if let Some(date) = chrono::NaiveDate::from_ymd_opt(year, month, day) {
                fields.date_iso = Some(date.format("%Y-%m-%d").to_string());
                fields.date_as_written = Some(cap[0].to_string());
            }
        }
    }

    if let Some(cap) = RE_REQUESTOR.captures(window) {
        fields.requestor_name = Some(cap[1].trim().to_string());
    } else if let Some(cap) = DEAR_SALUTATION.captures(window) {
        fields.requestor_title = Some(cap[1].to_string());
        fields.requestor_name = Some(cap[2].to_string());
    }

    if let Some(cap) = CITY_LINE.captures(window) {
        fields.city = Some(cap[1].trim().to_string());
    }

    fields
}

static WITHDRAWAL_LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(this\s+(?:advice\s+)?letter\s+(?:is\s+)?(?:hereby\s+)?withdrawn|letter\s+of\s+withdrawal|withdraws?\s+(?:our|this)\s+(?:prior\s+)?advice)").unwrap()
});

static INFORMAL_ASSISTANCE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)informal\s+assistance").unwrap());

static FORMAL_OPINION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)formal\s+opinion").unwrap());

/// Determine document type from the letter-identifier prefix, with
/// overrides for withdrawal language and explicit type markers found in the
/// first ~5000 characters (spec 4.4 step 7).
pub fn determine_document_type(letter_id: &str, text: &str) -> DocumentType {
    let window = &text[..text.len().min(TYPE_WINDOW)];

    if WITHDRAWAL_LANGUAGE.is_match(window) {
        return DocumentType::Correspondence;
    }
    if FORMAL_OPINION_MARKER.is_match(window) {
        return DocumentType::Opinion;
    }
    if INFORMAL_ASSISTANCE_MARKER.is_match(window) {
        return DocumentType::InformalAdvice;
    }

    match letter_id.chars().next() {
        Some('A') => DocumentType::AdviceLetter,
        Some('I') => DocumentType::InformalAdvice,
        Some('M') => DocumentType::Opinion,
        _ => DocumentType::AdviceLetter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_letter_id_is_kept_verbatim() {
        assert_eq!(
            recover_or_synthesize_letter_id(Some("A-24-006"), "irrelevant text", 2024, 5),
            "A-24-006"
        );
    }

    #[test]
    fn recovers_from_file_no_marker_when_catalog_id_missing() {
        let text = "Re: Your request\n\nFile No. A-24-010\n\nDear Requestor:";
        assert_eq!(recover_or_synthesize_letter_id(None, text, 2024, 5), "A-24-010");
    }

    #[test]
    fn synthesizes_placeholder_when_no_id_recoverable() {
        let text = "No identifier anywhere in this document body at all.";
        assert_eq!(recover_or_synthesize_letter_id(None, text, 2024, 42), "Z-24-0042");
    }

    #[test]
    fn parses_wordy_date_and_city() {
        let text = "January 5, 2024\n\nSacramento, California 95814\n\nRe: Request by Jane Smith\n\nDear Ms. Smith:";
        let fields = parse_header_fields(text);
        assert_eq!(fields.date_iso.as_deref(), Some("2024-01-05"));
        assert_eq!(fields.city.as_deref(), Some("Sacramento"));
        assert_eq!(fields.requestor_name.as_deref(), Some("Jane Smith"));
    }

    #[test]
    fn parses_numeric_date_with_ocr_digit_confusion() {
        // "0l/05/2024" with an OCR-misread '1' as 'l'.
        let text = "0l/05/2024\n\nDear Mr. Jones:";
        let fields = parse_header_fields(text);
        assert_eq!(fields.date_iso.as_deref(), Some("2024-01-05"));
    }

    #[test]
    fn withdrawal_language_overrides_prefix_based_type() {
        let text = "This advice letter is hereby withdrawn in its entirety.";
        assert_eq!(determine_document_type("A-24-006", text), DocumentType::Correspondence);
    }

    #[test]
    fn prefix_alone_determines_type_absent_overrides() {
        assert_eq!(determine_document_type("I-24-006", "ordinary body text"), DocumentType::InformalAdvice);
        assert_eq!(determine_document_type("M-24-006", "ordinary body text"), DocumentType::Opinion);
    }
}
