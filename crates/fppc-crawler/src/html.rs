//! Catalog HTML parsing (spec section 4.1 / 6 "Catalog HTTP"). The FPPC
//! search result page is not guaranteed to be well-formed, so parsing
//! relies only on a small family of regexes anchored to stable text
//! markers, exactly as spec section 6 requires.

use once_cell::sync::Lazy;
use regex::Regex;

/// One `<div class="hit">` entry on a search-results page.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub pdf_url: String,
    pub tags: String,
}

/// Best-effort metadata recovered from a title string (spec 4.1: three era
/// patterns tried in order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitleMetadata {
    pub requestor_name: Option<String>,
    pub letter_id: Option<String>,
    pub letter_date: Option<String>,
    pub city: Option<String>,
}

static HIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<div class="hit">\s*<a href="([^"]+)">([^<]+)</a>.*?<div class="hit-tags">Filed under:\s*([^<]*)</div>"#,
    )
    .unwrap()
});

static RESULT_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d{1,6})\s*results?").unwrap());
static PAGE_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Page\s+\d+\s+of\s+(\d+)").unwrap());

/// Extract every search-result hit from a catalog page.
pub fn parse_results(html: &str) -> Vec<SearchResult> {
    HIT_PATTERN
        .captures_iter(html)
        .map(|cap| SearchResult {
            title: cap[2].trim().to_string(),
            pdf_url: cap[1].trim().to_string(),
            tags: cap[3].trim().to_string(),
        })
        .collect()
}

/// Total result count advertised on a page, if present.
pub fn get_result_count(html: &str) -> Option<u32> {
    RESULT_COUNT.captures(html).and_then(|c| c[1].parse().ok())
}

/// Total page count advertised on a page, if present.
pub fn get_page_count(html: &str) -> Option<u32> {
    PAGE_COUNT.captures(html).and_then(|c| c[1].parse().ok())
}

static MODERN_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*-\s*([AIM]-\d{2}-\d{3})\s*-\s*(.+?)\s*-\s*(.+)$").unwrap());

static OLD_WITH_NAME_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+?),\s*(?:.+?)\s+Year:\s*(\d{4})\s*Advice Letter\s*#\s*(\S+)").unwrap()
});

static YEAR_ONLY_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Year:\s*(\d{4})\s*Advice Letter\s*#\s*(\S+)").unwrap());

static LETTER_NUM_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Advice Letter\s*#?\s*(\S+)").unwrap());

/// Parse a title string under the three era patterns (spec 4.1), falling
/// back through them in order until one matches. Never fails; an
/// unrecognisable title simply yields all-`None` metadata.
pub fn parse_title_metadata(title: &str) -> TitleMetadata {
    if let Some(cap) = MODERN_TITLE.captures(title) {
        return TitleMetadata {
            requestor_name: Some(cap[1].trim().to_string()),
            letter_id: Some(cap[2].trim().to_string()),
            letter_date: Some(cap[3].trim().to_string()),
            city: Some(cap[4].trim().to_string()),
        };
    }

    if let Some(cap) = OLD_WITH_NAME_TITLE.captures(title) {
        return TitleMetadata {
            requestor_name: Some(cap[1].trim().to_string()),
            letter_id: Some(cap[3].trim().to_string()),
            letter_date: None,
            city: None,
        };
    }

    if let Some(cap) = YEAR_ONLY_TITLE.captures(title) {
        return TitleMetadata {
            letter_id: Some(cap[2].trim().to_string()),
            ..Default::default()
        };
    }

    if let Some(cap) = LETTER_NUM_ONLY.captures(title) {
        return TitleMetadata {
            letter_id: Some(cap[1].trim().to_string()),
            ..Default::default()
        };
    }

    TitleMetadata::default()
}

static YEAR_IN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());
static YEAR_IN_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/advice-letters/(?:\d{4}-\d{4}/)?(\d{4})/").unwrap());

/// Derive a year from the "Filed under" tag string.
pub fn extract_year_from_tags(tags: &str) -> Option<i32> {
    YEAR_IN_TAGS.captures(tags).and_then(|c| c[1].parse().ok())
}

/// Derive a year from a PDF URL's year-partitioned path segment.
pub fn extract_year_from_url(pdf_url: &str) -> Option<i32> {
    YEAR_IN_URL.captures(pdf_url).and_then(|c| c[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="search-summary">123 results, Page 1 of 7</div>
        <div class="hit">
            <a href="/advice-letters/2024/24006.pdf">Smith - A-24-006 - January 23, 2024 - Sacramento</a>
            <div class="hit-tags">Filed under: Advice Letter, 2024</div>
        </div>
        <div class="hit">
            <a href="/advice-letters/1995-2015/2000/00-123.pdf">Year: 2000 Advice Letter # 00123</a>
            <div class="hit-tags">Filed under: Advice Letter, 2000</div>
        </div>
    "#;

    #[test]
    fn parses_result_and_page_counts() {
        assert_eq!(get_result_count(PAGE), Some(123));
        assert_eq!(get_page_count(PAGE), Some(7));
    }

    #[test]
    fn parses_two_hits_with_titles_and_tags() {
        let results = parse_results(PAGE);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].pdf_url, "/advice-letters/2024/24006.pdf");
        assert_eq!(results[0].tags, "Advice Letter, 2024");
    }

    #[test]
    fn modern_title_format_extracts_all_fields() {
        let meta = parse_title_metadata("Smith - A-24-006 - January 23, 2024 - Sacramento");
        assert_eq!(meta.requestor_name.as_deref(), Some("Smith"));
        assert_eq!(meta.letter_id.as_deref(), Some("A-24-006"));
        assert_eq!(meta.letter_date.as_deref(), Some("January 23, 2024"));
        assert_eq!(meta.city.as_deref(), Some("Sacramento"));
    }

    #[test]
    fn year_only_format_extracts_letter_id() {
        let meta = parse_title_metadata("Year: 2000 Advice Letter # 00123");
        assert_eq!(meta.letter_id.as_deref(), Some("00123"));
        assert!(meta.requestor_name.is_none());
    }

    #[test]
    fn old_with_name_format_extracts_name_and_id() {
        let meta = parse_title_metadata("Jones, Conflict of Interest Year: 1990 Advice Letter # 90024");
        assert_eq!(meta.requestor_name.as_deref(), Some("Jones"));
        assert_eq!(meta.letter_id.as_deref(), Some("90024"));
    }

    #[test]
    fn unrecognisable_title_yields_all_none() {
        let meta = parse_title_metadata("not a recognisable format at all");
        assert_eq!(meta, TitleMetadata::default());
    }

    #[test]
    fn year_derivation_prefers_tags_then_url() {
        assert_eq!(extract_year_from_tags("Advice Letter, 2019"), Some(2019));
        assert_eq!(
            extract_year_from_url("/advice-letters/1984-1994/1990/90001.pdf"),
            Some(1990)
        );
        assert_eq!(extract_year_from_tags("Advice Letter"), None);
    }
}
