//! Self-citation filter (spec section 4.5.3 / P5): a document must never
//! cite itself in its own prior-opinions list, under any of the identifier
//! variant spellings that appear in the corpus.

use std::collections::BTreeSet;

use fppc_core::models::CitationSet;

/// Generate every variant spelling `letter_id` (canonical "X-YY-NNN") might
/// appear under in free text: case variants, dashed vs compact, with and
/// without the prefix letter, OCR-misread prefix (4 for A, 1 for I), and the
/// digit-prefix-then-letter style seen in some 1980s scans ("82A060").
pub fn letter_id_variants(letter_id: &str) -> BTreeSet<String> {
    let mut variants = BTreeSet::new();
    let upper = letter_id.to_uppercase();
    let parts: Vec<&str> = upper.splitn(3, '-').collect();
    if parts.len() != 3 {
        variants.insert(letter_id.to_string());
        return variants;
    }
    let (prefix, year, seq) = (parts[0], parts[1], parts[2]);
    let Some(prefix_char) = prefix.chars().next() else {
        variants.insert(letter_id.to_string());
        return variants;
    };

    variants.insert(format!("{prefix}-{year}-{seq}"));
    variants.insert(format!("{prefix}-{year}-{seq}").to_lowercase());
    variants.insert(format!("{prefix}{year}{seq}"));
    variants.insert(format!("{year}-{seq}"));
    variants.insert(format!("{year}{seq}"));
    variants.insert(format!("{year}{prefix}{seq}"));

    let ocr_digit = match prefix_char {
        'A' => Some('4'),
        'I' => Some('1'),
        _ => None,
    };
    if let Some(digit) = ocr_digit {
        variants.insert(format!("{digit}-{year}-{seq}"));
        variants.insert(format!("{digit}{year}{seq}"));
    }

    variants
}

/// Drop any member of `citations.prior_opinions` that matches any variant
/// spelling of `letter_id`, mutating in place.
pub fn filter_self_citations(citations: &mut CitationSet, letter_id: &str) {
    let variants = letter_id_variants(letter_id);
    let upper_variants: BTreeSet<String> = variants.iter().map(|v| v.to_uppercase()).collect();
    citations
        .prior_opinions
        .retain(|candidate| !upper_variants.contains(&candidate.to_uppercase()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_canonical_and_dashless_and_prefixless_variants() {
        let variants = letter_id_variants("A-22-078");
        assert!(variants.contains("A-22-078"));
        assert!(variants.contains("A22078"));
        assert!(variants.contains("22-078"));
        assert!(variants.contains("22078"));
        assert!(variants.contains("4-22-078"));
    }

    #[test]
    fn filters_all_four_variant_forms_from_scenario_s4() {
        // Scenario S4: body mentions "A-22-078 and 22-078 and 22078 and A22078".
        let mut citations = CitationSet {
            government_code: vec![],
            regulations: vec![],
            prior_opinions: vec![
                "A-22-078".to_string(),
                "22-078".to_string(),
                "22078".to_string(),
                "A22078".to_string(),
                "A-23-001".to_string(),
            ],
            external: vec![],
            cited_by: vec![],
        };
        filter_self_citations(&mut citations, "A-22-078");
        assert_eq!(citations.prior_opinions, vec!["A-23-001".to_string()]);
    }

    #[test]
    fn does_not_filter_unrelated_opinions() {
        let mut citations = CitationSet {
            government_code: vec![],
            regulations: vec![],
            prior_opinions: vec!["I-21-050".to_string()],
            external: vec![],
            cited_by: vec![],
        };
        filter_self_citations(&mut citations, "A-22-078");
        assert_eq!(citations.prior_opinions, vec!["I-21-050".to_string()]);
    }
}
