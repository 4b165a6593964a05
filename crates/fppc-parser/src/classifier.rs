//! Heuristic Classifier (spec section 4.5.4): projects Government Code
//! references onto a fixed topic band table.

use fppc_core::models::Classification;

const CONFLICTS_OF_INTEREST: (i64, i64) = (87100, 87500);
const CAMPAIGN_FINANCE_BANDS: [(i64, i64); 2] = [(84100, 85800), (89500, 89600)];
const LOBBYING: (i64, i64) = (86100, 86400);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Topic {
    CampaignFinance,
    ConflictsOfInterest,
    Lobbying,
    Other,
}

impl Topic {
    fn as_str(self) -> &'static str {
        match self {
            Topic::CampaignFinance => "campaign_finance",
            Topic::ConflictsOfInterest => "conflicts_of_interest",
            Topic::Lobbying => "lobbying",
            Topic::Other => "other",
        }
    }
}

fn parse_leading_number(reference: &str) -> Option<i64> {
    let digits: String = reference.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn topic_for(number: i64) -> Topic {
    if number >= CONFLICTS_OF_INTEREST.0 && number <= CONFLICTS_OF_INTEREST.1 {
        Topic::ConflictsOfInterest
    } else if CAMPAIGN_FINANCE_BANDS.iter().any(|b| number >= b.0 && number <= b.1) {
        Topic::CampaignFinance
    } else if number >= LOBBYING.0 && number <= LOBBYING.1 {
        Topic::Lobbying
    } else {
        Topic::Other
    }
}

/// Classify a document by its Government Code citation list (spec 4.5.4,
/// P4). Primary topic is the most populous band; ties break by topic-name
/// alphabetical order (`Topic` variants are declared in that order).
pub fn classify_by_citations(government_code: &[String]) -> Classification {
    let mut counts = [0usize; 4]; // indexed by Topic discriminant order
    let mut total_valid = 0usize;

    for reference in government_code {
        if let Some(number) = parse_leading_number(reference) {
            let topic = topic_for(number);
            counts[topic as usize] += 1;
            total_valid += 1;
        }
    }

    if total_valid == 0 {
        return Classification {
            topic_primary: Topic::Other.as_str().to_string(),
            topic_secondary: None,
            tags: vec![],
            confidence: 0.0,
            method: "citation-band".to_string(),
        };
    }

    let mut ranked: Vec<(Topic, usize)> = [
        Topic::CampaignFinance,
        Topic::ConflictsOfInterest,
        Topic::Lobbying,
        Topic::Other,
    ]
    .into_iter()
    .map(|t| (t, counts[t as usize]))
    .filter(|(_, c)| *c > 0)
    .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let (primary, primary_count) = ranked[0];
    let secondary = ranked.get(1).map(|(t, _)| t.as_str().to_string());
    let confidence = primary_count as f64 / total_valid as f64;

    let tags: Vec<String> = ranked.iter().map(|(t, _)| t.as_str().to_string()).collect();

    Classification {
        topic_primary: primary.as_str().to_string(),
        topic_secondary: secondary,
        tags,
        confidence,
        method: "citation-band".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_of_interest_band_is_classified_correctly() {
        let citations = vec!["87100".to_string(), "87103(a)".to_string(), "87200".to_string()];
        let result = classify_by_citations(&citations);
        assert_eq!(result.topic_primary, "conflicts_of_interest");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn mixed_bands_pick_most_populous_with_secondary() {
        let citations = vec![
            "87100".to_string(),
            "87101".to_string(),
            "84100".to_string(),
        ];
        let result = classify_by_citations(&citations);
        assert_eq!(result.topic_primary, "conflicts_of_interest");
        assert_eq!(result.topic_secondary, Some("campaign_finance".to_string()));
    }

    #[test]
    fn no_valid_references_yields_other_with_zero_confidence() {
        let result = classify_by_citations(&[]);
        assert_eq!(result.topic_primary, "other");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn references_outside_all_bands_classify_as_other() {
        let citations = vec!["92000".to_string()];
        let result = classify_by_citations(&citations);
        assert_eq!(result.topic_primary, "other");
    }

    #[test]
    fn ties_break_by_topic_name_alphabetical_order() {
        // campaign_finance and conflicts_of_interest tied at one each;
        // "campaign_finance" sorts before "conflicts_of_interest".
        let citations = vec!["84100".to_string(), "87100".to_string()];
        let result = classify_by_citations(&citations);
        assert_eq!(result.topic_primary, "campaign_finance");
    }
}
