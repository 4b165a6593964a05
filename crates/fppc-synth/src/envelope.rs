//! The LLM's strict-JSON response envelope (spec section 4.6: "a strict-JSON
//! envelope with fields document_type, is_response, question,
//! question_synthetic, conclusion, conclusion_synthetic, summary,
//! extraction_confidence, notes") and the fence-stripping fallback parser
//! that tolerates a chatty model wrapping its JSON in markdown or prose.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SynthEnvelope {
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub is_response: bool,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub question_synthetic: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub conclusion_synthetic: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default = "default_confidence")]
    pub extraction_confidence: f64,
    #[serde(default)]
    pub notes: Vec<String>,
}

fn default_confidence() -> f64 {
    0.5
}

/// Parse the envelope, first verbatim, then — if that fails — after
/// stripping markdown fences/surrounding prose and re-parsing the largest
/// `{...}` region found (spec 4.6 robustness policy).
pub fn parse_envelope(raw: &str) -> Option<SynthEnvelope> {
    if let Ok(envelope) = serde_json::from_str::<SynthEnvelope>(raw) {
        return Some(envelope);
    }
    let region = largest_brace_region(raw)?;
    serde_json::from_str::<SynthEnvelope>(region).ok()
}

/// Strip fences and find the widest-spanning `{...}` substring — "widest" in
/// the sense of the first `{` to the last `}`, which tolerates a model that
/// prefixes or suffixes commentary around a single well-formed object.
fn largest_brace_region(raw: &str) -> Option<&str> {
    let without_fences = raw.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    let start = without_fences.find('{')?;
    let end = without_fences.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&without_fences[start..=end])
}

/// Fixed document-type refinement map (spec 4.6: "The LLM may refine the
/// document-type classification via a fixed string->enum map"). Unknown
/// labels are ignored, leaving the extractor's classification untouched.
pub fn refine_document_type(label: &str) -> Option<fppc_core::models::DocumentType> {
    use fppc_core::models::DocumentType::*;
    match label.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
        "advice_letter" => Some(AdviceLetter),
        "informal_advice" => Some(InformalAdvice),
        "opinion" => Some(Opinion),
        "correspondence" => Some(Correspondence),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verbatim_json() {
        let raw = r#"{"document_type":"advice-letter","is_response":true,"question":null,"question_synthetic":"May a council member vote?","conclusion":null,"conclusion_synthetic":"No.","summary":"Conflict of interest.","extraction_confidence":0.82,"notes":["synthesised"]}"#;
        let envelope = parse_envelope(raw).unwrap();
        assert_eq!(envelope.question_synthetic.as_deref(), Some("May a council member vote?"));
        assert_eq!(envelope.extraction_confidence, 0.82);
    }

    #[test]
    fn strips_fences_and_surrounding_prose() {
        let raw = "Sure, here's the JSON:\n```json\n{\"is_response\": true, \"summary\": \"ok\"}\n```\nLet me know if you need anything else.";
        let envelope = parse_envelope(raw).unwrap();
        assert!(envelope.is_response);
        assert_eq!(envelope.summary.as_deref(), Some("ok"));
    }

    #[test]
    fn unparseable_text_yields_none() {
        assert!(parse_envelope("not json at all").is_none());
    }

    #[test]
    fn refines_known_labels_only() {
        assert_eq!(refine_document_type("Informal Advice"), Some(fppc_core::models::DocumentType::InformalAdvice));
        assert_eq!(refine_document_type("something-else"), None);
    }
}
