//! Embedding Q&A payload construction (spec 4.4 step 8).

use fppc_core::models::{EmbeddingPayload, QaSource, Sections};

const FIRST_N_WORDS: usize = 50;

fn first_n_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

/// Build the embedding payload from cleaned Question/Conclusion when both
/// are present, tagged `extracted`; otherwise fall back to the first-N-words
/// summary. The first-N-words fallback is always stored, regardless of which
/// branch produced `qa_text`.
pub fn build_embedding_payload(sections: &Sections, full_text: &str) -> EmbeddingPayload {
    let first_n = first_n_words(full_text, FIRST_N_WORDS);

    match (&sections.question, &sections.conclusion) {
        (Some(q), Some(c)) => EmbeddingPayload {
            qa_text: format!("Q: {q}\nA: {c}"),
            qa_source: QaSource::Extracted,
            first_n_words: first_n,
            summary: None,
        },
        _ => EmbeddingPayload {
            qa_text: first_n.clone(),
            qa_source: QaSource::Extracted,
            first_n_words: first_n,
            summary: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_qa_text_from_question_and_conclusion_when_both_present() {
        let sections = Sections {
            question: Some("May a council member vote?".to_string()),
            conclusion: Some("No.".to_string()),
            ..Default::default()
        };
        let payload = build_embedding_payload(&sections, "QUESTION May a council member vote? CONCLUSION No.");
        assert_eq!(payload.qa_text, "Q: May a council member vote?\nA: No.");
        assert_eq!(payload.qa_source, QaSource::Extracted);
    }

    #[test]
    fn falls_back_to_first_n_words_when_sections_absent() {
        let sections = Sections::default();
        let text = (0..60).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let payload = build_embedding_payload(&sections, &text);
        assert_eq!(payload.qa_text.split_whitespace().count(), FIRST_N_WORDS);
        assert_eq!(payload.qa_text, payload.first_n_words);
    }
}
