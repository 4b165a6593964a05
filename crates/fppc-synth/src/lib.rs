//! LLM Section Synthesiser (spec section 4.6, component C6): for Documents
//! whose structural section parse fell short of the confidence threshold,
//! call a remote text-LLM to produce synthetic Question/Conclusion
//! summaries, refine the document type, and generate a one-line summary.

pub mod envelope;
pub mod error;

pub use error::{SynthError, SynthResult};

use std::path::Path;

use tracing::warn;

use fppc_clients::{with_retry, ClientResult, RemoteApiClient, RetryPolicy};
use fppc_core::models::{Document, QaSource, StructuredRecord};
use fppc_core::{CoreResult, PipelineConfig, StateStore};

use envelope::{parse_envelope, refine_document_type, SynthEnvelope};

/// Input is truncated to the first ~12,000 characters, at a word boundary
/// (spec 4.6: "the first ~12,000 characters of text truncated at a word
/// boundary").
const MAX_INPUT_CHARS: usize = 12_000;

/// Rough chars-per-token heuristic used only for the cost-estimation
/// dry-run, which must project a cost without making any API calls.
const CHARS_PER_TOKEN_ESTIMATE: f64 = 4.0;
const OUTPUT_TOKENS_ESTIMATE: u32 = 500;

const SYSTEM_PROMPT: &str = "You are reviewing a California FPPC advice letter. \
Respond with JSON only, no markdown fences, no commentary. The JSON object must have exactly \
these fields: document_type, is_response, question, question_synthetic, conclusion, \
conclusion_synthetic, summary, extraction_confidence, notes. question/conclusion should hold \
text you found verbatim in the document if a standard Question/Conclusion section is present, \
or null otherwise; question_synthetic/conclusion_synthetic should always hold your own \
synthesised Q&A restatement of the document's substance; summary is one sentence; \
extraction_confidence is a number in [0,1]; notes is a list of short strings.";

fn token_cost(input_tokens: u32, output_tokens: u32, input_rate: f64, output_rate: f64) -> f64 {
    (input_tokens as f64 / 1_000_000.0) * input_rate + (output_tokens as f64 / 1_000_000.0) * output_rate
}

fn truncate_at_word_boundary(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    match text[..end].rfind(char::is_whitespace) {
        Some(boundary) => &text[..boundary],
        None => &text[..end],
    }
}

fn build_user_prompt(record: &StructuredRecord) -> String {
    let excerpt = truncate_at_word_boundary(&record.content.full_text, MAX_INPUT_CHARS);
    format!(
        "Letter ID: {}\nDocument type (current best guess): {}\n\nDocument text:\n{excerpt}",
        record.letter_id,
        record.parsed.document_type.as_str(),
    )
}

/// Outcome of synthesising one document.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthOutcome {
    Synthesised {
        letter_id: String,
        confidence: f64,
    },
    Error,
}

/// Projected cost of running synthesis over a set of pending documents,
/// without making any API calls (spec 4.6: "a cost-estimation dry-run mode
/// ... reports a projection without any API calls").
#[derive(Debug, Clone, Default)]
pub struct CostEstimate {
    pub documents: usize,
    pub estimated_input_tokens: u64,
    pub estimated_output_tokens: u64,
    pub estimated_usd: f64,
}

pub struct Synthesiser {
    store: StateStore,
    config: PipelineConfig,
    client: std::sync::Arc<dyn RemoteApiClient>,
}

impl Synthesiser {
    pub fn new(store: StateStore, config: PipelineConfig, client: std::sync::Arc<dyn RemoteApiClient>) -> Self {
        Self { store, config, client }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn pending(&self, limit: Option<i64>) -> CoreResult<Vec<Document>> {
        self.store.pending_llm_synthesis(limit)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(3, self.config.retry_backoff_base_ms, self.config.rate_limit_backoff_base_ms)
    }

    fn load_record(&self, doc: &Document) -> SynthResult<(std::path::PathBuf, StructuredRecord)> {
        let json_path = doc.json_path.as_deref().ok_or(SynthError::RecordMissing(doc.id))?;
        let path = Path::new(json_path).to_path_buf();
        let body = std::fs::read_to_string(&path)?;
        let record: StructuredRecord = serde_json::from_str(&body)?;
        Ok((path, record))
    }

    /// Call the text LLM once, with transient/rate-limit retry handled by
    /// [`with_retry`] (spec 4.6: "up to 3 attempts with exponential backoff
    /// on rate-limit and 5xx").
    async fn call_llm(&self, user_prompt: &str) -> ClientResult<fppc_clients::TextResponse> {
        let policy = self.retry_policy();
        with_retry(policy, "text_llm_complete", || self.client.text_llm_complete(SYSTEM_PROMPT, user_prompt)).await
    }

    /// Obtain a parsed envelope for `user_prompt`. Tries the verbatim JSON
    /// parse, then the fence-stripped largest-brace-region parse; if both
    /// fail, makes one more LLM call and tries both parses again before
    /// giving up (spec 4.6 robustness policy).
    async fn synthesise_envelope(&self, user_prompt: &str) -> SynthResult<(SynthEnvelope, u32, u32)> {
        let response = self.call_llm(user_prompt).await?;
        if let Some(envelope) = parse_envelope(&response.text) {
            return Ok((envelope, response.input_tokens, response.output_tokens));
        }

        warn!("LLM response was not directly parseable JSON, retrying once");
        let retry_response = self.call_llm(user_prompt).await?;
        let total_input = response.input_tokens + retry_response.input_tokens;
        let total_output = response.output_tokens + retry_response.output_tokens;
        match parse_envelope(&retry_response.text) {
            Some(envelope) => Ok((envelope, total_input, total_output)),
            None => Err(SynthError::Envelope(retry_response.text)),
        }
    }

    /// Write-back policy (spec 4.6): synthetic Q/Conclusion always overwrite
    /// the synthetic fields; extracted Q/Conclusion are overwritten only if
    /// absent; notes are appended; the embedding Q&A text and provenance tag
    /// are rebuilt, preferring extracted text and falling back to synthetic.
    fn apply_envelope(&self, record: &mut StructuredRecord, envelope: &SynthEnvelope) {
        record.sections.question_synthetic = envelope.question_synthetic.clone();
        record.sections.conclusion_synthetic = envelope.conclusion_synthetic.clone();

        if record.sections.question.is_none() {
            record.sections.question = envelope.question.clone();
        }
        if record.sections.conclusion.is_none() {
            record.sections.conclusion = envelope.conclusion.clone();
        }
        record.sections.notes.extend(envelope.notes.iter().cloned());

        if let Some(label) = &envelope.document_type {
            if let Some(refined) = refine_document_type(label) {
                record.parsed.document_type = refined;
            }
        }

        let question = record.sections.question.as_deref().or(record.sections.question_synthetic.as_deref());
        let conclusion = record.sections.conclusion.as_deref().or(record.sections.conclusion_synthetic.as_deref());
        let qa_text = match (question, conclusion) {
            (Some(q), Some(c)) => format!("Q: {q}\nA: {c}"),
            (Some(q), None) => format!("Q: {q}"),
            (None, Some(c)) => format!("A: {c}"),
            (None, None) => String::new(),
        };
        let qa_source = match (
            record.sections.question.is_some() || record.sections.conclusion.is_some(),
            record.sections.question_synthetic.is_some() || record.sections.conclusion_synthetic.is_some(),
        ) {
            (true, true) => QaSource::Mixed,
            (true, false) => QaSource::Extracted,
            (false, true) => QaSource::Synthetic,
            (false, false) => QaSource::Extracted,
        };
        record.embedding.qa_text = qa_text;
        record.embedding.qa_source = qa_source;
        if envelope.summary.is_some() {
            record.embedding.summary = envelope.summary.clone();
        }

        record.sections.confidence = envelope.extraction_confidence;
        record.extraction.section_confidence = envelope.extraction_confidence;
        record.extraction.llm_synthesised_at = Some(fppc_core::models::now_string());
    }

    /// Synthesise one document end to end: load its record, call the LLM,
    /// apply the write-back policy, persist the record, and mark the State
    /// Store row synthesised. Failures are caught and reported as
    /// [`SynthOutcome::Error`] rather than propagated, mirroring the
    /// Extractor's `extract_one` convention.
    pub async fn synthesise_one(&self, doc: &Document) -> CoreResult<SynthOutcome> {
        let (path, mut record) = match self.load_record(doc) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(id = doc.id, error = %err, "synthesis failed to load record");
                return Ok(SynthOutcome::Error);
            }
        };

        let user_prompt = build_user_prompt(&record);
        let (envelope, input_tokens, output_tokens) = match self.synthesise_envelope(&user_prompt).await {
            Ok(result) => result,
            Err(err) => {
                warn!(id = doc.id, error = %err, "synthesis abandoned after retries");
                return Ok(SynthOutcome::Error);
            }
        };

        self.apply_envelope(&mut record, &envelope);
        record.extraction.api_cost_usd += token_cost(
            input_tokens,
            output_tokens,
            self.config.text_llm_input_cost_per_million,
            self.config.text_llm_output_cost_per_million,
        );

        let json = match serde_json::to_string_pretty(&record) {
            Ok(json) => json,
            Err(err) => {
                warn!(id = doc.id, error = %err, "failed to serialise synthesised record");
                return Ok(SynthOutcome::Error);
            }
        };
        if let Err(err) = std::fs::write(&path, json) {
            warn!(id = doc.id, error = %err, "failed to write synthesised record");
            return Ok(SynthOutcome::Error);
        }

        self.store.mark_synthesised(doc.id, envelope.extraction_confidence as f32)?;

        Ok(SynthOutcome::Synthesised {
            letter_id: record.letter_id,
            confidence: envelope.extraction_confidence,
        })
    }

    /// Cost-estimation dry-run (spec 4.6): walks the pending set and
    /// projects input/output token counts and a USD estimate with no API
    /// calls at all.
    pub fn estimate_cost(&self, limit: Option<i64>) -> SynthResult<CostEstimate> {
        let pending = self.store.pending_llm_synthesis(limit)?;
        let mut estimate = CostEstimate::default();
        for doc in &pending {
            let (_, record) = match self.load_record(doc) {
                Ok(pair) => pair,
                Err(_) => continue,
            };
            let prompt = build_user_prompt(&record);
            let input_tokens = (prompt.len() as f64 / CHARS_PER_TOKEN_ESTIMATE).ceil() as u64;
            estimate.documents += 1;
            estimate.estimated_input_tokens += input_tokens;
            estimate.estimated_output_tokens += OUTPUT_TOKENS_ESTIMATE as u64;
            estimate.estimated_usd += token_cost(
                input_tokens as u32,
                OUTPUT_TOKENS_ESTIMATE,
                self.config.text_llm_input_cost_per_million,
                self.config.text_llm_output_cost_per_million,
            );
        }
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fppc_clients::MockApiClient;
    use fppc_core::models::{
        Classification, Content, EmbeddingPayload, Extraction, ExtractionMethod, Fidelity, ParsedMetadata,
        Sections, SourceMetadata,
    };
    use fppc_core::models::{CitationSet, DocumentType};
    use fppc_core::models::NewDocument;

    fn sample_record(needs: bool) -> StructuredRecord {
        StructuredRecord {
            id: 1,
            year: 2024,
            letter_id: "A-24-001".into(),
            pdf_url: "https://fppc.ca.gov/a.pdf".into(),
            pdf_sha256: "abc".into(),
            local_pdf_path: "raw/2024/a.pdf".into(),
            source_metadata: SourceMetadata::default(),
            extraction: Extraction {
                method: ExtractionMethod::VisionOcr,
                extracted_at: "2024-01-01T00:00:00+00:00".into(),
                quality_score: 0.4,
                page_count: 2,
                word_count: 120,
                char_count: 700,
                api_cost_usd: 0.0,
                section_confidence: 0.3,
                needs_llm_extraction: needs,
                llm_synthesised_at: None,
            },
            content: Content {
                full_text: "This document discusses whether a council member may vote.".into(),
                formatted_text: None,
            },
            parsed: ParsedMetadata {
                document_type: DocumentType::AdviceLetter,
                ..Default::default()
            },
            sections: Sections {
                question: None,
                conclusion: None,
                parse_method: "legacy".into(),
                confidence: 0.3,
                has_standard_format: false,
                ..Default::default()
            },
            citations: CitationSet::default(),
            classification: Classification::default(),
            embedding: EmbeddingPayload::default(),
            fidelity: Fidelity::default(),
        }
    }

    fn insert_doc(store: &StateStore, path: &std::path::Path) -> Document {
        store
            .insert_new_document(&NewDocument {
                pdf_url: "https://fppc.ca.gov/a.pdf".into(),
                title_text: None,
                year_tag: Some(2024),
                tags: None,
                source_page_url: None,
                requestor_name: None,
                letter_id: Some("A-24-001".into()),
                letter_date: None,
                city: None,
            })
            .unwrap();
        let doc = store.get_by_url("https://fppc.ca.gov/a.pdf").unwrap().unwrap();
        store.mark_downloaded(doc.id, 10, "aa").unwrap();
        store
            .mark_extracted(doc.id, "vision-ocr", 0.4, 2, 120, 0.3, &path.to_string_lossy(), true)
            .unwrap();
        store.get_by_id(doc.id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn synthesises_and_applies_write_back_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.json");
        std::fs::write(&path, serde_json::to_string(&sample_record(true)).unwrap()).unwrap();

        let store = StateStore::open_in_memory().unwrap();
        let doc = insert_doc(&store, &path);

        let mock = MockApiClient::new();
        mock.push_text_llm_text(
            r#"{"document_type":"advice-letter","is_response":true,"question":null,"question_synthetic":"May a council member vote?","conclusion":null,"conclusion_synthetic":"No, under the conflict-of-interest rules.","summary":"Council member conflict of interest.","extraction_confidence":0.77,"notes":["non-standard layout"]}"#,
        );

        let synth = Synthesiser::new(store.clone(), PipelineConfig::default(), std::sync::Arc::new(mock));
        let outcome = synth.synthesise_one(&doc).await.unwrap();
        assert_eq!(
            outcome,
            SynthOutcome::Synthesised { letter_id: "A-24-001".into(), confidence: 0.77 }
        );

        let refreshed = store.get_by_id(doc.id).unwrap().unwrap();
        assert!(!refreshed.needs_llm_extraction());
        assert!(refreshed.llm_extracted_at.is_some());

        let record: StructuredRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(record.sections.question_synthetic.as_deref(), Some("May a council member vote?"));
        assert_eq!(record.embedding.qa_source, QaSource::Synthetic);
        assert!(record.sections.notes.contains(&"non-standard layout".to_string()));
    }

    #[tokio::test]
    async fn falls_back_to_fence_stripped_parse_after_bad_first_reply() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.json");
        std::fs::write(&path, serde_json::to_string(&sample_record(true)).unwrap()).unwrap();

        let store = StateStore::open_in_memory().unwrap();
        let doc = insert_doc(&store, &path);

        let mock = MockApiClient::new();
        mock.push_text_llm_text("I'm not able to help with that.");
        mock.push_text_llm_text("```json\n{\"is_response\": true, \"extraction_confidence\": 0.6}\n```");

        let synth = Synthesiser::new(store.clone(), PipelineConfig::default(), std::sync::Arc::new(mock));
        let outcome = synth.synthesise_one(&doc).await.unwrap();
        assert_eq!(
            outcome,
            SynthOutcome::Synthesised { letter_id: "A-24-001".into(), confidence: 0.6 }
        );
    }

    #[test]
    fn truncates_at_word_boundary() {
        let text = "word ".repeat(10);
        let truncated = truncate_at_word_boundary(&text, 12);
        assert!(!truncated.ends_with("wor"));
        assert!(text.starts_with(truncated));
    }
}
