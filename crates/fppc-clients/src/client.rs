//! The three-method remote-API seam (spec section 9: "Remote-API clients:
//! behind a small interface with three methods"). `fppc-extractor` calls
//! `vision_ocr_page`, `fppc-synth` calls `text_llm_complete`, and
//! `fppc-verifier` calls `vision_llm_complete` for adjudication and full
//! re-transcription. Swapping [`crate::mock::MockApiClient`] in for
//! [`crate::http::HttpApiClient`] is a drop-in replacement for tests.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transient network failure: {0}")]
    Transient(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream returned an error response: {0}")]
    Upstream(String),

    #[error("response did not contain usable content: {0}")]
    EmptyResponse(String),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Text plus token usage, needed for cost accounting (spec 4.6/4.7: "Token
/// usage must be read from the response to account cost").
#[derive(Debug, Clone, Default)]
pub struct TextResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[async_trait]
pub trait RemoteApiClient: Send + Sync {
    /// OCR a single rendered page image (spec 4.4 step 5: "one page per
    /// request, with page-level rate limiting").
    async fn vision_ocr_page(&self, image_bytes: &[u8], mime_type: &str) -> ClientResult<TextResponse>;

    /// Section synthesis call (spec 4.6): system prompt enforces "JSON only,
    /// no fences"; caller is responsible for parsing the JSON envelope.
    async fn text_llm_complete(&self, system_prompt: &str, user_prompt: &str) -> ClientResult<TextResponse>;

    /// Vision-LLM adjudication (Verifier phase 2) and full re-transcription
    /// (phase 4), both driven by a strict verbatim-transcription prompt.
    async fn vision_llm_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> ClientResult<TextResponse>;
}
