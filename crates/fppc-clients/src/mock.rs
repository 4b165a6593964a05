//! In-memory [`RemoteApiClient`] for tests (spec section A.4 ambient test
//! tooling: "remote collaborators are always the trait-based mock"). Each
//! method drains a queue of canned responses in call order; an empty queue
//! is a test bug, not a runtime condition, so it panics.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{ClientResult, RemoteApiClient, TextResponse};

#[derive(Default)]
pub struct MockApiClient {
    vision_ocr: Mutex<VecDeque<ClientResult<TextResponse>>>,
    text_llm: Mutex<VecDeque<ClientResult<TextResponse>>>,
    vision_llm: Mutex<VecDeque<ClientResult<TextResponse>>>,
}

fn ok(text: &str) -> ClientResult<TextResponse> {
    Ok(TextResponse {
        text: text.to_string(),
        input_tokens: 0,
        output_tokens: 0,
    })
}

impl MockApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_vision_ocr(&self, response: ClientResult<TextResponse>) {
        self.vision_ocr.lock().unwrap().push_back(response);
    }

    pub fn push_vision_ocr_text(&self, text: &str) {
        self.push_vision_ocr(ok(text));
    }

    pub fn push_text_llm(&self, response: ClientResult<TextResponse>) {
        self.text_llm.lock().unwrap().push_back(response);
    }

    pub fn push_text_llm_text(&self, text: &str) {
        self.push_text_llm(ok(text));
    }

    pub fn push_vision_llm(&self, response: ClientResult<TextResponse>) {
        self.vision_llm.lock().unwrap().push_back(response);
    }

    pub fn push_vision_llm_text(&self, text: &str) {
        self.push_vision_llm(ok(text));
    }
}

#[async_trait]
impl RemoteApiClient for MockApiClient {
    async fn vision_ocr_page(&self, _image_bytes: &[u8], _mime_type: &str) -> ClientResult<TextResponse> {
        self.vision_ocr
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockApiClient::vision_ocr_page called with an empty queue")
    }

    async fn text_llm_complete(&self, _system_prompt: &str, _user_prompt: &str) -> ClientResult<TextResponse> {
        self.text_llm
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockApiClient::text_llm_complete called with an empty queue")
    }

    async fn vision_llm_complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _image_bytes: &[u8],
        _mime_type: &str,
    ) -> ClientResult<TextResponse> {
        self.vision_llm
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockApiClient::vision_llm_complete called with an empty queue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_queued_responses_in_order() {
        let mock = MockApiClient::new();
        mock.push_text_llm_text("first");
        mock.push_text_llm_text("second");

        assert_eq!(mock.text_llm_complete("s", "u").await.unwrap().text, "first");
        assert_eq!(mock.text_llm_complete("s", "u").await.unwrap().text, "second");
    }

    #[tokio::test]
    #[should_panic(expected = "empty queue")]
    async fn panics_on_unexpected_call() {
        let mock = MockApiClient::new();
        let _ = mock.vision_ocr_page(b"x", "image/png").await;
    }
}
