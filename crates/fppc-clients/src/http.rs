//! `reqwest`-backed [`RemoteApiClient`] against OpenAI-compatible
//! chat-completion endpoints (spec section 6 "Remote interfaces").

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, ClientResult, RemoteApiClient, TextResponse};

/// Credentials and endpoint configuration for one of the three model roles.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct HttpApiClient {
    http: reqwest::Client,
    vision_ocr: EndpointConfig,
    text_llm: EndpointConfig,
    vision_llm: EndpointConfig,
}

impl HttpApiClient {
    pub fn new(
        vision_ocr: EndpointConfig,
        text_llm: EndpointConfig,
        vision_llm: EndpointConfig,
        request_timeout: Duration,
    ) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            vision_ocr,
            text_llm,
            vision_llm,
        })
    }

    async fn post_chat(&self, endpoint: &EndpointConfig, messages: Vec<ChatMessage>) -> ClientResult<TextResponse> {
        let body = ChatRequest {
            model: &endpoint.model,
            messages,
            max_tokens: Some(4096),
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", endpoint.base_url.trim_end_matches('/')))
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited(format!("429 from {}", endpoint.base_url)));
        }
        if status.is_server_error() {
            return Err(ClientError::Transient(format!("{status} from {}", endpoint.base_url)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Upstream(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ClientError::EmptyResponse("no choices in response".to_string()))?;

        Ok(TextResponse {
            text: content,
            input_tokens: parsed.usage.prompt_tokens,
            output_tokens: parsed.usage.completion_tokens,
        })
    }
}

#[async_trait]
impl RemoteApiClient for HttpApiClient {
    async fn vision_ocr_page(&self, image_bytes: &[u8], mime_type: &str) -> ClientResult<TextResponse> {
        let data_url = format!("data:{mime_type};base64,{}", BASE64.encode(image_bytes));
        let messages = vec![ChatMessage {
            role: "user",
            content: vec![ContentPart::ImageUrl {
                image_url: ImageUrl { url: data_url },
            }],
        }];
        self.post_chat(&self.vision_ocr, messages).await
    }

    async fn text_llm_complete(&self, system_prompt: &str, user_prompt: &str) -> ClientResult<TextResponse> {
        let messages = vec![
            ChatMessage {
                role: "system",
                content: vec![ContentPart::Text { text: system_prompt.to_string() }],
            },
            ChatMessage {
                role: "user",
                content: vec![ContentPart::Text { text: user_prompt.to_string() }],
            },
        ];
        self.post_chat(&self.text_llm, messages).await
    }

    async fn vision_llm_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> ClientResult<TextResponse> {
        let data_url = format!("data:{mime_type};base64,{}", BASE64.encode(image_bytes));
        let messages = vec![
            ChatMessage {
                role: "system",
                content: vec![ContentPart::Text { text: system_prompt.to_string() }],
            },
            ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: user_prompt.to_string() },
                    ContentPart::ImageUrl { image_url: ImageUrl { url: data_url } },
                ],
            },
        ];
        self.post_chat(&self.vision_llm, messages).await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(url: &str) -> EndpointConfig {
        EndpointConfig {
            base_url: url.to_string(),
            model: "test-model".to_string(),
            api_key: "test-key".to_string(),
        }
    }

    #[tokio::test]
    async fn vision_ocr_page_parses_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"hello world"}}],"usage":{"prompt_tokens":10,"completion_tokens":2}}"#)
            .create_async()
            .await;

        let client = HttpApiClient::new(
            endpoint(&server.url()),
            endpoint(&server.url()),
            endpoint(&server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let resp = client.vision_ocr_page(b"fake-png-bytes", "image/png").await.unwrap();
        assert_eq!(resp.text, "hello world");
        assert_eq!(resp.input_tokens, 10);
        assert_eq!(resp.output_tokens, 2);
    }

    #[tokio::test]
    async fn rate_limited_status_maps_to_rate_limited_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let client = HttpApiClient::new(
            endpoint(&server.url()),
            endpoint(&server.url()),
            endpoint(&server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.text_llm_complete("sys", "user").await.unwrap_err();
        assert!(matches!(err, ClientError::RateLimited(_)));
    }

    #[tokio::test]
    async fn server_error_maps_to_transient() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let client = HttpApiClient::new(
            endpoint(&server.url()),
            endpoint(&server.url()),
            endpoint(&server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.vision_llm_complete("sys", "user", b"x", "image/png").await.unwrap_err();
        assert!(matches!(err, ClientError::Transient(_)));
    }
}
