//! Groq chat completions over IC HTTPS outcalls.
//!
//! The endpoint speaks the OpenAI chat-completions protocol. The API key is
//! sent as a bearer token and is never logged.

use candid::Nat;
use ic_cdk::api::management_canister::http_request::{
    http_request, CanisterHttpRequestArgument, HttpHeader, HttpMethod, HttpResponse, TransformArgs,
    TransformContext,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{CompletionRequest, Transport};
use crate::entities::PromptMessage;
use crate::service::errors::GatewayError;

pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const TRANSFORM_METHOD: &str = "transform_llm_response";

pub struct GroqTransport {
    api_key: String,
    cycles: u64,
    max_response_bytes: u64,
}

impl GroqTransport {
    pub fn new(api_key: impl Into<String>, cycles: u64, max_response_bytes: u64) -> Self {
        Self {
            api_key: api_key.into(),
            cycles,
            max_response_bytes,
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> Result<CanisterHttpRequestArgument, GatewayError> {
        let body = serde_json::to_vec(&ChatCompletionRequest {
            model: request.model.id(),
            messages: &request.messages,
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        })
        .map_err(|err| GatewayError::provider(format!("cannot encode Groq request: {err}")))?;

        Ok(CanisterHttpRequestArgument {
            url: GROQ_CHAT_URL.to_string(),
            max_response_bytes: Some(self.max_response_bytes),
            method: HttpMethod::POST,
            headers: vec![
                HttpHeader {
                    name: "Authorization".to_string(),
                    value: format!("Bearer {}", self.api_key),
                },
                HttpHeader {
                    name: "Content-Type".to_string(),
                    value: "application/json".to_string(),
                },
            ],
            body: Some(body),
            transform: None,
        })
    }
}

impl Transport for GroqTransport {
    async fn send(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let mut argument = self.build_request(&request)?;
        argument.transform = Some(TransformContext::from_name(
            TRANSFORM_METHOD.to_string(),
            vec![],
        ));
        let (response,) = http_request(argument, u128::from(self.cycles))
            .await
            .map_err(|(code, message)| {
                warn!(?code, "Groq outcall rejected");
                GatewayError::provider(format!("outcall rejected ({code:?}): {message}"))
            })?;
        info!(model = %request.model, status = %response.status, "Groq replied");
        read_response(response)
    }
}

/// Reduces the reply to the fields `read_response` consumes. Ids, timestamps
/// and usage figures differ per replica and would break consensus.
#[ic_cdk::query]
pub fn transform_llm_response(args: TransformArgs) -> HttpResponse {
    let body = normalize_body(&args.response.status, args.response.body);
    HttpResponse {
        status: args.response.status,
        headers: vec![],
        body,
    }
}

fn normalize_body(status: &Nat, body: Vec<u8>) -> Vec<u8> {
    let normalized = if *status == Nat::from(200u64) {
        serde_json::from_slice::<ChatCompletionResponse>(&body).and_then(|parsed| {
            let content = extract_text_response(parsed).ok();
            serde_json::to_vec(&ChatCompletionResponse {
                choices: vec![Choice {
                    message: ResponseMessage { content },
                }],
            })
        })
    } else {
        serde_json::from_slice::<ErrorResponse>(&body).and_then(|parsed| serde_json::to_vec(&parsed))
    };
    normalized.unwrap_or(body)
}

fn read_response(response: HttpResponse) -> Result<String, GatewayError> {
    if response.status == Nat::from(401u64) || response.status == Nat::from(403u64) {
        return Err(GatewayError::MissingSecret);
    }
    if response.status != Nat::from(200u64) {
        return Err(map_http_error(&response.status, &response.body));
    }

    let parsed: ChatCompletionResponse = serde_json::from_slice(&response.body)
        .map_err(|err| GatewayError::provider(format!("unreadable Groq response: {err}")))?;
    extract_text_response(parsed)
}

fn map_http_error(status: &Nat, body: &[u8]) -> GatewayError {
    let message = serde_json::from_slice::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());
    GatewayError::provider(format!("Groq returned HTTP {status}: {message}"))
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, GatewayError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GatewayError::provider("Groq returned no content in the response"))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Serialize, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Serialize, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelId;

    fn response(status: u64, body: &str) -> HttpResponse {
        HttpResponse {
            status: Nat::from(status),
            headers: vec![],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn request_carries_model_key_and_json_mode() {
        let transport = GroqTransport::new("gsk_test", 1, 2048);
        let argument = transport
            .build_request(&CompletionRequest {
                model: ModelId::Llama3_70b8192,
                messages: vec![PromptMessage::system("be brief"), PromptMessage::user("hi")],
                temperature: 0.7,
            })
            .unwrap();

        assert_eq!(argument.url, GROQ_CHAT_URL);
        assert_eq!(argument.max_response_bytes, Some(2048));
        assert!(argument.transform.is_none());
        assert!(argument
            .headers
            .iter()
            .any(|h| h.name == "Authorization" && h.value == "Bearer gsk_test"));

        let body: serde_json::Value = serde_json::from_slice(&argument.body.unwrap()).unwrap();
        assert_eq!(body["model"], "llama3-70b-8192");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    fn transformed(body: &str) -> HttpResponse {
        transform_llm_response(TransformArgs {
            response: HttpResponse {
                status: Nat::from(200u64),
                headers: vec![HttpHeader {
                    name: "x-request-id".to_string(),
                    value: body.len().to_string(),
                }],
                body: body.as_bytes().to_vec(),
            },
            context: vec![],
        })
    }

    #[test]
    fn transform_drops_per_request_fields() {
        let a = transformed(
            r#"{"id":"chatcmpl-1","object":"chat.completion","created":1700000001,
                "choices":[{"index":0,"message":{"role":"assistant","content":"{\"content\":\"x\"}"},"finish_reason":"stop"}],
                "usage":{"total_tokens":42,"total_time":0.31},"x_groq":{"id":"req_a"}}"#,
        );
        let b = transformed(
            r#"{"id":"chatcmpl-2","object":"chat.completion","created":1700000009,
                "choices":[{"index":0,"message":{"role":"assistant","content":"{\"content\":\"x\"}"},"finish_reason":"stop"}],
                "usage":{"total_tokens":42,"total_time":0.57},"x_groq":{"id":"req_b"}}"#,
        );

        assert_eq!(a, b);
        assert!(a.headers.is_empty());
        assert_eq!(read_response(a).unwrap(), r#"{"content":"x"}"#);
    }

    #[test]
    fn transform_keeps_error_message() {
        let out = transform_llm_response(TransformArgs {
            response: response(
                429,
                r#"{"error":{"message":"Rate limit reached","type":"tokens","code":"rate_limit_exceeded"}}"#,
            ),
            context: vec![],
        });
        assert_eq!(out.body, br#"{"error":{"message":"Rate limit reached"}}"#.to_vec());
        let err = read_response(out).unwrap_err();
        assert!(matches!(err, GatewayError::Provider { ref reason } if reason.contains("Rate limit reached")));
    }

    #[test]
    fn ok_response_yields_first_choice() {
        let text = read_response(response(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"content\":\"x\"}"}}]}"#,
        ))
        .unwrap();
        assert_eq!(text, r#"{"content":"x"}"#);
    }

    #[test]
    fn unauthorized_is_missing_secret() {
        let err = read_response(response(401, r#"{"error":{"message":"Invalid API Key"}}"#))
            .unwrap_err();
        assert_eq!(err, GatewayError::MissingSecret);
    }

    #[test]
    fn rate_limit_is_provider_error() {
        let err = read_response(response(429, r#"{"error":{"message":"Rate limit reached"}}"#))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Provider { ref reason } if reason.contains("Rate limit reached")));
    }

    #[test]
    fn empty_choices_is_provider_error() {
        let err = read_response(response(200, r#"{"choices":[]}"#)).unwrap_err();
        assert!(matches!(err, GatewayError::Provider { .. }));
    }
}
