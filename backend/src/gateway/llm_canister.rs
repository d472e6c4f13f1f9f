use candid::{CandidType, Principal};
use ic_cdk::api::call::RejectionCode;
use ic_llm::{ChatMessage, Model};
use tracing::{info, warn};

use super::{CompletionRequest, Transport};
use crate::service::errors::GatewayError;

const LLM_CANISTER: &str = "w36hm-eqaaa-aaaal-qr76a-cai";

#[derive(CandidType)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

/// Completions served by the on-chain LLM canister. It has a single model, so
/// the requested `ModelId` only shows up in the logs.
pub struct LlmCanisterTransport;

impl Transport for LlmCanisterTransport {
    async fn send(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        info!(requested = %request.model, "routing completion to the LLM canister");
        let canister = Principal::from_text(LLM_CANISTER)
            .map_err(|err| GatewayError::provider(format!("invalid LLM canister id: {err}")))?;
        let result = ic_cdk::call::<_, (String,)>(canister, "v0_chat", (chat_request(&request),)).await;
        read_reply(result)
    }
}

fn chat_request(request: &CompletionRequest) -> ChatRequest {
    ChatRequest {
        model: Model::Llama3_1_8B.to_string(),
        messages: request.messages.iter().map(|m| m.to_ic_message()).collect(),
    }
}

fn read_reply(result: Result<(String,), (RejectionCode, String)>) -> Result<String, GatewayError> {
    let (reply,) = result.map_err(|(code, message)| {
        warn!(?code, "LLM canister call rejected");
        GatewayError::provider(format!("LLM canister rejected the call ({code:?}): {message}"))
    })?;
    if reply.trim().is_empty() {
        return Err(GatewayError::provider("LLM canister returned an empty reply"));
    }
    Ok(reply)
}
