use candid::CandidType;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModelId;
use crate::entities::{AiksProfile, ChatHistory, ChatTurn, PromptMessage};
use crate::gateway::{AssessmentResponse, StructuredGateway, Transport};
use crate::knowledge::{assessment_prompt, OPENING_GREETING, OPENING_OPTIONS};
use crate::service::errors::GatewayError;
use crate::utils::now;

pub const MAX_SUGGESTED_OPTIONS: usize = 5;

/// The AIKS interview. It never ends by itself; the user leaves it by moving
/// on to the matching screen.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AssessmentDialogue {
    history: ChatHistory,
    turn_count: u32,
}

fn opening_turn() -> ChatTurn {
    ChatTurn::assistant(OPENING_GREETING, now())
        .with_options(OPENING_OPTIONS.iter().map(|o| o.to_string()).collect())
}

impl AssessmentDialogue {
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn open(&mut self) -> bool {
        if !self.history.is_empty() {
            return false;
        }
        self.history.push(opening_turn());
        true
    }

    pub async fn submit<T: Transport>(
        &mut self,
        profile: &mut AiksProfile,
        input: &str,
        gateway: &StructuredGateway<T>,
        model: ModelId,
    ) -> Result<ChatTurn, GatewayError> {
        let opening = self.history.is_empty().then(opening_turn);
        let user_turn = ChatTurn::user(input, now());
        let conversation: Vec<PromptMessage> = opening
            .iter()
            .chain(self.history.iter())
            .chain(std::iter::once(&user_turn))
            .map(PromptMessage::from)
            .collect();

        let response: AssessmentResponse = gateway
            .complete(model, &assessment_prompt(&profile.summary()), &conversation)
            .await?;

        let added = profile.merge(&response.aiks_updates);
        let mut options = response.suggested_options;
        options.truncate(MAX_SUGGESTED_OPTIONS);

        self.history.extend(opening);
        self.history.push(user_turn);
        let reply = ChatTurn::assistant(response.next_question, now()).with_options(options);
        self.history.push(reply.clone());
        self.turn_count += 1;
        info!(
            turn = self.turn_count,
            new_items = added,
            profile_items = profile.len(),
            "assessment turn completed"
        );

        Ok(reply)
    }
}
