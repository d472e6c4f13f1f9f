use std::collections::BTreeMap;

use tracing::info;

use crate::config::ModelId;
use crate::entities::{AdvisorThread, ChatTurn, Profession, PromptMessage};
use crate::gateway::{ChatResponse, StructuredGateway, Transport};
use crate::knowledge::{advisor_prompt, advisor_welcome, ADVISOR_QUESTIONS};
use crate::service::errors::GatewayError;
use crate::utils::now;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdvisorChat {
    threads: BTreeMap<String, AdvisorThread>,
}

fn seeded_thread(title: &str) -> AdvisorThread {
    AdvisorThread {
        title: title.to_string(),
        turns: vec![ChatTurn::assistant(advisor_welcome(title), now())],
    }
}

impl AdvisorChat {
    pub fn suggested_questions() -> &'static [&'static str] {
        &ADVISOR_QUESTIONS
    }

    pub fn get(&self, title: &str) -> Option<&AdvisorThread> {
        self.threads.get(title)
    }

    pub fn titles(&self) -> Vec<String> {
        self.threads.keys().cloned().collect()
    }

    /// The thread for `title`, seeded with a welcome turn on first access.
    pub fn thread(&mut self, title: &str) -> &AdvisorThread {
        self.threads
            .entry(title.to_string())
            .or_insert_with(|| seeded_thread(title))
    }

    /// Earlier turns of the thread are not sent to the model.
    pub async fn ask<T: Transport>(
        &mut self,
        profession: &Profession,
        question: &str,
        gateway: &StructuredGateway<T>,
        model: ModelId,
    ) -> Result<String, GatewayError> {
        let question_turn = ChatTurn::user(question, now());
        let system = advisor_prompt(&profession.title, &profession.daily_life_example);
        let response: ChatResponse = gateway
            .complete(model, &system, &[PromptMessage::user(question)])
            .await?;

        let thread = self
            .threads
            .entry(profession.title.clone())
            .or_insert_with(|| seeded_thread(&profession.title));
        thread.turns.push(question_turn);
        thread
            .turns
            .push(ChatTurn::assistant(response.content.clone(), now()));
        info!(
            turns = thread.turns.len(),
            tone = %response.tone,
            focus_areas = response.focus_areas.len(),
            "advisor answered"
        );
        Ok(response.content)
    }
}
