use std::ops::RangeInclusive;

use tracing::{info, warn};

use crate::config::ModelId;
use crate::entities::{AiksProfile, Profession, PromptMessage};
use crate::gateway::{ProfessionResponse, StructuredGateway, Transport};
use crate::knowledge::{matcher_request, MATCHER_SYSTEM};
use crate::service::errors::GatewayError;

pub const EXPECTED_BATCH: RangeInclusive<usize> = 5..=10;

/// Profession suggestions for the session, generated once and then served
/// from memory until regenerated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfessionMatcher {
    batch: Option<Vec<Profession>>,
    generation: u32,
}

impl ProfessionMatcher {
    pub fn batch(&self) -> Option<&[Profession]> {
        self.batch.as_deref()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn find(&self, title: &str) -> Option<&Profession> {
        self.batch()?.iter().find(|p| p.title == title)
    }

    pub async fn ensure_professions<T: Transport>(
        &mut self,
        profile: &AiksProfile,
        gateway: &StructuredGateway<T>,
        model: ModelId,
    ) -> Result<&[Profession], GatewayError> {
        if self.batch.is_none() {
            let professions = generate(profile, gateway, model).await?;
            self.store(professions);
        }
        Ok(self.batch.as_deref().unwrap_or_default())
    }

    /// Forces exactly one new generation. The previous batch stays in place
    /// if that generation fails.
    pub async fn regenerate<T: Transport>(
        &mut self,
        profile: &AiksProfile,
        gateway: &StructuredGateway<T>,
        model: ModelId,
    ) -> Result<&[Profession], GatewayError> {
        let professions = generate(profile, gateway, model).await?;
        self.store(professions);
        Ok(self.batch.as_deref().unwrap_or_default())
    }

    fn store(&mut self, professions: Vec<Profession>) {
        self.generation += 1;
        info!(
            generation = self.generation,
            count = professions.len(),
            "profession batch cached"
        );
        self.batch = Some(professions);
    }
}

async fn generate<T: Transport>(
    profile: &AiksProfile,
    gateway: &StructuredGateway<T>,
    model: ModelId,
) -> Result<Vec<Profession>, GatewayError> {
    let request = PromptMessage::user(matcher_request(&profile.summary()));
    let response: ProfessionResponse = gateway.complete(model, MATCHER_SYSTEM, &[request]).await?;
    if !EXPECTED_BATCH.contains(&response.professions.len()) {
        warn!(
            count = response.professions.len(),
            "profession batch size outside the requested range"
        );
    }
    Ok(response.professions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::AiksUpdate;
    use crate::gateway::testing::ScriptedTransport;

    fn batch_json(titles: &[&str]) -> String {
        let professions: Vec<String> = titles
            .iter()
            .map(|t| {
                format!(
                    r#"{{"title":"{t}","explanation":"Builds things.","required_skills":["python"],
                        "aiks_alignment":{{"interests":["coding"],"skills":["python"]}},
                        "daily_life_example":"Stand-up, then code review."}}"#
                )
            })
            .collect();
        format!(r#"{{"professions":[{}]}}"#, professions.join(","))
    }

    fn coder_profile() -> AiksProfile {
        let mut profile = AiksProfile::default();
        profile.merge(&AiksUpdate {
            interests: vec!["coding".to_string()],
            skills: vec!["python".to_string()],
            ..Default::default()
        });
        profile
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let gateway = StructuredGateway::new(
            ScriptedTransport::default()
                .reply(batch_json(&["Software Engineer", "Data Analyst"]))
                .reply(batch_json(&["Chef"])),
        );
        let profile = coder_profile();
        let mut matcher = ProfessionMatcher::default();

        let first = matcher
            .ensure_professions(&profile, &gateway, ModelId::default())
            .await
            .unwrap()
            .to_vec();
        let second = matcher
            .ensure_professions(&profile, &gateway, ModelId::default())
            .await
            .unwrap()
            .to_vec();

        assert_eq!(first, second);
        assert_eq!(first[0].title, "Software Engineer");
        assert_eq!(gateway.transport().calls(), 1);
        assert_eq!(matcher.generation(), 1);
    }

    #[tokio::test]
    async fn request_carries_profile_summary() {
        let gateway =
            StructuredGateway::new(ScriptedTransport::default().reply(batch_json(&["Tester"])));
        let mut matcher = ProfessionMatcher::default();
        matcher
            .ensure_professions(&coder_profile(), &gateway, ModelId::Llama3_70b8192)
            .await
            .unwrap();

        let request = gateway.transport().last_request().unwrap();
        assert_eq!(request.model, ModelId::Llama3_70b8192);
        let user = &request.messages[1].content;
        assert!(user.contains("Abilities: \nInterests: coding\nKnowledge: \nSkills: python"));
    }

    #[tokio::test]
    async fn regenerate_replaces_batch_with_one_call() {
        let gateway = StructuredGateway::new(
            ScriptedTransport::default()
                .reply(batch_json(&["Software Engineer"]))
                .reply(batch_json(&["Game Designer", "Robotics Engineer"])),
        );
        let profile = coder_profile();
        let mut matcher = ProfessionMatcher::default();
        matcher
            .ensure_professions(&profile, &gateway, ModelId::default())
            .await
            .unwrap();

        let fresh = matcher
            .regenerate(&profile, &gateway, ModelId::default())
            .await
            .unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(gateway.transport().calls(), 2);
        assert!(matcher.find("Software Engineer").is_none());
        assert!(matcher.find("Game Designer").is_some());
    }

    #[tokio::test]
    async fn failed_generation_caches_nothing() {
        let gateway = StructuredGateway::new(
            ScriptedTransport::default()
                .reply(r#"{"professions":[{"title":"Half a profession"}]}"#)
                .reply(batch_json(&["Nurse"])),
        );
        let mut matcher = ProfessionMatcher::default();

        let err = matcher
            .ensure_professions(&AiksProfile::default(), &gateway, ModelId::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::SchemaViolation { .. }));
        assert!(matcher.batch().is_none());

        matcher
            .ensure_professions(&AiksProfile::default(), &gateway, ModelId::default())
            .await
            .unwrap();
        assert_eq!(gateway.transport().calls(), 2);
    }

    #[tokio::test]
    async fn failed_regenerate_keeps_previous_batch() {
        let gateway = StructuredGateway::new(
            ScriptedTransport::default()
                .reply(batch_json(&["Architect"]))
                .fail(GatewayError::provider("timeout")),
        );
        let mut matcher = ProfessionMatcher::default();
        matcher
            .ensure_professions(&AiksProfile::default(), &gateway, ModelId::default())
            .await
            .unwrap();

        assert!(matcher
            .regenerate(&AiksProfile::default(), &gateway, ModelId::default())
            .await
            .is_err());
        assert!(matcher.find("Architect").is_some());
        assert_eq!(matcher.generation(), 1);
    }
}
