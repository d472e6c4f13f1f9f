mod advisor;
mod assessment;
mod feedback;
mod matcher;

pub use advisor::AdvisorChat;
pub use assessment::{AssessmentDialogue, MAX_SUGGESTED_OPTIONS};
pub use feedback::FeedbackTracker;
pub use matcher::ProfessionMatcher;

pub mod errors {
    use candid::CandidType;
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    #[derive(Error, CandidType, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
    pub enum GatewayError {
        #[error(r#"Model reply does not match the {schema} schema: {reason}"#)]
        SchemaViolation { schema: String, reason: String },
        #[error(r#"LLM provider request failed: {reason}"#)]
        Provider { reason: String },
        #[error(r#"LLM provider API key is missing or was rejected."#)]
        MissingSecret,
    }

    impl GatewayError {
        pub fn schema_violation(schema: &str, reason: impl ToString) -> Self {
            Self::SchemaViolation {
                schema: schema.to_string(),
                reason: reason.to_string(),
            }
        }

        pub fn provider(reason: impl ToString) -> Self {
            Self::Provider {
                reason: reason.to_string(),
            }
        }
    }

    #[derive(Error, CandidType, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
    pub enum AppError {
        #[error(transparent)]
        Gateway(#[from] GatewayError),
        #[error(r#"Profession "{title}" is not available."#)]
        UnknownProfession { title: String },
        #[error(r#"Another action is still running for this session."#)]
        TurnInProgress,
        #[error(r#"Anonymous callers cannot hold a session."#)]
        AnonymousCaller,
        #[error(r#"Input must not be empty."#)]
        EmptyInput,
        #[error(r#"Caller {identity} is not a controller."#)]
        NotAuthorized { identity: String },
    }

    impl AppError {
        pub fn unknown_profession(title: &str) -> Self {
            Self::UnknownProfession {
                title: title.to_string(),
            }
        }
    }
}

pub mod context {
    #[cfg(all(test, not(rust_analyzer)))]
    use crate::utils::mock_ic0::{caller, is_controller};
    use candid::Principal;
    #[cfg(any(not(test), rust_analyzer))]
    use ic_cdk::{api::is_controller, caller};

    use super::errors::AppError;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SessionCtx {
        caller: Principal,
    }

    impl Default for SessionCtx {
        fn default() -> Self {
            Self {
                caller: Principal::anonymous(),
            }
        }
    }

    impl SessionCtx {
        pub fn get() -> Self {
            Self { caller: caller() }
        }

        pub fn is_controller(&self) -> bool {
            is_controller(&self.caller)
        }

        /// Fails unless the caller controls the canister.
        pub fn require_controller(&self) -> Result<(), AppError> {
            if self.is_controller() {
                return Ok(());
            }
            Err(AppError::NotAuthorized {
                identity: self.caller.to_text(),
            })
        }

        /// The session key; anonymous callers have none.
        pub fn session_key(&self) -> Result<Principal, AppError> {
            if self.caller == Principal::anonymous() {
                return Err(AppError::AnonymousCaller);
            }
            Ok(self.caller)
        }
    }

}
