//! Canister endpoints. Each one is a single screen action of the frontend.

use std::collections::BTreeMap;

use ic_cdk::{init, post_upgrade, query, update};
use tracing::{info, warn};

use crate::config::{ConfigSummary, GatewayConfig, InitArgs, ModelId};
use crate::entities::{AdvisorThread, AiksProfile, ChatTurn, Profession};
use crate::gateway::StructuredGateway;
use crate::service::context::SessionCtx;
use crate::service::errors::AppError;
use crate::service::AdvisorChat;
use crate::session::{SessionOverview, SessionState, SessionStore, MAX_SESSIONS};
use crate::utils::init_logging;

const STORE: SessionStore = SessionStore::new(MAX_SESSIONS);

fn install(args: Option<InitArgs>) {
    if let Err(err) = init_logging() {
        ic_cdk::println!("{err}");
    }
    let config = GatewayConfig::from(args.unwrap_or_default());
    info!(?config, "gateway configured");
    GatewayConfig::replace(config);
}

#[init]
fn init(args: Option<InitArgs>) {
    install(args);
}

/// Sessions live on the heap only, so an upgrade starts everyone afresh.
#[post_upgrade]
fn post_upgrade(args: Option<InitArgs>) {
    install(args);
    STORE.clear();
}

fn non_empty(input: String) -> Result<String, AppError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AppError::EmptyInput);
    }
    Ok(input.to_string())
}

/// Reads the caller's state; anonymous callers see an empty session.
fn read_session<R>(f: impl FnOnce(&SessionState) -> R) -> R {
    match SessionCtx::get().session_key() {
        Ok(key) => STORE.read(key, f),
        Err(_) => f(&SessionState::default()),
    }
}

fn liked_record(state: &SessionState, title: &str) -> Result<Profession, AppError> {
    state
        .feedback
        .liked_profession(title)
        .cloned()
        .ok_or_else(|| AppError::unknown_profession(title))
}

#[query]
fn config_summary() -> ConfigSummary {
    ConfigSummary::from(&GatewayConfig::current())
}

#[update]
fn set_api_key(key: String) -> Result<(), AppError> {
    SessionCtx::get().require_controller()?;
    GatewayConfig::update(|config| config.set_api_key(key));
    info!("provider API key replaced");
    Ok(())
}

#[update]
fn select_model(model: ModelId) -> Result<(), AppError> {
    let key = SessionCtx::get().session_key()?;
    STORE.update(key, |state| state.model = model)?;
    info!(%model, "session model selected");
    Ok(())
}

#[update]
fn start_assessment() -> Result<Vec<ChatTurn>, AppError> {
    let key = SessionCtx::get().session_key()?;
    STORE.update(key, |state| {
        state.dialogue.open();
        state.dialogue.history().to_vec()
    })
}

#[query]
fn chat_history() -> Vec<ChatTurn> {
    read_session(|state| state.dialogue.history().to_vec())
}

#[update]
async fn submit_answer(input: String) -> Result<ChatTurn, AppError> {
    let input = non_empty(input)?;
    let key = SessionCtx::get().session_key()?;
    let gateway = StructuredGateway::from_config(&GatewayConfig::current())?;

    let mut guard = STORE.checkout(key)?;
    let state = guard.state_mut();
    let model = state.model;
    let turn = state
        .dialogue
        .submit(&mut state.profile, &input, &gateway, model)
        .await
        .inspect_err(|err| warn!(%err, "assessment turn failed"))?;
    guard.commit();
    Ok(turn)
}

#[query]
fn aiks_profile() -> AiksProfile {
    read_session(|state| state.profile.clone())
}

#[update]
async fn matching_professions() -> Result<Vec<Profession>, AppError> {
    let key = SessionCtx::get().session_key()?;
    if let Some(batch) = STORE.read(key, |state| state.matcher.batch().map(<[Profession]>::to_vec)) {
        return Ok(batch);
    }
    let gateway = StructuredGateway::from_config(&GatewayConfig::current())?;

    let mut guard = STORE.checkout(key)?;
    let state = guard.state_mut();
    let model = state.model;
    let batch = state
        .matcher
        .ensure_professions(&state.profile, &gateway, model)
        .await
        .inspect_err(|err| warn!(%err, "profession matching failed"))?
        .to_vec();
    guard.commit();
    Ok(batch)
}

#[update]
async fn regenerate_professions() -> Result<Vec<Profession>, AppError> {
    let key = SessionCtx::get().session_key()?;
    let gateway = StructuredGateway::from_config(&GatewayConfig::current())?;

    let mut guard = STORE.checkout(key)?;
    let state = guard.state_mut();
    let model = state.model;
    let batch = state
        .matcher
        .regenerate(&state.profile, &gateway, model)
        .await
        .inspect_err(|err| warn!(%err, "profession regeneration failed"))?
        .to_vec();
    guard.commit();
    Ok(batch)
}

/// Thumbs up/down on a profession of the current batch. Titles already liked
/// from an earlier batch can still be un-liked.
#[update]
fn set_feedback(title: String, liked: bool) -> Result<(), AppError> {
    let key = SessionCtx::get().session_key()?;
    STORE.update(key, |state| -> Result<(), AppError> {
        let record = state
            .matcher
            .find(&title)
            .or_else(|| state.feedback.liked_profession(&title))
            .cloned()
            .ok_or_else(|| AppError::unknown_profession(&title))?;
        state.feedback.set_feedback(&title, liked, &record);
        Ok(())
    })?
}

#[query]
fn profession_feedback() -> BTreeMap<String, bool> {
    read_session(|state| state.feedback.feedback().clone())
}

#[query]
fn liked_professions() -> Vec<Profession> {
    read_session(|state| state.feedback.liked().values().cloned().collect())
}

#[update]
fn open_advisor(title: String) -> Result<AdvisorThread, AppError> {
    let key = SessionCtx::get().session_key()?;
    STORE.update(key, |state| -> Result<AdvisorThread, AppError> {
        liked_record(state, &title)?;
        Ok(state.advisor.thread(&title).clone())
    })?
}

#[update]
async fn ask_advisor(title: String, question: String) -> Result<String, AppError> {
    let question = non_empty(question)?;
    let key = SessionCtx::get().session_key()?;
    let profession = STORE.read(key, |state| liked_record(state, &title))?;
    let gateway = StructuredGateway::from_config(&GatewayConfig::current())?;

    let mut guard = STORE.checkout(key)?;
    let state = guard.state_mut();
    let model = state.model;
    let answer = state
        .advisor
        .ask(&profession, &question, &gateway, model)
        .await
        .inspect_err(|err| warn!(%err, "advisor answer failed"))?;
    guard.commit();
    Ok(answer)
}

#[query]
fn advisor_questions() -> Vec<String> {
    AdvisorChat::suggested_questions()
        .iter()
        .map(|q| q.to_string())
        .collect()
}

#[query]
fn session_overview() -> SessionOverview {
    match SessionCtx::get().session_key() {
        Ok(key) => {
            let busy = STORE.is_busy(key);
            STORE.read(key, |state| state.overview(busy))
        }
        Err(_) => SessionState::default().overview(false),
    }
}

#[update]
fn end_session() -> Result<bool, AppError> {
    let key = SessionCtx::get().session_key()?;
    let removed = STORE.remove(key)?;
    info!(removed, "session ended");
    Ok(removed)
}
