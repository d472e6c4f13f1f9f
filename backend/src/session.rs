use std::cell::RefCell;
use std::collections::BTreeMap;

use candid::{CandidType, Principal};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModelId;
use crate::entities::AiksProfile;
use crate::service::errors::AppError;
use crate::service::{AdvisorChat, AssessmentDialogue, FeedbackTracker, ProfessionMatcher};
use crate::utils::now;

pub const MAX_SESSIONS: usize = 10_000;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub model: ModelId,
    pub profile: AiksProfile,
    pub dialogue: AssessmentDialogue,
    pub matcher: ProfessionMatcher,
    pub feedback: FeedbackTracker,
    pub advisor: AdvisorChat,
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionOverview {
    pub model: ModelId,
    pub turn_count: u32,
    pub abilities: u64,
    pub interests: u64,
    pub knowledge: u64,
    pub skills: u64,
    pub professions: Option<u64>,
    pub liked: u64,
    pub advisor_threads: Vec<String>,
    pub busy: bool,
}

#[derive(Default)]
struct SessionSlot {
    state: SessionState,
    busy: bool,
    last_active: u64,
}

thread_local! {
    static SESSIONS: RefCell<BTreeMap<Principal, SessionSlot>> = RefCell::new(BTreeMap::new());
}

#[derive(Debug)]
pub struct SessionStore {
    limit: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(MAX_SESSIONS)
    }
}

/// Once `limit` sessions exist, a new caller evicts the longest idle one.
fn active_slot(
    sessions: &mut BTreeMap<Principal, SessionSlot>,
    key: Principal,
    limit: usize,
) -> &mut SessionSlot {
    if !sessions.contains_key(&key) && sessions.len() >= limit {
        let idle = sessions
            .iter()
            .filter(|(_, slot)| !slot.busy)
            .min_by_key(|(_, slot)| slot.last_active)
            .map(|(key, _)| *key);
        if let Some(idle) = idle {
            sessions.remove(&idle);
            info!(sessions = sessions.len(), "evicted idle session");
        }
    }
    let slot = sessions.entry(key).or_default();
    slot.last_active = now();
    slot
}

impl SessionStore {
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn read<R>(&self, key: Principal, f: impl FnOnce(&SessionState) -> R) -> R {
        SESSIONS.with_borrow(|sessions| match sessions.get(&key) {
            Some(slot) => f(&slot.state),
            None => f(&SessionState::default()),
        })
    }

    pub fn is_busy(&self, key: Principal) -> bool {
        SESSIONS.with_borrow(|sessions| sessions.get(&key).is_some_and(|slot| slot.busy))
    }

    pub fn update<R>(
        &self,
        key: Principal,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> Result<R, AppError> {
        SESSIONS.with_borrow_mut(|sessions| {
            let slot = active_slot(sessions, key, self.limit);
            if slot.busy {
                return Err(AppError::TurnInProgress);
            }
            Ok(f(&mut slot.state))
        })
    }

    pub fn checkout(&self, key: Principal) -> Result<TurnGuard, AppError> {
        SESSIONS.with_borrow_mut(|sessions| {
            let slot = active_slot(sessions, key, self.limit);
            if slot.busy {
                return Err(AppError::TurnInProgress);
            }
            slot.busy = true;
            Ok(TurnGuard {
                key,
                state: slot.state.clone(),
            })
        })
    }

    /// Drops the caller's session. Refused while an action is in flight.
    pub fn remove(&self, key: Principal) -> Result<bool, AppError> {
        SESSIONS.with_borrow_mut(|sessions| {
            if sessions.get(&key).is_some_and(|slot| slot.busy) {
                return Err(AppError::TurnInProgress);
            }
            Ok(sessions.remove(&key).is_some())
        })
    }

    pub fn clear(&self) {
        SESSIONS.with_borrow_mut(|sessions| sessions.clear());
    }
}

/// Working copy of a busy session. `commit` publishes it; dropping the guard
/// without committing discards it. Either way the busy mark is cleared,
/// including when the call traps after an await.
pub struct TurnGuard {
    key: Principal,
    state: SessionState,
}

impl TurnGuard {
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn commit(mut self) {
        let state = std::mem::take(&mut self.state);
        SESSIONS.with_borrow_mut(|sessions| {
            sessions.entry(self.key).or_default().state = state;
        });
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        SESSIONS.with_borrow_mut(|sessions| {
            if let Some(slot) = sessions.get_mut(&self.key) {
                slot.busy = false;
            }
        });
    }
}

impl SessionState {
    pub fn overview(&self, busy: bool) -> SessionOverview {
        SessionOverview {
            model: self.model,
            turn_count: self.dialogue.turn_count(),
            abilities: self.profile.abilities.len() as u64,
            interests: self.profile.interests.len() as u64,
            knowledge: self.profile.knowledge.len() as u64,
            skills: self.profile.skills.len() as u64,
            professions: self.matcher.batch().map(|b| b.len() as u64),
            liked: self.feedback.liked().len() as u64,
            advisor_threads: self.advisor.titles(),
            busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Principal {
        Principal::from_slice(&[n; 4])
    }

    #[test]
    fn committed_guard_publishes_state() {
        let store = SessionStore::default();
        let mut guard = store.checkout(key(1)).unwrap();
        guard.state_mut().model = ModelId::Llama3_8b8192;
        assert!(store.is_busy(key(1)));
        guard.commit();

        assert!(!store.is_busy(key(1)));
        assert_eq!(store.read(key(1), |s| s.model), ModelId::Llama3_8b8192);
        store.clear();
    }

    #[test]
    fn dropped_guard_discards_state() {
        let store = SessionStore::default();
        {
            let mut guard = store.checkout(key(2)).unwrap();
            guard.state_mut().model = ModelId::Llama32_1bPreview;
        }
        assert!(!store.is_busy(key(2)));
        assert_eq!(store.read(key(2), |s| s.model), ModelId::default());
        store.clear();
    }

    #[test]
    fn busy_session_rejects_other_mutations() {
        let store = SessionStore::default();
        let guard = store.checkout(key(3)).unwrap();

        assert_eq!(store.checkout(key(3)).err(), Some(AppError::TurnInProgress));
        assert_eq!(
            store.update(key(3), |s| s.model = ModelId::Llama3_70b8192),
            Err(AppError::TurnInProgress)
        );
        assert_eq!(store.remove(key(3)), Err(AppError::TurnInProgress));
        assert!(store.checkout(key(4)).is_ok());

        drop(guard);
        assert!(store.update(key(3), |s| s.model = ModelId::Llama3_70b8192).is_ok());
        store.clear();
    }

    #[test]
    fn full_store_evicts_longest_idle_session() {
        let store = SessionStore::new(2);
        store.update(key(10), |s| s.model = ModelId::Llama3_8b8192).unwrap();
        store.update(key(11), |s| s.model = ModelId::Llama3_8b8192).unwrap();
        store.update(key(10), |s| s.profile.skills.insert("welding".to_string())).unwrap();

        store.update(key(12), |s| s.model = ModelId::Llama3_8b8192).unwrap();

        assert_eq!(store.read(key(10), |s| s.model), ModelId::Llama3_8b8192);
        assert_eq!(store.read(key(11), |s| s.model), ModelId::default());
        assert_eq!(store.read(key(12), |s| s.model), ModelId::Llama3_8b8192);
        store.clear();
    }

    #[test]
    fn busy_session_survives_eviction() {
        let store = SessionStore::new(2);
        let mut guard = store.checkout(key(20)).unwrap();
        store.update(key(21), |s| s.model = ModelId::Llama3_8b8192).unwrap();

        store.update(key(22), |s| s.model = ModelId::Llama3_8b8192).unwrap();

        assert!(store.is_busy(key(20)));
        assert_eq!(store.read(key(21), |s| s.model), ModelId::default());
        guard.state_mut().model = ModelId::Llama3_70b8192;
        guard.commit();
        assert_eq!(store.read(key(20), |s| s.model), ModelId::Llama3_70b8192);
        store.clear();
    }

    #[test]
    fn sessions_are_keyed_by_caller() {
        let store = SessionStore::default();
        store
            .update(key(5), |s| s.model = ModelId::Llama32_3bPreview)
            .unwrap();
        assert_eq!(store.read(key(6), |s| s.model), ModelId::default());
        assert_eq!(store.remove(key(5)), Ok(true));
        assert_eq!(store.remove(key(5)), Ok(false));
        store.clear();
    }
}
