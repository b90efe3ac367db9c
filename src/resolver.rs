use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{catalog::NEUTRAL_FACTION_ID, events::CharacterId};

pub const UNKNOWN_CHARACTER_NAME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterIdentity {
    pub character_id: CharacterId,
    pub name: String,
    pub faction_id: u32,
}

impl CharacterIdentity {
    pub fn unknown(character_id: CharacterId) -> Self {
        Self {
            character_id,
            name: UNKNOWN_CHARACTER_NAME.to_owned(),
            faction_id: NEUTRAL_FACTION_ID,
        }
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("character request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("census returned an error: {0}")]
    Service(String),
}

// Ok(None): no such character.
#[async_trait]
pub trait CharacterLookup: Send + Sync {
    async fn lookup_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Option<CharacterIdentity>, LookupError>;
}

#[derive(Debug, Default)]
struct ResolverState {
    resolved: HashMap<CharacterId, CharacterIdentity>,
    in_flight: HashMap<CharacterId, Vec<oneshot::Sender<CharacterIdentity>>>,
}

// Failures reach every waiter as Unknown and are never cached. Nothing is evicted.
pub struct IdentityResolver<L> {
    lookup: L,
    state: Mutex<ResolverState>,
}

impl<L: CharacterLookup> IdentityResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            state: Mutex::new(ResolverState::default()),
        }
    }

    pub async fn resolve(&self, character_id: CharacterId) -> CharacterIdentity {
        if character_id == 0 {
            return CharacterIdentity::unknown(character_id);
        }
        loop {
            let waiter = {
                let mut state = self.lock_state();
                if let Some(identity) = state.resolved.get(&character_id) {
                    return identity.clone();
                }
                match state.in_flight.get_mut(&character_id) {
                    Some(waiters) => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(tx);
                        Some(rx)
                    }
                    None => {
                        state.in_flight.insert(character_id, Vec::new());
                        None
                    }
                }
            };
            let Some(rx) = waiter else {
                return self.fetch(character_id).await;
            };
            match rx.await {
                Ok(identity) => return identity,
                // The owning request was dropped before finishing; start over.
                Err(_) => debug!(character_id, "in-flight character lookup abandoned"),
            }
        }
    }

    #[cfg(test)]
    pub fn cached(&self, character_id: CharacterId) -> Option<CharacterIdentity> {
        self.lock_state().resolved.get(&character_id).cloned()
    }

    pub fn cached_len(&self) -> usize {
        self.lock_state().resolved.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.lock_state().in_flight.len()
    }

    async fn fetch(&self, character_id: CharacterId) -> CharacterIdentity {
        let request = InFlightRequest {
            state: &self.state,
            character_id,
            finished: false,
        };
        let found = match self.lookup.lookup_character(character_id).await {
            Ok(Some(identity)) => Some(identity),
            Ok(None) => {
                debug!(character_id, "character not found");
                None
            }
            Err(err) => {
                warn!(?err, character_id, "character lookup failed");
                None
            }
        };
        request.finish(found)
    }

    fn lock_state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Dropped unfinished, it releases the waiters so one of them takes over.
struct InFlightRequest<'a> {
    state: &'a Mutex<ResolverState>,
    character_id: CharacterId,
    finished: bool,
}

impl InFlightRequest<'_> {
    fn finish(mut self, found: Option<CharacterIdentity>) -> CharacterIdentity {
        self.finished = true;
        let (identity, waiters) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let identity = match found {
                Some(identity) => state
                    .resolved
                    .entry(self.character_id)
                    .or_insert(identity)
                    .clone(),
                None => CharacterIdentity::unknown(self.character_id),
            };
            let waiters = state
                .in_flight
                .remove(&self.character_id)
                .unwrap_or_default();
            (identity, waiters)
        };
        debug!(
            character_id = self.character_id,
            waiters = waiters.len(),
            "character lookup completed"
        );
        for waiter in waiters {
            let _ = waiter.send(identity.clone());
        }
        identity
    }
}

impl Drop for InFlightRequest<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight.remove(&self.character_id);
    }
}
