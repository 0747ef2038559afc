//! Async, persistent wrapper around [`LmsState`].
//!
//! Every write runs against a copy of the state. The copy is persisted in one
//! transaction and only then swapped in, so a failed mutation or a failed
//! write leaves both memory and disk as they were.

use std::sync::Arc;

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use shared::protocol::ServerEvent;
use storage::{KvStore, VersionCheck};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{
    error::LmsError,
    seed::{seed_state, DB_VERSION, KEY_PREFIX, VERSION_KEY},
    state::LmsState,
    validation::DEFAULT_STAFF_CODE,
};

const EVENT_BUFFER: usize = 256;

pub mod keys {
    pub const USERS: &str = "dbb_users";
    pub const COURSES: &str = "dbb_courses";
    pub const ASSIGNMENTS: &str = "dbb_assignments";
    pub const SUBMISSIONS: &str = "dbb_submissions";
    pub const ANNOUNCEMENTS: &str = "dbb_announcements";
    pub const ENROLLMENTS: &str = "dbb_enrollments";
    pub const NOTIFICATIONS: &str = "dbb_notifications";
    pub const CONTENT: &str = "dbb_content";
    pub const RATINGS: &str = "dbb_ratings";
    pub const QUIZZES: &str = "dbb_quizzes";
    pub const QUIZ_ATTEMPTS: &str = "dbb_quiz_attempts";
    pub const CERTIFICATES: &str = "dbb_certificates";
    pub const MESSAGES: &str = "dbb_messages";
    pub const PLATFORM_SETTINGS: &str = "dbb_platform_settings";
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub staff_code: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            staff_code: DEFAULT_STAFF_CODE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct LmsStore {
    storage: Arc<dyn KvStore>,
    state: Arc<RwLock<LmsState>>,
    events: broadcast::Sender<ServerEvent>,
    options: Arc<StoreOptions>,
}

impl LmsStore {
    /// Reseeds on a version mismatch, then loads every collection.
    pub async fn open(storage: Arc<dyn KvStore>, options: StoreOptions) -> Result<Self, LmsError> {
        let seed = encode_state(&seed_state())?;
        let check = storage
            .ensure_version(KEY_PREFIX, VERSION_KEY, DB_VERSION, &seed)
            .await?;
        if let VersionCheck::Reseeded { removed_keys } = check {
            warn!(removed_keys, version = DB_VERSION, "store reseeded with demo data");
        }
        let state = load_state(storage.as_ref()).await?;
        info!(
            users = state.users().len(),
            courses = state.courses().len(),
            "store opened"
        );

        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Ok(Self {
            storage,
            state: Arc::new(RwLock::new(state)),
            events,
            options: Arc::new(options),
        })
    }

    pub fn staff_code(&self) -> &str {
        &self.options.staff_code
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&LmsState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Applies `f` to a copy of the state and persists it when `f` succeeds.
    pub async fn write<R>(
        &self,
        f: impl FnOnce(&mut LmsState) -> Result<R, LmsError>,
    ) -> Result<R, LmsError> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let value = f(&mut next)?;
        let events = next.take_events();

        let items = encode_state(&next)?;
        self.storage.set_items(&items).await?;
        *guard = next;

        // Broadcast while the lock is held so subscribers see commit order.
        for event in events {
            // No subscribers is not an error.
            let _ = self.events.send(event);
        }
        drop(guard);
        Ok(value)
    }

    /// Wipes every key and restores the demo data.
    pub async fn reset(&self) -> Result<(), LmsError> {
        let mut guard = self.state.write().await;
        self.storage
            .remove_item(VERSION_KEY)
            .await
            .context("failed to clear version marker")?;
        let seed = encode_state(&seed_state())?;
        self.storage
            .ensure_version(KEY_PREFIX, VERSION_KEY, DB_VERSION, &seed)
            .await?;
        *guard = load_state(self.storage.as_ref()).await?;
        info!("store reset to demo data");
        Ok(())
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<(String, String), LmsError> {
    let json = serde_json::to_string(value).with_context(|| format!("failed to encode '{key}'"))?;
    Ok((key.to_string(), json))
}

/// One `(key, json)` pair per persisted collection.
pub fn encode_state(state: &LmsState) -> Result<Vec<(String, String)>, LmsError> {
    Ok(vec![
        encode(keys::USERS, state.users())?,
        encode(keys::COURSES, state.courses())?,
        encode(keys::ASSIGNMENTS, state.assignments())?,
        encode(keys::SUBMISSIONS, state.submissions())?,
        encode(keys::ANNOUNCEMENTS, state.announcements())?,
        encode(keys::ENROLLMENTS, state.enrollments())?,
        encode(keys::NOTIFICATIONS, state.notifications())?,
        encode(keys::CONTENT, state.content_items())?,
        encode(keys::RATINGS, state.ratings())?,
        encode(keys::QUIZZES, state.quizzes())?,
        encode(keys::QUIZ_ATTEMPTS, state.quiz_attempts())?,
        encode(keys::CERTIFICATES, state.certificates())?,
        encode(keys::MESSAGES, state.messages())?,
        encode(keys::PLATFORM_SETTINGS, state.platform_settings())?,
    ])
}

/// Missing keys load as empty collections.
async fn decode<T: DeserializeOwned + Default>(storage: &dyn KvStore, key: &str) -> Result<T, LmsError> {
    match storage.get_item(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw).with_context(|| format!("failed to decode '{key}'"))?;
            Ok(value)
        }
        None => {
            debug!(key, "key missing; using empty default");
            Ok(T::default())
        }
    }
}

pub async fn load_state(storage: &dyn KvStore) -> Result<LmsState, LmsError> {
    let mut state = LmsState::new();
    state.users = decode(storage, keys::USERS).await?;
    state.courses = decode(storage, keys::COURSES).await?;
    state.assignments = decode(storage, keys::ASSIGNMENTS).await?;
    state.submissions = decode(storage, keys::SUBMISSIONS).await?;
    state.announcements = decode(storage, keys::ANNOUNCEMENTS).await?;
    state.enrollments = decode(storage, keys::ENROLLMENTS).await?;
    state.notifications = decode(storage, keys::NOTIFICATIONS).await?;
    state.content = decode(storage, keys::CONTENT).await?;
    state.ratings = decode(storage, keys::RATINGS).await?;
    state.quizzes = decode(storage, keys::QUIZZES).await?;
    state.quiz_attempts = decode(storage, keys::QUIZ_ATTEMPTS).await?;
    state.certificates = decode(storage, keys::CERTIFICATES).await?;
    state.messages = decode(storage, keys::MESSAGES).await?;
    state.platform_settings = decode(storage, keys::PLATFORM_SETTINGS).await?;
    state.sync_last_id();
    Ok(state)
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
