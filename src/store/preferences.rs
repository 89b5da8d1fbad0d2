//! PreferenceStore: intro preference and seen-flags over two key/value stores.
//!
//! Storage failures never reach callers: reads fall back to defaults that
//! show the intro, writes are logged and dropped.

use std::sync::Arc;

use tracing::warn;

use super::traits::KeyValueStore;
use crate::intro::preference::{IntroPreference, SeenFlags};

/// Keys used for intro persistence.
pub mod storage_keys {
    /// Durable intro preference.
    pub const PREFERENCE: &str = "portfolio-intro-preference";
    /// Durable "has seen intro ever" flag.
    pub const HAS_SEEN_INTRO: &str = "portfolio-has-seen-intro";
    /// Session-scoped "has seen intro this session" flag.
    pub const SESSION_SHOWN: &str = "portfolio-session-intro-shown";
}

const TRUE: &str = "true";

/// Durable + session-scoped persistence for the intro.
#[derive(Clone)]
pub struct PreferenceStore {
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(durable: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// The stored preference, or `Always` when unset, unreadable, or unknown.
    pub async fn load_preference(&self) -> IntroPreference {
        match self.durable.get(storage_keys::PREFERENCE).await {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                warn!(value = %raw, "Ignoring stored intro preference: {}", e);
                IntroPreference::default()
            }),
            Ok(None) => IntroPreference::default(),
            Err(e) => {
                warn!("Failed to read intro preference: {}", e);
                IntroPreference::default()
            }
        }
    }

    /// Both seen-flags. Unreadable storage counts as "not seen".
    pub async fn load_seen_flags(&self) -> SeenFlags {
        SeenFlags {
            ever: read_flag(self.durable.as_ref(), storage_keys::HAS_SEEN_INTRO).await,
            session: read_flag(self.session.as_ref(), storage_keys::SESSION_SHOWN).await,
        }
    }

    /// Set both seen-flags. Idempotent.
    pub async fn mark_seen(&self) {
        if let Err(e) = self.durable.set(storage_keys::HAS_SEEN_INTRO, TRUE).await {
            warn!("Failed to persist durable seen flag: {}", e);
        }
        if let Err(e) = self.session.set(storage_keys::SESSION_SHOWN, TRUE).await {
            warn!("Failed to persist session seen flag: {}", e);
        }
    }

    /// Persist the preference durably.
    pub async fn save_preference(&self, pref: IntroPreference) {
        if let Err(e) = self.durable.set(storage_keys::PREFERENCE, pref.as_str()).await {
            warn!(preference = %pref, "Failed to persist intro preference: {}", e);
        }
    }

    /// End the browsing session: session-scoped flags are forgotten.
    pub async fn end_session(&self) {
        if let Err(e) = self.session.clear().await {
            warn!("Failed to clear session store: {}", e);
        }
    }
}

async fn read_flag(store: &dyn KeyValueStore, key: &str) -> bool {
    match store.get(key).await {
        Ok(value) => value.as_deref() == Some(TRUE),
        Err(e) => {
            warn!(key, "Failed to read intro flag: {}", e);
            false
        }
    }
}
