//! IntroSite, the page hosting the intro, remountable on reload.

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::info;

use super::events::{IntroEvent, event_channel};
use super::preference::{IntroPreference, MotionQuery};
use super::sequencer::{IntroHandle, IntroSnapshot, Key};
use crate::config::IntroConfig;
use crate::error::SequencerError;
use crate::store::PreferenceStore;

/// Owns the currently mounted intro and the collaborators needed to mount
/// a fresh one. Renderers subscribe once; the event channel outlives reloads.
pub struct IntroSite {
    store: PreferenceStore,
    motion: Arc<dyn MotionQuery>,
    config: IntroConfig,
    events: broadcast::Sender<IntroEvent>,
    current: RwLock<IntroHandle>,
}

impl IntroSite {
    pub async fn new(
        store: PreferenceStore,
        motion: Arc<dyn MotionQuery>,
        config: IntroConfig,
    ) -> Arc<Self> {
        let events = event_channel();
        let handle = IntroHandle::mount_with_events(
            store.clone(),
            motion.as_ref(),
            config.clone(),
            events.clone(),
        )
        .await;
        Arc::new(Self {
            store,
            motion,
            config,
            events,
            current: RwLock::new(handle),
        })
    }

    /// Simulate a full page load: unmount the current intro, evaluate again.
    pub async fn reload(&self) -> IntroSnapshot {
        let mut current = self.current.write().await;
        current.stop();
        *current = IntroHandle::mount_with_events(
            self.store.clone(),
            self.motion.as_ref(),
            self.config.clone(),
            self.events.clone(),
        )
        .await;
        let snapshot = current.snapshot().await;
        info!(phase = %snapshot.phase, show = snapshot.should_show, "Intro remounted");
        snapshot
    }

    /// The browsing session ended; session-scoped flags are forgotten.
    pub async fn end_session(&self) {
        self.store.end_session().await;
        info!("Intro session ended");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntroEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> IntroSnapshot {
        self.current.read().await.snapshot().await
    }

    pub async fn skip(&self) -> Result<(), SequencerError> {
        self.current.read().await.skip()
    }

    pub async fn key_pressed(&self, key: Key) -> bool {
        self.current.read().await.key_pressed(key).await
    }

    pub async fn set_preference(&self, pref: IntroPreference) {
        self.current.read().await.set_preference(pref).await;
    }

    /// Wait until the mounted intro reaches `complete`.
    pub async fn wait_complete(&self) {
        let mut phase = self.current.read().await.watch_phase();
        let _ = phase.wait_for(|p| p.is_terminal()).await;
    }
}
