//! IntroStateController decides whether the intro shows and records how it ended.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use super::events::IntroEvent;
use super::preference::{IntroPreference, MotionQuery};
use super::state::IntroVisibility;
use super::timer::TimerSet;
use crate::store::PreferenceStore;

/// Per-mount intro visibility, backed by the preference store.
///
/// Evaluated once in [`IntroStateController::mount`]; later preference
/// changes only affect the next mount.
pub struct IntroStateController {
    store: PreferenceStore,
    visibility: Arc<RwLock<IntroVisibility>>,
    preference: RwLock<IntroPreference>,
    events: broadcast::Sender<IntroEvent>,
    grace: Duration,
    grace_timer: Mutex<TimerSet>,
}

impl IntroStateController {
    /// Evaluate the stored preference, seen-flags, and reduced-motion signal.
    pub async fn mount(
        store: PreferenceStore,
        motion: &dyn MotionQuery,
        grace: Duration,
        events: broadcast::Sender<IntroEvent>,
    ) -> Arc<Self> {
        let (visibility, preference) = if motion.prefers_reduced_motion().unwrap_or(false) {
            info!("Reduced motion requested, intro suppressed");
            (IntroVisibility::finished(), IntroPreference::default())
        } else {
            let preference = store.load_preference().await;
            let flags = store.load_seen_flags().await;
            let show = preference.should_show(flags);
            info!(
                preference = %preference,
                seen_ever = flags.ever,
                seen_session = flags.session,
                show,
                "Intro evaluated"
            );
            let visibility = if show {
                IntroVisibility::showing()
            } else {
                IntroVisibility::finished()
            };
            (visibility, preference)
        };

        Arc::new(Self {
            store,
            visibility: Arc::new(RwLock::new(visibility)),
            preference: RwLock::new(preference),
            events,
            grace,
            grace_timer: Mutex::new(TimerSet::new()),
        })
    }

    pub async fn visibility(&self) -> IntroVisibility {
        *self.visibility.read().await
    }

    pub async fn should_show(&self) -> bool {
        self.visibility.read().await.should_show
    }

    pub async fn is_complete(&self) -> bool {
        self.visibility.read().await.is_complete
    }

    pub async fn preference(&self) -> IntroPreference {
        *self.preference.read().await
    }

    /// Immediate exit: hide now and remember the intro was seen.
    pub async fn skip(&self) {
        self.cancel_grace();
        set_visibility(&self.visibility, &self.events, IntroVisibility::finished()).await;
        self.store.mark_seen().await;
        info!("Intro skipped");
    }

    /// Natural finish: complete now, hide after the grace window.
    pub async fn complete(&self) {
        {
            let current = *self.visibility.read().await;
            set_visibility(
                &self.visibility,
                &self.events,
                IntroVisibility {
                    should_show: current.should_show,
                    is_complete: true,
                },
            )
            .await;
        }
        self.store.mark_seen().await;
        info!(grace_ms = self.grace.as_millis() as u64, "Intro completed");

        let visibility = Arc::clone(&self.visibility);
        let events = self.events.clone();
        let grace = self.grace;
        if let Ok(mut timer) = self.grace_timer.lock() {
            timer.cancel_all();
            timer.spawn(async move {
                tokio::time::sleep(grace).await;
                set_visibility(&visibility, &events, IntroVisibility::finished()).await;
                debug!("Intro overlay hidden after grace window");
            });
        }
    }

    /// Update the preference locally and persist it.
    pub async fn set_preference(&self, pref: IntroPreference) {
        *self.preference.write().await = pref;
        self.store.save_preference(pref).await;
        let _ = self.events.send(IntroEvent::PreferenceChanged { preference: pref });
        info!(preference = %pref, "Intro preference updated");
    }

    /// Drop any pending grace timer (component unmounted).
    pub fn unmount(&self) {
        self.cancel_grace();
    }

    fn cancel_grace(&self) {
        if let Ok(mut timer) = self.grace_timer.lock() {
            timer.cancel_all();
        }
    }
}

impl Drop for IntroStateController {
    fn drop(&mut self) {
        self.cancel_grace();
    }
}

async fn set_visibility(
    visibility: &RwLock<IntroVisibility>,
    events: &broadcast::Sender<IntroEvent>,
    next: IntroVisibility,
) {
    let mut current = visibility.write().await;
    if *current != next {
        *current = next;
        // Ok if no renderer is listening.
        let _ = events.send(IntroEvent::visibility(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intro::events::event_channel;
    use crate::intro::preference::{SeenFlags, StaticMotion};
    use crate::store::MemoryStore;

    const GRACE: Duration = Duration::from_millis(500);

    struct Fixture {
        durable: Arc<MemoryStore>,
        session: Arc<MemoryStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                durable: MemoryStore::new(),
                session: MemoryStore::new(),
            }
        }

        fn store(&self) -> PreferenceStore {
            PreferenceStore::new(self.durable.clone(), self.session.clone())
        }

        async fn mount(&self, reduced_motion: Option<bool>) -> Arc<IntroStateController> {
            IntroStateController::mount(
                self.store(),
                &StaticMotion(reduced_motion),
                GRACE,
                event_channel(),
            )
            .await
        }

        async fn mount_with(&self, pref: IntroPreference) -> Arc<IntroStateController> {
            self.store().save_preference(pref).await;
            self.mount(None).await
        }
    }

    #[tokio::test]
    async fn always_shows() {
        let fx = Fixture::new();
        fx.store().mark_seen().await;
        let c = fx.mount_with(IntroPreference::Always).await;
        assert_eq!(c.visibility().await, IntroVisibility::showing());
        assert_eq!(c.preference().await, IntroPreference::Always);
    }

    #[tokio::test]
    async fn never_is_hidden_and_complete_regardless_of_flags() {
        for seen in [false, true] {
            let fx = Fixture::new();
            if seen {
                fx.store().mark_seen().await;
            }
            let c = fx.mount_with(IntroPreference::Never).await;
            assert_eq!(c.visibility().await, IntroVisibility::finished());
        }
    }

    #[tokio::test]
    async fn once_shows_until_seen() {
        let fx = Fixture::new();
        let first = fx.mount_with(IntroPreference::Once).await;
        assert!(first.should_show().await);

        fx.store().mark_seen().await;

        // Reload with the same durable store, new session.
        fx.store().end_session().await;
        let second = fx.mount(None).await;
        assert!(!second.should_show().await);
        assert!(second.is_complete().await);
    }

    #[tokio::test]
    async fn session_shows_once_per_session() {
        let fx = Fixture::new();
        let first = fx.mount_with(IntroPreference::Session).await;
        assert!(first.should_show().await);
        first.skip().await;

        let second = fx.mount(None).await;
        assert!(!second.should_show().await);

        fx.store().end_session().await;
        let third = fx.mount(None).await;
        assert!(third.should_show().await);
    }

    #[tokio::test]
    async fn reduced_motion_overrides_every_preference() {
        use IntroPreference::*;
        for pref in [Always, Session, Once, Never] {
            let fx = Fixture::new();
            fx.store().save_preference(pref).await;
            let c = fx.mount(Some(true)).await;
            assert_eq!(c.visibility().await, IntroVisibility::finished(), "{pref}");
        }
    }

    #[tokio::test]
    async fn missing_motion_api_animates() {
        let fx = Fixture::new();
        let c = fx.mount(None).await;
        assert!(c.should_show().await);
        let c = fx.mount(Some(false)).await;
        assert!(c.should_show().await);
    }

    #[tokio::test]
    async fn unavailable_storage_shows_intro() {
        let store = PreferenceStore::new(MemoryStore::unavailable(), MemoryStore::unavailable());
        let c = IntroStateController::mount(store, &StaticMotion(None), GRACE, event_channel())
            .await;
        assert_eq!(c.visibility().await, IntroVisibility::showing());
        // Skip still settles even though nothing persists.
        c.skip().await;
        assert_eq!(c.visibility().await, IntroVisibility::finished());
    }

    #[tokio::test]
    async fn skip_hides_immediately_and_marks_seen() {
        let fx = Fixture::new();
        let c = fx.mount(None).await;
        c.skip().await;
        assert_eq!(c.visibility().await, IntroVisibility::finished());
        assert_eq!(
            fx.store().load_seen_flags().await,
            SeenFlags {
                ever: true,
                session: true
            }
        );
    }

    #[tokio::test]
    async fn double_skip_matches_single_skip() {
        let single = Fixture::new();
        single.mount(None).await.skip().await;

        let double = Fixture::new();
        let c = double.mount(None).await;
        c.skip().await;
        c.skip().await;

        assert_eq!(single.durable.snapshot().await, double.durable.snapshot().await);
        assert_eq!(single.session.snapshot().await, double.session.snapshot().await);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_hides_after_grace() {
        let fx = Fixture::new();
        let c = fx.mount(None).await;

        c.complete().await;
        assert_eq!(
            c.visibility().await,
            IntroVisibility {
                should_show: true,
                is_complete: true
            }
        );
        assert!(fx.store().load_seen_flags().await.ever);

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(c.should_show().await);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(c.visibility().await, IntroVisibility::finished());
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_cancels_grace_timer() {
        let fx = Fixture::new();
        let c = fx.mount(None).await;
        c.complete().await;
        c.unmount();
        tokio::time::sleep(Duration::from_secs(1)).await;
        // Grace never ran; the overlay state is left as it was.
        assert!(c.should_show().await);
    }

    #[tokio::test]
    async fn set_preference_persists_and_broadcasts() {
        let fx = Fixture::new();
        let events = event_channel();
        let mut rx = events.subscribe();
        let c = IntroStateController::mount(fx.store(), &StaticMotion(None), GRACE, events).await;

        c.set_preference(IntroPreference::Once).await;
        assert_eq!(c.preference().await, IntroPreference::Once);
        assert_eq!(fx.store().load_preference().await, IntroPreference::Once);
        assert_eq!(
            rx.recv().await.unwrap(),
            IntroEvent::PreferenceChanged {
                preference: IntroPreference::Once
            }
        );
        // This mount keeps its decision.
        assert!(c.should_show().await);
    }

    #[tokio::test]
    async fn visibility_events_only_on_change() {
        let fx = Fixture::new();
        let events = event_channel();
        let mut rx = events.subscribe();
        let c = IntroStateController::mount(fx.store(), &StaticMotion(None), GRACE, events).await;

        c.skip().await;
        c.skip().await;

        assert_eq!(
            rx.recv().await.unwrap(),
            IntroEvent::visibility(IntroVisibility::finished())
        );
        assert!(rx.try_recv().is_err());
    }
}
