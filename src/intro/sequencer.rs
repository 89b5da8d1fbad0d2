//! PhaseSequencer drives `boot → identity → exit → complete`.
//!
//! A single driver task owns the phase, the skip flag, and every phase timer.
//! Timers never touch state directly: they post a command tagged with the
//! epoch of the phase that scheduled them, and the driver drops commands from
//! an older epoch. Leaving a phase bumps the epoch and aborts its timers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::controller::IntroStateController;
use super::events::{IntroEvent, event_channel};
use super::preference::{IntroPreference, MotionQuery};
use super::script::TerminalLine;
use super::state::{ExitReason, Phase};
use super::timer::TimerSet;
use super::typing::TypingLineScheduler;
use crate::config::{IdentityCard, IntroConfig, IntroTimings};
use crate::error::SequencerError;
use crate::store::PreferenceStore;

/// A key press, named the way browsers name `KeyboardEvent.key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
    Escape,
    Space,
    Char(char),
    Other(String),
}

impl Key {
    /// Every key except Tab skips, so keyboard focus navigation still works.
    pub fn skips_intro(&self) -> bool {
        !matches!(self, Self::Tab)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        match name {
            "Tab" | "\t" => Self::Tab,
            "Enter" | "" => Self::Enter,
            "Escape" | "Esc" => Self::Escape,
            " " | "Space" => Self::Space,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::Char(c),
                    _ => Self::Other(other.to_string()),
                }
            }
        }
    }
}

/// Timers the sequencer schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseTimer {
    BootDone,
    IdentityDone,
    ExitElapsed,
}

enum Command {
    Skip,
    Fired { epoch: u64, timer: PhaseTimer },
    Shutdown,
}

/// Point-in-time view of a mounted intro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntroSnapshot {
    pub phase: Phase,
    pub should_show: bool,
    pub is_complete: bool,
    pub preference: IntroPreference,
    pub skip_available: bool,
}

/// A mounted intro. Dropping it unmounts: every pending timer is cancelled.
pub struct IntroHandle {
    controller: Arc<IntroStateController>,
    commands: mpsc::UnboundedSender<Command>,
    phase: watch::Receiver<Phase>,
    events: broadcast::Sender<IntroEvent>,
    driver: Option<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
}

impl IntroHandle {
    /// Evaluate visibility and, if the intro shows, start the boot phase.
    pub async fn mount(
        store: PreferenceStore,
        motion: &dyn MotionQuery,
        config: IntroConfig,
    ) -> Self {
        Self::mount_with_events(store, motion, config, event_channel()).await
    }

    /// Like [`IntroHandle::mount`], publishing on an existing event channel.
    pub async fn mount_with_events(
        store: PreferenceStore,
        motion: &dyn MotionQuery,
        config: IntroConfig,
        events: broadcast::Sender<IntroEvent>,
    ) -> Self {
        let controller = IntroStateController::mount(
            store,
            motion,
            config.timings.completion_grace,
            events.clone(),
        )
        .await;

        let (commands, rx) = mpsc::unbounded_channel();
        let stopping = Arc::new(AtomicBool::new(false));

        if !controller.should_show().await {
            let (_tx, phase) = watch::channel(Phase::Complete);
            return Self {
                controller,
                commands,
                phase,
                events,
                driver: None,
                stopping,
            };
        }

        let (phase_tx, phase) = watch::channel(Phase::Boot);
        let mut sequencer = PhaseSequencer {
            controller: Arc::clone(&controller),
            timings: config.timings,
            identity: config.identity,
            script: config.script.into(),
            phase: phase_tx,
            events: events.clone(),
            skipping: Arc::new(AtomicBool::new(false)),
            epoch: 0,
            timers: TimerSet::new(),
            commands: commands.clone(),
            stopping: Arc::clone(&stopping),
        };
        sequencer.enter_boot();
        let driver = tokio::spawn(sequencer.run(rx));

        Self {
            controller,
            commands,
            phase,
            events,
            driver: Some(driver),
            stopping,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Watch phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }

    /// Subscribe to renderer events.
    pub fn subscribe(&self) -> broadcast::Receiver<IntroEvent> {
        self.events.subscribe()
    }

    pub fn controller(&self) -> &Arc<IntroStateController> {
        &self.controller
    }

    /// Whether an explicit skip control should be offered.
    pub fn skip_available(&self) -> bool {
        self.phase().accepts_skip()
    }

    pub async fn snapshot(&self) -> IntroSnapshot {
        let visibility = self.controller.visibility().await;
        IntroSnapshot {
            phase: self.phase(),
            should_show: visibility.should_show,
            is_complete: visibility.is_complete,
            preference: self.controller.preference().await,
            skip_available: self.skip_available(),
        }
    }

    /// Request a skip (skip button). Refused outside `boot`/`identity`.
    pub fn skip(&self) -> Result<(), SequencerError> {
        if self.driver.is_none() {
            return Err(SequencerError::Unmounted);
        }
        let phase = self.phase();
        if !phase.accepts_skip() {
            return Err(SequencerError::SkipUnavailable(phase));
        }
        self.commands
            .send(Command::Skip)
            .map_err(|_| SequencerError::Unmounted)
    }

    /// Route a key press. Returns whether it was taken as a skip request.
    pub async fn key_pressed(&self, key: Key) -> bool {
        if !key.skips_intro() {
            return false;
        }
        if !self.controller.visibility().await.is_active() {
            return false;
        }
        debug!(?key, "Key press skips intro");
        self.skip().is_ok()
    }

    pub async fn set_preference(&self, pref: IntroPreference) {
        self.controller.set_preference(pref).await;
    }

    /// Wait until the sequence reaches `complete`.
    pub async fn wait_complete(&self) {
        let mut phase = self.phase.clone();
        let _ = phase.wait_for(|p| p.is_terminal()).await;
    }

    /// Tear down the intro: cancel every pending timer.
    pub fn unmount(mut self) {
        self.stop();
    }

    /// Detach the driver. A command it is already running (a `mark_seen`
    /// write, say) finishes; anything queued behind it is dropped.
    pub(crate) fn stop(&mut self) {
        if self.driver.take().is_some() {
            self.stopping.store(true, Ordering::SeqCst);
            let _ = self.commands.send(Command::Shutdown);
        }
        self.controller.unmount();
    }
}

impl Drop for IntroHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Driver-owned sequencing state.
struct PhaseSequencer {
    controller: Arc<IntroStateController>,
    timings: IntroTimings,
    identity: IdentityCard,
    script: Arc<[TerminalLine]>,
    phase: watch::Sender<Phase>,
    events: broadcast::Sender<IntroEvent>,
    skipping: Arc<AtomicBool>,
    epoch: u64,
    timers: TimerSet,
    commands: mpsc::UnboundedSender<Command>,
    stopping: Arc<AtomicBool>,
}

impl PhaseSequencer {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            match command {
                Command::Shutdown => break,
                Command::Skip => self.begin_skip(),
                Command::Fired { epoch, timer } if epoch == self.epoch => {
                    self.on_timer(timer).await
                }
                Command::Fired { epoch, timer } => {
                    debug!(?timer, epoch, current = self.epoch, "Stale timer ignored");
                }
            }
            if self.current().is_terminal() {
                break;
            }
        }
        self.timers.cancel_all();
        if self.stopping.load(Ordering::SeqCst) {
            // complete() may have armed a grace timer after the handle let go.
            self.controller.unmount();
        }
        debug!("Intro sequencer stopped");
    }

    fn current(&self) -> Phase {
        *self.phase.borrow()
    }

    fn is_skipping(&self) -> bool {
        self.skipping.load(Ordering::SeqCst)
    }

    fn enter_boot(&mut self) {
        let _ = self.events.send(IntroEvent::PhaseChanged {
            phase: Phase::Boot,
            reason: None,
        });
        info!(lines = self.script.len(), "Intro boot started");

        let typing =
            TypingLineScheduler::new(self.timings.typing_cadence, self.timings.boot_trailing);
        let tx = self.commands.clone();
        let epoch = self.epoch;
        let timers = typing.start(
            Arc::clone(&self.script),
            Arc::clone(&self.skipping),
            self.events.clone(),
            move || {
                let _ = tx.send(Command::Fired {
                    epoch,
                    timer: PhaseTimer::BootDone,
                });
            },
        );
        self.timers.absorb(timers);
    }

    fn enter_identity(&mut self) {
        if !self.transition(Phase::Identity, None) {
            return;
        }
        let _ = self.events.send(IntroEvent::IdentityRevealed {
            identity: self.identity.clone(),
        });

        // Scheduled once per entry; the skip flag suppresses it like the boot
        // script's own completion.
        let tx = self.commands.clone();
        let epoch = self.epoch;
        let skipping = Arc::clone(&self.skipping);
        self.timers.schedule(self.timings.identity_dwell, move || {
            if skipping.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(Command::Fired {
                epoch,
                timer: PhaseTimer::IdentityDone,
            });
        });
    }

    fn enter_exit(&mut self, reason: ExitReason) {
        if !self.transition(Phase::Exit, Some(reason)) {
            return;
        }
        let duration = match reason {
            ExitReason::Natural => self.timings.natural_exit,
            ExitReason::Skipped => self.timings.skip_exit,
        };
        self.schedule(duration, PhaseTimer::ExitElapsed);
    }

    fn begin_skip(&mut self) {
        let phase = self.current();
        if self.is_skipping() || !phase.accepts_skip() {
            debug!(%phase, "Skip ignored");
            return;
        }
        self.skipping.store(true, Ordering::SeqCst);
        info!(%phase, "Intro skip requested");
        self.enter_exit(ExitReason::Skipped);
    }

    async fn on_timer(&mut self, timer: PhaseTimer) {
        match timer {
            PhaseTimer::BootDone => {
                if self.is_skipping() {
                    debug!("Boot finished during skip, staying on exit path");
                    return;
                }
                self.enter_identity();
            }
            PhaseTimer::IdentityDone => {
                if self.is_skipping() {
                    return;
                }
                self.enter_exit(ExitReason::Natural);
            }
            PhaseTimer::ExitElapsed => {
                if self.is_skipping() {
                    self.controller.skip().await;
                } else {
                    self.controller.complete().await;
                }
                self.transition(Phase::Complete, None);
            }
        }
    }

    /// Move to `next`, cancelling everything the old phase scheduled.
    fn transition(&mut self, next: Phase, reason: Option<ExitReason>) -> bool {
        let from = self.current();
        if !from.can_transition_to(next) {
            warn!(%from, to = %next, "Invalid intro phase transition");
            return false;
        }
        self.epoch += 1;
        self.timers.cancel_all();
        self.phase.send_replace(next);
        let _ = self.events.send(IntroEvent::PhaseChanged {
            phase: next,
            reason,
        });
        info!(%from, to = %next, ?reason, "Intro phase changed");
        true
    }

    fn schedule(&mut self, delay: std::time::Duration, timer: PhaseTimer) {
        let tx = self.commands.clone();
        let epoch = self.epoch;
        self.timers.schedule(delay, move || {
            let _ = tx.send(Command::Fired { epoch, timer });
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::intro::preference::StaticMotion;
    use crate::intro::state::IntroVisibility;
    use crate::error::StorageError;
    use crate::store::{KeyValueStore, MemoryStore, storage_keys};

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

        async fn mount(&self, config: IntroConfig) -> IntroHandle {
            IntroHandle::mount(self.store(), &StaticMotion(None), config).await
        }

        fn seen_writes(&self) -> usize {
            // Both flags are written once per mark_seen.
            assert_eq!(self.durable.write_count(), self.session.write_count());
            self.session.write_count()
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn phases(rx: &mut broadcast::Receiver<IntroEvent>) -> Vec<Phase> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let IntroEvent::PhaseChanged { phase, .. } = event {
                out.push(phase);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn natural_run_walks_every_phase() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;
        let mut rx = handle.subscribe();
        assert_eq!(handle.phase(), Phase::Boot);

        // Boot: 2880ms of typing + 500ms trailing.
        sleep_ms(3379).await;
        assert_eq!(handle.phase(), Phase::Boot);
        sleep_ms(2).await;
        assert_eq!(handle.phase(), Phase::Identity);

        // Identity dwell: 1500ms.
        sleep_ms(1498).await;
        assert_eq!(handle.phase(), Phase::Identity);
        sleep_ms(2).await;
        assert_eq!(handle.phase(), Phase::Exit);

        // Natural exit: 800ms, then complete() runs.
        sleep_ms(798).await;
        assert_eq!(handle.phase(), Phase::Exit);
        assert_eq!(fx.seen_writes(), 0);
        sleep_ms(2).await;
        assert_eq!(handle.phase(), Phase::Complete);
        assert_eq!(fx.seen_writes(), 1);

        // complete(), not skip(): overlay stays up for the grace window.
        assert_eq!(
            handle.controller().visibility().await,
            IntroVisibility {
                should_show: true,
                is_complete: true
            }
        );
        sleep_ms(498).await;
        assert!(handle.controller().should_show().await);
        sleep_ms(2).await;
        assert_eq!(
            handle.controller().visibility().await,
            IntroVisibility::finished()
        );

        assert_eq!(
            phases(&mut rx),
            vec![Phase::Identity, Phase::Exit, Phase::Complete]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn skip_during_boot_never_enters_identity() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;
        let mut rx = handle.subscribe();

        sleep_ms(500).await;
        handle.skip().unwrap();
        sleep_ms(1).await;
        assert_eq!(handle.phase(), Phase::Exit);
        assert!(!handle.skip_available());

        sleep_ms(300).await;
        assert_eq!(handle.phase(), Phase::Complete);
        assert_eq!(
            handle.controller().visibility().await,
            IntroVisibility::finished()
        );

        // Long past where boot would have finished on its own.
        sleep_ms(10_000).await;
        assert_eq!(phases(&mut rx), vec![Phase::Exit, Phase::Complete]);
        assert_eq!(fx.seen_writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_during_identity() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;

        sleep_ms(3500).await;
        assert_eq!(handle.phase(), Phase::Identity);
        assert!(handle.key_pressed(Key::Escape).await);
        sleep_ms(1).await;
        assert_eq!(handle.phase(), Phase::Exit);

        sleep_ms(300).await;
        assert_eq!(handle.phase(), Phase::Complete);

        // The identity dwell and natural exit never fire.
        sleep_ms(5000).await;
        assert_eq!(fx.seen_writes(), 1);
        assert_eq!(
            handle.controller().visibility().await,
            IntroVisibility::finished()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn key_press_end_to_end() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;
        let mut rx = handle.subscribe();

        sleep_ms(100).await;
        assert_eq!(handle.phase(), Phase::Boot);
        assert!(handle.key_pressed(Key::Char('x')).await);
        sleep_ms(1).await;
        assert_eq!(handle.phase(), Phase::Exit);

        // 100 + 300 = 400
        sleep_ms(298).await;
        assert_eq!(handle.phase(), Phase::Exit);
        sleep_ms(2).await;
        assert_eq!(handle.phase(), Phase::Complete);

        sleep_ms(10_000).await;
        assert_eq!(phases(&mut rx), vec![Phase::Exit, Phase::Complete]);
        assert_eq!(fx.seen_writes(), 1);
        assert_eq!(
            fx.durable
                .get(storage_keys::HAS_SEEN_INTRO)
                .await
                .unwrap()
                .as_deref(),
            Some("true")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tab_does_not_skip() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;

        assert!(!handle.key_pressed(Key::Tab).await);
        sleep_ms(10).await;
        assert_eq!(handle.phase(), Phase::Boot);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_skips_leave_no_orphaned_timers() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;

        sleep_ms(50).await;
        handle.skip().unwrap();
        for _ in 0..5 {
            let _ = handle.skip();
            handle.key_pressed(Key::Enter).await;
        }
        sleep_ms(100).await;
        assert!(matches!(
            handle.skip(),
            Err(SequencerError::SkipUnavailable(Phase::Exit))
        ));
        assert!(!handle.key_pressed(Key::Enter).await);

        sleep_ms(20_000).await;
        assert_eq!(handle.phase(), Phase::Complete);
        assert_eq!(fx.seen_writes(), 1);
        assert_eq!(
            handle.controller().visibility().await,
            IntroVisibility::finished()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn keys_ignored_once_complete() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;
        handle.skip().unwrap();
        sleep_ms(400).await;
        assert_eq!(handle.phase(), Phase::Complete);

        assert!(!handle.key_pressed(Key::Enter).await);
        sleep_ms(1000).await;
        assert_eq!(fx.seen_writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_refused_during_natural_exit() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;

        sleep_ms(5000).await;
        assert_eq!(handle.phase(), Phase::Exit);
        assert!(handle.controller().visibility().await.is_active());

        // Refused up front, so callers are told the truth.
        assert!(matches!(
            handle.skip(),
            Err(SequencerError::SkipUnavailable(Phase::Exit))
        ));
        assert!(!handle.key_pressed(Key::Enter).await);
        sleep_ms(1000).await;

        assert_eq!(handle.phase(), Phase::Complete);
        assert_eq!(fx.seen_writes(), 1);
        // Natural path: the overlay lingers through the grace window.
        assert!(handle.controller().visibility().await.is_complete);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_script_does_not_hang() {
        let fx = Fixture::new();
        let config = IntroConfig {
            script: Vec::new(),
            ..IntroConfig::default()
        };
        let handle = fx.mount(config).await;

        sleep_ms(499).await;
        assert_eq!(handle.phase(), Phase::Boot);
        sleep_ms(2).await;
        assert_eq!(handle.phase(), Phase::Identity);

        handle.wait_complete().await;
        assert_eq!(handle.phase(), Phase::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_intro_mounts_complete() {
        let fx = Fixture::new();
        fx.store().save_preference(IntroPreference::Never).await;
        let handle = fx.mount(IntroConfig::default()).await;

        assert_eq!(handle.phase(), Phase::Complete);
        assert!(matches!(handle.skip(), Err(SequencerError::Unmounted)));
        assert!(!handle.key_pressed(Key::Enter).await);
        let snapshot = handle.snapshot().await;
        assert!(!snapshot.should_show);
        assert!(snapshot.is_complete);
        assert!(!snapshot.skip_available);
    }

    #[tokio::test(start_paused = true)]
    async fn reduced_motion_mounts_complete() {
        let fx = Fixture::new();
        let handle =
            IntroHandle::mount(fx.store(), &StaticMotion(Some(true)), IntroConfig::default())
                .await;
        assert_eq!(handle.phase(), Phase::Complete);
        assert_eq!(fx.seen_writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_cancels_everything() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;
        let mut rx = handle.subscribe();

        sleep_ms(100).await;
        handle.unmount();
        while rx.try_recv().is_ok() {}

        sleep_ms(20_000).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed)
        ));
        assert_eq!(fx.seen_writes(), 0);
    }

    /// Writes take 10ms, so an unmount can land between the two seen-flags.
    struct SlowStore(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl KeyValueStore for SlowStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            sleep_ms(10).await;
            self.0.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<bool, StorageError> {
            self.0.remove(key).await
        }

        async fn clear(&self) -> Result<(), StorageError> {
            self.0.clear().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_mid_write_keeps_seen_flags_together() {
        let fx = Fixture::new();
        let store = PreferenceStore::new(
            Arc::new(SlowStore(fx.durable.clone())),
            Arc::new(SlowStore(fx.session.clone())),
        );
        let handle = IntroHandle::mount(store, &StaticMotion(None), IntroConfig::default()).await;

        handle.skip().unwrap();
        // Skip exit ends at 300ms; durable flag lands at 310, session at 320.
        sleep_ms(305).await;
        assert_eq!(fx.durable.write_count(), 0);
        handle.unmount();

        sleep_ms(100).await;
        let flags = fx.store().load_seen_flags().await;
        assert!(flags.ever);
        assert!(flags.session);
        assert_eq!(fx.seen_writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn identity_card_is_published() {
        let fx = Fixture::new();
        let handle = fx.mount(IntroConfig::default()).await;
        let mut rx = handle.subscribe();

        sleep_ms(3400).await;
        let identity = std::iter::from_fn(|| rx.try_recv().ok()).find_map(|e| match e {
            IntroEvent::IdentityRevealed { identity } => Some(identity),
            _ => None,
        });
        assert_eq!(identity, Some(IdentityCard::default()));
    }

    #[test]
    fn key_names() {
        assert_eq!(Key::from("Tab"), Key::Tab);
        assert_eq!(Key::from("Enter"), Key::Enter);
        assert_eq!(Key::from("q"), Key::Char('q'));
        assert_eq!(Key::from("ArrowUp"), Key::Other("ArrowUp".into()));
        assert!(!Key::Tab.skips_intro());
        assert!(Key::Other("F5".into()).skips_intro());
    }
}
