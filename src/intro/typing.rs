//! TypingLineScheduler reveals the boot script one character at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use super::events::IntroEvent;
use super::script::{TerminalLine, script_duration};
use super::timer::TimerSet;

/// Schedules per-line typing and the overall completion callback.
#[derive(Debug, Clone, Copy)]
pub struct TypingLineScheduler {
    /// Delay between revealed characters.
    pub cadence: Duration,
    /// Pause after the last line finishes before completion fires.
    pub trailing: Duration,
}

impl TypingLineScheduler {
    pub fn new(cadence: Duration, trailing: Duration) -> Self {
        Self { cadence, trailing }
    }

    /// Offset from start at which `on_complete` fires.
    pub fn total_duration(&self, script: &[TerminalLine]) -> Duration {
        script_duration(script, self.cadence) + self.trailing
    }

    /// Start the whole schedule from line 0.
    ///
    /// Every line gets its own reveal task; `on_complete` fires once after the
    /// trailing pause. Nothing is revealed or reported once `skipping` is set,
    /// and dropping (or cancelling) the returned set stops everything.
    pub fn start<F>(
        &self,
        script: Arc<[TerminalLine]>,
        skipping: Arc<AtomicBool>,
        events: broadcast::Sender<IntroEvent>,
        on_complete: F,
    ) -> TimerSet
    where
        F: FnOnce() + Send + 'static,
    {
        let mut timers = TimerSet::new();
        let origin = Instant::now();

        if skipping.load(Ordering::SeqCst) {
            debug!("Boot script not started, skip in flight");
            return timers;
        }

        for index in 0..script.len() {
            let script = Arc::clone(&script);
            let skipping = Arc::clone(&skipping);
            let events = events.clone();
            let cadence = self.cadence;
            timers.spawn(async move {
                let line = &script[index];
                reveal_line(line, origin, cadence, &skipping, &events).await;
            });
        }

        let done_at = origin + self.total_duration(&script);
        let lines = script.len();
        timers.schedule_at(done_at, move || {
            if skipping.load(Ordering::SeqCst) {
                return;
            }
            debug!(lines, "Boot script finished");
            on_complete();
        });

        timers
    }
}

async fn reveal_line(
    line: &TerminalLine,
    origin: Instant,
    cadence: Duration,
    skipping: &AtomicBool,
    events: &broadcast::Sender<IntroEvent>,
) {
    let start = origin + line.start_delay();
    tokio::time::sleep_until(start).await;
    if skipping.load(Ordering::SeqCst) {
        return;
    }
    let _ = events.send(IntroEvent::LineStarted {
        id: line.id.clone(),
        status: line.status,
    });

    // Deadlines are computed from the origin so reveals don't drift.
    for n in 1..=line.char_len() {
        tokio::time::sleep_until(start + cadence * n as u32).await;
        if skipping.load(Ordering::SeqCst) {
            return;
        }
        let _ = events.send(IntroEvent::LineRevealed {
            id: line.id.clone(),
            text: line.prefix(n),
        });
    }

    let _ = events.send(IntroEvent::LineCompleted {
        id: line.id.clone(),
        status: line.status,
    });
}
