//! Events published to renderers (terminal, WebSocket clients).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::preference::IntroPreference;
use super::script::LineStatus;
use super::state::{ExitReason, IntroVisibility, Phase};
use crate::config::IdentityCard;

/// Default broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Everything a renderer needs to draw the intro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntroEvent {
    /// Full state snapshot (sent to a renderer on connect).
    Sync {
        phase: Phase,
        should_show: bool,
        is_complete: bool,
        preference: IntroPreference,
    },
    /// The active phase changed.
    PhaseChanged {
        phase: Phase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<ExitReason>,
    },
    /// Overlay visibility or completion changed.
    VisibilityChanged { should_show: bool, is_complete: bool },
    /// A boot line started typing.
    LineStarted { id: String, status: LineStatus },
    /// A boot line revealed another character; `text` is everything shown so far.
    LineRevealed { id: String, text: String },
    /// A boot line finished typing.
    LineCompleted { id: String, status: LineStatus },
    /// The identity card is on screen.
    IdentityRevealed { identity: IdentityCard },
    /// The stored preference changed.
    PreferenceChanged { preference: IntroPreference },
}

impl IntroEvent {
    pub fn visibility(v: IntroVisibility) -> Self {
        Self::VisibilityChanged {
            should_show: v.should_show,
            is_complete: v.is_complete,
        }
    }
}

/// Create the shared event channel.
pub fn event_channel() -> broadcast::Sender<IntroEvent> {
    let (tx, _rx) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
    tx
}
