//! Intro phase state machine and visibility state.

use serde::{Deserialize, Serialize};

/// The four mutually exclusive stages of the intro.
///
/// `Boot` → `Identity` → `Exit` → `Complete` on a natural run; skip jumps
/// from `Boot` or `Identity` straight to `Exit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Boot,
    Identity,
    Exit,
    Complete,
}

impl Phase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            (Boot, Identity) | (Boot, Exit) | (Identity, Exit) | (Exit, Complete)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether a user skip is honoured in this phase.
    pub fn accepts_skip(&self) -> bool {
        matches!(self, Self::Boot | Self::Identity)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Boot => "boot",
            Self::Identity => "identity",
            Self::Exit => "exit",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// How the sequence reached `Exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The identity stage finished on its own.
    Natural,
    /// The user skipped.
    Skipped,
}

/// Whether the intro overlay is mounted and whether it has finished.
///
/// Created fresh on every mount. After settling, `should_show` and
/// `is_complete` are never both true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntroVisibility {
    pub should_show: bool,
    pub is_complete: bool,
}

impl IntroVisibility {
    /// Overlay hidden, intro done.
    pub fn finished() -> Self {
        Self {
            should_show: false,
            is_complete: true,
        }
    }

    /// Overlay up, intro running.
    pub fn showing() -> Self {
        Self {
            should_show: true,
            is_complete: false,
        }
    }

    /// The overlay is up and still accepts input.
    pub fn is_active(&self) -> bool {
        self.should_show && !self.is_complete
    }
}
