//! Intro preference and the reduced-motion collaborator.

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;

/// How often the visitor wants to see the intro.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroPreference {
    /// Every page load.
    #[default]
    Always,
    /// Once per browsing session.
    Session,
    /// Only on the very first visit.
    Once,
    /// Never.
    Never,
}

impl IntroPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Session => "session",
            Self::Once => "once",
            Self::Never => "never",
        }
    }
}

impl std::fmt::Display for IntroPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntroPreference {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "session" => Ok(Self::Session),
            "once" => Ok(Self::Once),
            "never" => Ok(Self::Never),
            other => Err(SequencerError::UnknownPreference(other.to_string())),
        }
    }
}

/// The persisted "seen" flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeenFlags {
    /// Durable across every future visit.
    pub ever: bool,
    /// Cleared when the browsing session ends.
    pub session: bool,
}

impl IntroPreference {
    /// Whether the intro should show for this preference given the seen flags.
    pub fn should_show(&self, flags: SeenFlags) -> bool {
        match self {
            Self::Always => true,
            Self::Session => !flags.session,
            Self::Once => !flags.ever,
            Self::Never => false,
        }
    }
}

/// OS-level reduced-motion accessibility query.
///
/// `None` means the host has no such API; that is treated as "animate".
pub trait MotionQuery: Send + Sync {
    fn prefers_reduced_motion(&self) -> Option<bool>;
}

/// A fixed answer, for hosts that resolve the query up front.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMotion(pub Option<bool>);

impl MotionQuery for StaticMotion {
    fn prefers_reduced_motion(&self) -> Option<bool> {
        self.0
    }
}
