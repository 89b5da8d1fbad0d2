//! Boot script data: the terminal lines typed out during the boot phase.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Color/status class of a terminal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Loading,
    Success,
    #[default]
    Info,
}

/// One line of the boot script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalLine {
    pub id: String,
    pub text: String,
    /// Delay from sequence start before this line begins typing.
    pub start_delay_ms: u64,
    #[serde(default)]
    pub status: LineStatus,
}

impl TerminalLine {
    pub fn new(id: &str, text: &str, start_delay_ms: u64, status: LineStatus) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            start_delay_ms,
            status,
        }
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Number of reveal steps (Unicode scalar values, not bytes).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Offset from sequence start at which the last character is revealed.
    pub fn completes_at(&self, cadence: Duration) -> Duration {
        self.start_delay() + cadence * self.char_len() as u32
    }

    /// The first `n` characters of the line.
    pub fn prefix(&self, n: usize) -> String {
        self.text.chars().take(n).collect()
    }
}

/// The script shown on the original site.
pub fn reference_script() -> Vec<TerminalLine> {
    vec![
        TerminalLine::new("1", "> INITIALIZING SYSTEM...", 0, LineStatus::Loading),
        TerminalLine::new("2", "> LOADING PORTFOLIO v2.0", 600, LineStatus::Loading),
        TerminalLine::new("3", "> ESTABLISHING CONNECTION...", 1200, LineStatus::Loading),
        TerminalLine::new("4", "> DECRYPTING ASSETS...", 1800, LineStatus::Loading),
        TerminalLine::new("5", "> STATUS: ONLINE", 2400, LineStatus::Success),
    ]
}

/// Offset of the latest line completion; zero for an empty script.
pub fn script_duration(script: &[TerminalLine], cadence: Duration) -> Duration {
    script
        .iter()
        .map(|line| line.completes_at(cadence))
        .max()
        .unwrap_or(Duration::ZERO)
}
