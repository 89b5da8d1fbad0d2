//! Configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::intro::script::{TerminalLine, reference_script};

/// Every interval the intro waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntroTimings {
    /// Delay between revealed characters of a boot line.
    pub typing_cadence: Duration,
    /// Pause after the last boot line finishes before boot reports done.
    pub boot_trailing: Duration,
    /// How long the identity card stays before auto-advancing.
    pub identity_dwell: Duration,
    /// Exit animation length on a natural run.
    pub natural_exit: Duration,
    /// Exit animation length after a skip.
    pub skip_exit: Duration,
    /// Delay between `complete()` and hiding the overlay.
    pub completion_grace: Duration,
}

impl Default for IntroTimings {
    fn default() -> Self {
        Self {
            typing_cadence: Duration::from_millis(30),
            boot_trailing: Duration::from_millis(500),
            identity_dwell: Duration::from_millis(1500),
            natural_exit: Duration::from_millis(800),
            skip_exit: Duration::from_millis(300),
            completion_grace: Duration::from_millis(500),
        }
    }
}

/// Text shown during the identity phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCard {
    pub name: String,
    pub role: String,
    pub tagline: String,
}

impl Default for IdentityCard {
    fn default() -> Self {
        Self {
            name: "TIM ZHUANG".to_string(),
            role: "SOFTWARE ENGINEER".to_string(),
            tagline: "Building the future, one commit at a time.".to_string(),
        }
    }
}

/// Everything needed to mount an intro.
#[derive(Debug, Clone, PartialEq)]
pub struct IntroConfig {
    pub timings: IntroTimings,
    pub identity: IdentityCard,
    pub script: Vec<TerminalLine>,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            timings: IntroTimings::default(),
            identity: IdentityCard::default(),
            script: reference_script(),
        }
    }
}

impl IntroConfig {
    /// Build from environment variables, falling back to the built-in script
    /// and identity.
    ///
    /// - `INTRO_SCRIPT_PATH`: JSON array of terminal lines
    /// - `INTRO_NAME`, `INTRO_ROLE`, `INTRO_TAGLINE`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("INTRO_SCRIPT_PATH") {
            config.script = load_script(Path::new(&path))?;
        }
        if let Ok(name) = std::env::var("INTRO_NAME") {
            config.identity.name = name;
        }
        if let Ok(role) = std::env::var("INTRO_ROLE") {
            config.identity.role = role;
        }
        if let Ok(tagline) = std::env::var("INTRO_TAGLINE") {
            config.identity.tagline = tagline;
        }

        Ok(config)
    }
}

/// Read a boot script from a JSON file.
pub fn load_script(path: &Path) -> Result<Vec<TerminalLine>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
        key: "INTRO_SCRIPT_PATH".to_string(),
        message: format!("{}: {e}", path.display()),
    })
}

/// Settings for the terminal/HTTP host binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub http_port: u16,
    /// `None` when the host cannot tell (treated as "animate").
    pub reduced_motion: Option<bool>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var("INTRO_DB_PATH")
            .unwrap_or_else(|_| "./data/intro.db".to_string())
            .into();

        let http_port = match std::env::var("INTRO_HTTP_PORT") {
            Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "INTRO_HTTP_PORT".to_string(),
                message: format!("{e}"),
            })?,
            Err(_) => 8080,
        };

        let reduced_motion = std::env::var("INTRO_REDUCED_MOTION")
            .ok()
            .and_then(|s| parse_flag(&s));

        Ok(Self {
            db_path,
            http_port,
            reduced_motion,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "reduce" => Some(true),
        "0" | "false" | "no" | "no-preference" => Some(false),
        _ => None,
    }
}
