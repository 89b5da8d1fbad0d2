//! Intro sequencing: the splash shown before the main site.
//!
//! On mount the controller decides from the stored preference, the seen
//! flags, and the reduced-motion signal whether the intro shows. If it does,
//! the sequencer walks `boot → identity → exit → complete`, typing the boot
//! script, and the user can skip from `boot` or `identity` at any time.

pub mod controller;
pub mod events;
pub mod preference;
pub mod script;
pub mod sequencer;
pub mod site;
pub mod state;
pub mod timer;
pub mod typing;

pub use controller::IntroStateController;
pub use events::IntroEvent;
pub use preference::{IntroPreference, MotionQuery, SeenFlags, StaticMotion};
pub use script::{LineStatus, TerminalLine};
pub use sequencer::{IntroHandle, IntroSnapshot, Key};
pub use site::IntroSite;
pub use state::{ExitReason, IntroVisibility, Phase};
pub use timer::TimerSet;
pub use typing::TypingLineScheduler;
