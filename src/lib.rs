//! Intro Sequencer: the splash/boot-sequence intro state machine.

pub mod config;
pub mod error;
pub mod intro;
pub mod render;
pub mod routes;
pub mod store;
