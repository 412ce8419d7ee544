//! padrelay: turns phone browsers into game controllers.
//!
//! Phones connect over WebSocket (optionally upgrading input to a WebRTC
//! data channel), the relay aggregates every controller's latest frame and
//! pushes one consolidated state to the game display at a fixed rate. The
//! display side reads it back through [`pad::PadManager`].

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod pad;
pub mod relay;
pub mod ui;

pub use error::{RelayError, Result};
