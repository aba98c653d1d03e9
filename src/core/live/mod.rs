//! Live generation session module.
//!
//! Abstractions over a remote bidirectional generation service plus the
//! Gemini Live implementation.
//!
//! # Architecture
//!
//! - `LiveConnector` opens sessions and probes reachability
//! - `LiveSession` is the handle the bridge owns for one request
//! - `LiveEvent`s arrive in order on a bounded channel

mod base;
pub mod gemini;

pub use base::{
    LiveConnection, LiveConnector, LiveCredential, LiveError, LiveEvent, LiveResult, LiveSession,
    LiveTarget, ProbeFailure,
};
pub use gemini::{GeminiLiveConfig, GeminiLiveConnector, is_turn_complete};
