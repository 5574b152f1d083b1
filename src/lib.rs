//! Inbox Briefing — voice-narratable inbox triage engine.
//!
//! Turns raw inbox messages into a prioritized, spoken briefing and lets a
//! voice-session host act on items through a conversational loop. The crate
//! is a library: speech transport, OAuth, and vendor LLM SDKs live in the
//! host process and are consumed through narrow traits.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod session;
pub mod signals;
pub mod store;
pub mod tools;
