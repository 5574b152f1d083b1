//! Live briefing session state: per-item lifecycle, the narration
//! cursor, and the per-user session registry.

pub mod manager;
pub mod state;
pub mod tracker;

pub use manager::SessionManager;
pub use state::{Cursor, EmailState, EmailStatus, Progress};
pub use tracker::{CursorView, SessionTracker};
