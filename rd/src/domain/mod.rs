//! Domain types for reply drafting
//!
//! Core types exchanged with the surrounding triage pipeline: the detected
//! ticket state, the classified customer intents, and the drafted reply.
//! All are serde wire types using camelCase field names.

mod intent;
mod result;
mod state;

pub use intent::IntentResult;
pub use result::RenderResult;
pub use state::{Alert, DetectedState, Priority, Severity};
