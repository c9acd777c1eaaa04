//! ReplyDraft - template selection and rendering for support-ticket replies
//!
//! ReplyDraft turns a detected ticket state plus classified intents into a
//! drafted customer reply. An explicit selection cascade picks one template
//! configuration (state:intent matrix first, embedded generic template
//! last, so selection is total), the stencil interpreter renders it against
//! a layered context, alert fragments land before the signature, and a
//! cleanup pass removes whatever syntax the data could not fill. A broken
//! registry or a missing file degrades the draft, never the pipeline.
//!
//! # Modules
//!
//! - [`engine`] - The `ResponseEngine` facade running the full pipeline
//! - [`selector`] - Ordered selection cascade over the registry
//! - [`registry`] - YAML registry of blocks, base templates and the matrix
//! - [`context`] - Layered context lookup with the legacy alias table
//! - [`blocks`] - Cached block/partial store over the templates root
//! - [`intention`] - Intent to `intention_*` flag auto-mapping
//! - [`alerts`] - Alert fragment injection before the signature
//! - [`embedded`] - Compiled-in fallback template, signature and fragments
//! - [`domain`] - Wire types shared with the detector and the CRM step
//! - [`error`] - Typed registry loading errors

pub mod alerts;
pub mod blocks;
pub mod context;
pub mod domain;
pub mod embedded;
pub mod engine;
pub mod error;
pub mod intention;
pub mod registry;
pub mod selector;

// Re-export commonly used types
pub use context::RenderContext;
pub use domain::{Alert, DetectedState, IntentResult, Priority, RenderResult, Severity};
pub use engine::{RESERVED_PLACEHOLDERS, ResponseEngine};
pub use error::EngineError;
pub use intention::{INTENTION_FLAGS, IntentionMapping, apply_intent_flags};
pub use registry::{TemplateConfig, TemplateRegistry};
pub use selector::{DEFAULT_CASCADE, Selection, SelectionRule, Selector, UberCase, condition_holds};
