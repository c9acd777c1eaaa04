//! Classified customer intents

use serde::{Deserialize, Serialize};

/// What the customer is asking for, as classified upstream.
///
/// The primary intent drives matrix selection; secondaries still contribute
/// auto-mapped section flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    /// Dominant intent, e.g. "REPORT_DATE"
    #[serde(default)]
    pub primary_intent: Option<String>,

    /// Additional intents detected in the same message
    #[serde(default)]
    pub secondary_intents: Vec<String>,
}

impl IntentResult {
    /// No detected intent at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Single primary intent
    pub fn primary(intent: impl Into<String>) -> Self {
        Self {
            primary_intent: Some(intent.into()),
            secondary_intents: Vec::new(),
        }
    }

    /// Add a secondary intent
    pub fn with_secondary(mut self, intent: impl Into<String>) -> Self {
        self.secondary_intents.push(intent.into());
        self
    }

    /// Primary first, then secondaries, in order
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.primary_intent
            .iter()
            .map(String::as_str)
            .chain(self.secondary_intents.iter().map(String::as_str))
    }
}
