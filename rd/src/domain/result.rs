//! Drafted reply

use serde::{Deserialize, Serialize};

/// The drafted reply plus an audit of how it was assembled.
///
/// `template_used` is the registry key that matched; `template_file` is the
/// file (or embedded source) the body came from. The audit lists let the
/// review UI show what was substituted, included and injected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    /// Final cleaned reply text
    pub response_text: String,

    /// Registry key of the matched template config
    pub template_used: String,

    /// File reference the body text was loaded from
    pub template_file: String,

    /// Variable paths that received a value
    #[serde(default)]
    pub placeholders_replaced: Vec<String>,

    /// Reserved placeholder names left for the external generation step
    #[serde(default)]
    pub ai_sections_generated: Vec<String>,

    /// Alert types whose fragments were injected
    #[serde(default)]
    pub alerts_included: Vec<String>,

    /// Block names appended or included as partials
    #[serde(default)]
    pub blocks_included: Vec<String>,

    /// CRM field updates requested by the matched config, passed through
    /// for the downstream CRM step
    #[serde(default)]
    pub crm_updates: Vec<String>,
}

impl RenderResult {
    /// True when the reply still carries the reserved personalization slot
    pub fn awaits_personalization(&self) -> bool {
        !self.ai_sections_generated.is_empty()
    }
}
