//! Template registry loading
//!
//! The registry is a single YAML document with three sections:
//!
//! ```yaml
//! blocks_registry:
//!   action_paiement: blocks/action_paiement.html
//!
//! base_templates:
//!   ready_to_pay:
//!     forEvalbox: "Pret a payer"
//!     file: templates/ready_to_pay.md
//!     blocks: [action_paiement]
//!
//! matrix:
//!   "VALIDE_CMA_WAITING_CONVOC:REPORT_DATE":
//!     file: templates/report_blocked.md
//!     contextFlags: { reportBloque: true }
//! ```
//!
//! Base templates keep their declared order: selection passes walk them top
//! to bottom, so "first declared wins" is deterministic. A malformed entry
//! is skipped with a warning; the rest of the document still loads. A
//! missing or unreadable document degrades to an empty registry, which
//! leaves only the embedded universal fallback.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::EngineError;

/// One template entry: a trigger shape plus its payload.
///
/// Exactly one of the `for_*` fields normally drives the match, except
/// `for_condition`, which may also refine a `for_intention` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    /// Matches when the detected state name equals this exactly
    #[serde(default)]
    pub for_state: Option<String>,

    /// Matches when the primary intent equals this
    #[serde(default)]
    pub for_intention: Option<String>,

    /// Context condition: `path == literal`, `path != literal`, or a bare
    /// path checked for truthiness
    #[serde(default)]
    pub for_condition: Option<String>,

    /// Matches the derived Uber milestone case (NOT_UBER, CASE_A, ...)
    #[serde(default)]
    pub for_uber_case: Option<String>,

    /// Matches the exam result context field
    #[serde(default)]
    pub for_resultat: Option<String>,

    /// Matches the raw Evalbox account status string
    #[serde(default)]
    pub for_evalbox: Option<String>,

    /// Template file reference, relative to the templates root
    pub file: String,

    /// Block names appended after the rendered body, in order
    #[serde(default)]
    pub blocks: Vec<String>,

    /// Flags merged into the working context the moment this entry matches
    #[serde(default)]
    pub context_flags: Map<String, Value>,

    /// CRM fields the downstream update step should touch
    #[serde(default)]
    pub crm_update: Vec<String>,
}

/// Raw document shape. Sections are `serde_yaml::Mapping` so entry order
/// survives and a bad entry can be skipped without losing its siblings.
/// `Option` tolerates a section key left empty (`matrix:` with no entries).
#[derive(Debug, Default, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    blocks_registry: Option<serde_yaml::Mapping>,
    #[serde(default)]
    base_templates: Option<serde_yaml::Mapping>,
    #[serde(default)]
    matrix: Option<serde_yaml::Mapping>,
}

/// Loaded registry: block name -> file, ordered base templates, and the
/// state:intent matrix.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    block_files: HashMap<String, String>,
    base_templates: Vec<(String, TemplateConfig)>,
    matrix: HashMap<String, TemplateConfig>,
}

impl TemplateRegistry {
    /// Registry with nothing in it. Selection falls through to the
    /// embedded universal fallback.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Strict load: surfaces read and parse failures to the caller.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "from_file: called");
        let content = fs::read_to_string(path).map_err(|source| EngineError::RegistryRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| EngineError::RegistryParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse a registry document from YAML text. An empty document is an
    /// empty registry, not an error.
    pub fn from_yaml(document: &str) -> Result<Self, serde_yaml::Error> {
        if document.trim().is_empty() {
            return Ok(Self::empty());
        }
        let document: RegistryDocument = serde_yaml::from_str(document)?;
        Ok(Self::from_document(document))
    }

    /// Forgiving load: a missing or broken document degrades to an empty
    /// registry so drafting can still answer with the fallback.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_file(path) {
            Ok(registry) => {
                info!(
                    path = %path.display(),
                    blocks = registry.block_files.len(),
                    base_templates = registry.base_templates.len(),
                    matrix = registry.matrix.len(),
                    "Loaded template registry"
                );
                registry
            }
            Err(e) if e.is_missing() => {
                info!(path = %path.display(), "No registry document, embedded fallback only");
                Self::empty()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load template registry, degrading to empty");
                Self::empty()
            }
        }
    }

    fn from_document(document: RegistryDocument) -> Self {
        let mut registry = Self::default();

        for (key, value) in document.blocks_registry.unwrap_or_default() {
            let (Some(name), Some(file)) = (key.as_str(), value.as_str()) else {
                warn!(?key, "Skipping malformed blocks_registry entry");
                continue;
            };
            registry
                .block_files
                .insert(name.to_string(), file.to_string());
        }

        for (key, value) in document.base_templates.unwrap_or_default() {
            let Some(name) = key.as_str().map(str::to_string) else {
                warn!(?key, "Skipping base template with non-string key");
                continue;
            };
            if let Some(config) = parse_config(&name, value) {
                registry.base_templates.push((name, config));
            }
        }

        for (key, value) in document.matrix.unwrap_or_default() {
            let Some(name) = key.as_str().map(str::to_string) else {
                warn!(?key, "Skipping matrix entry with non-string key");
                continue;
            };
            if let Some(config) = parse_config(&name, value) {
                registry.matrix.insert(name, config);
            }
        }

        registry
    }

    /// File declared for a block name, if any.
    pub fn block_file(&self, name: &str) -> Option<&str> {
        self.block_files.get(name).map(String::as_str)
    }

    /// Copy of the block name -> file table, for building a block store.
    pub fn block_files(&self) -> HashMap<String, String> {
        self.block_files.clone()
    }

    /// Base templates in declared order.
    pub fn base_templates(&self) -> impl Iterator<Item = (&str, &TemplateConfig)> {
        self.base_templates
            .iter()
            .map(|(name, config)| (name.as_str(), config))
    }

    /// Base template by exact key.
    pub fn base_template(&self, key: &str) -> Option<&TemplateConfig> {
        self.base_templates
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, config)| config)
    }

    /// Matrix entry by exact `"STATE:INTENT"` key.
    pub fn matrix_entry(&self, key: &str) -> Option<&TemplateConfig> {
        self.matrix.get(key)
    }

    /// True when no section holds any entry.
    pub fn is_empty(&self) -> bool {
        self.block_files.is_empty() && self.base_templates.is_empty() && self.matrix.is_empty()
    }
}

/// Entry-level degradation: a bad value loses that entry, not the document.
fn parse_config(name: &str, value: serde_yaml::Value) -> Option<TemplateConfig> {
    match serde_yaml::from_value::<TemplateConfig>(value) {
        Ok(config) if config.file.is_empty() => {
            warn!(%name, "Skipping template entry with an empty file reference");
            None
        }
        Ok(config) => Some(config),
        Err(e) => {
            warn!(%name, error = %e, "Skipping malformed template entry");
            None
        }
    }
}
