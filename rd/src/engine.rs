//! Response engine facade
//!
//! Owns the loaded registry, the block store and the template cache, and
//! runs the full pipeline for one detected state: build the working
//! context, select a template, auto-map intention flags, render the body,
//! append the configured blocks, inject alert fragments, clean up.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use eyre::{Context, Result};
use serde_json::{Map, Value};
use stencil::{Renderer, Template, cleanup};
use tracing::{debug, info, warn};

use crate::alerts;
use crate::blocks::{self, BlockStore};
use crate::context::RenderContext;
use crate::domain::{DetectedState, IntentResult, RenderResult};
use crate::embedded::{self, EMBEDDED_PREFIX, UNIVERSAL_FALLBACK};
use crate::intention;
use crate::registry::TemplateRegistry;
use crate::selector::Selector;

/// Placeholder names the renderer and the cleanup pass leave untouched,
/// to be filled by the external personalization step.
pub const RESERVED_PLACEHOLDERS: &[&str] = &["ai_personalization"];

/// Drafts replies for detected ticket states.
pub struct ResponseEngine {
    registry: TemplateRegistry,
    blocks: BlockStore,
    templates: Mutex<HashMap<String, Option<String>>>,
    root: PathBuf,
    reserved: Vec<String>,
}

impl ResponseEngine {
    /// Engine over a templates root and a registry document path.
    ///
    /// Fails soft: a missing or malformed registry yields an engine that
    /// drafts everything from the embedded generic template.
    pub fn new(root: impl Into<PathBuf>, registry_path: impl AsRef<Path>) -> Self {
        let registry = TemplateRegistry::load(registry_path);
        Self::with_registry(root, registry)
    }

    /// Strict constructor for hosts that treat a broken registry as fatal.
    pub fn try_new(root: impl Into<PathBuf>, registry_path: impl AsRef<Path>) -> Result<Self> {
        let registry_path = registry_path.as_ref();
        let registry = TemplateRegistry::from_file(registry_path).with_context(|| {
            format!(
                "Failed to load template registry from {}",
                registry_path.display()
            )
        })?;
        Ok(Self::with_registry(root, registry))
    }

    /// Engine from parts, for tests and embedding hosts.
    pub fn with_registry(root: impl Into<PathBuf>, registry: TemplateRegistry) -> Self {
        let root = root.into();
        let blocks = BlockStore::new(&root, registry.block_files());
        Self {
            registry,
            blocks,
            templates: Mutex::new(HashMap::new()),
            root,
            reserved: RESERVED_PLACEHOLDERS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Draft a reply for one detected state.
    pub fn draft(&self, state: &mut DetectedState, intents: &IntentResult) -> RenderResult {
        self.draft_with_context(state, intents, Map::new())
    }

    /// Draft with extra context entries layered over the state's own data.
    pub fn draft_with_context(
        &self,
        state: &mut DetectedState,
        intents: &IntentResult,
        extra: Map<String, Value>,
    ) -> RenderResult {
        debug!(state = %state.name, "draft: called");
        let mut ctx = RenderContext::for_state(state, intents);
        ctx.merge(&extra);

        let selection = Selector::new(&self.registry).select(state, &mut ctx);
        let applied = intention::apply_intent_flags(intents, &mut ctx);
        if !applied.is_empty() {
            debug!(flags = applied.len(), "Auto-mapped intention flags");
        }

        let source = self.template_text(&selection.config.file).unwrap_or_else(|| {
            warn!(
                file = %selection.config.file,
                "Template content missing, using embedded generic"
            );
            blocks::normalize_fragment(UNIVERSAL_FALLBACK)
        });

        let template = Template::parse(&source);
        for issue in &template.issues {
            warn!(template = %selection.key, %issue, "Template syntax degraded");
        }

        let renderer = Renderer::new(&self.blocks).with_reserved(self.reserved.clone());
        let outcome = renderer.render(&template, &ctx);
        let mut body = outcome.text;
        let mut placeholders = outcome.variables_replaced;
        let mut reserved_seen = outcome.reserved_seen;
        let mut blocks_included = outcome.partials_included;

        for name in &selection.config.blocks {
            let Some(fragment) = self.blocks.load(name) else {
                continue;
            };
            let block_outcome = renderer.render(&Template::parse(&fragment), &ctx);
            if !block_outcome.text.trim().is_empty() {
                body.push_str("\n\n");
                body.push_str(&block_outcome.text);
            }
            merge_unique(&mut blocks_included, Some(name.clone()));
            merge_unique(&mut blocks_included, block_outcome.partials_included);
            merge_unique(&mut placeholders, block_outcome.variables_replaced);
            merge_unique(&mut reserved_seen, block_outcome.reserved_seen);
        }

        let (with_alerts, alerts_included) = alerts::inject(&body, &state.alerts);
        let response_text = cleanup(&with_alerts, &self.reserved);

        info!(
            state = %state.name,
            template = %selection.key,
            rule = %selection.rule,
            placeholders = placeholders.len(),
            blocks = blocks_included.len(),
            alerts = alerts_included.len(),
            "Draft assembled"
        );

        RenderResult {
            response_text,
            template_used: selection.key,
            template_file: selection.config.file,
            placeholders_replaced: placeholders,
            ai_sections_generated: reserved_seen,
            alerts_included,
            blocks_included,
            crm_updates: selection.config.crm_update,
        }
    }

    /// Template text for a config's file reference, read-through cached.
    /// `embedded:` references resolve to compiled-in content.
    fn template_text(&self, reference: &str) -> Option<String> {
        if let Some(name) = reference.strip_prefix(EMBEDDED_PREFIX) {
            return embedded::get_embedded(name).map(blocks::normalize_fragment);
        }
        let mut cache = match self.templates.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cached) = cache.get(reference) {
            return cached.clone();
        }
        let path = self.root.join(reference);
        let resolved = if path.exists() {
            blocks::read_fragment(&path)
        } else {
            debug!(%reference, "Template file does not exist");
            None
        };
        cache.insert(reference.to_string(), resolved.clone());
        resolved
    }
}

fn merge_unique(into: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_drafts_from_embedded_generic_without_any_files() {
        let engine = ResponseEngine::with_registry(PathBuf::new(), TemplateRegistry::empty());
        let mut state = DetectedState::new("s1", "ETAT_INCONNU");
        let intents = IntentResult::none();
        let result = engine.draft(&mut state, &intents);

        assert_eq!(result.template_used, "generic");
        assert!(result.response_text.starts_with("Bonjour"));
        assert!(result.response_text.contains("{{ai_personalization}}"));
        assert!(result.response_text.contains("Cordialement"));
        assert!(result.awaits_personalization());
        assert!(!result.response_text.contains("{{#"));
        assert!(!result.response_text.contains("{{/"));
        assert!(!result.response_text.contains("{{>"));
    }

    #[test]
    fn test_intent_flag_gates_generic_section() {
        let engine = ResponseEngine::with_registry(PathBuf::new(), TemplateRegistry::empty());
        let mut state = DetectedState::new("s1", "ETAT_INCONNU");
        let intents = IntentResult::primary("PAIEMENT");
        let result = engine.draft(&mut state, &intents);

        assert!(result.response_text.contains("Concernant votre paiement"));
        assert!(!result.response_text.contains("Concernant vos documents"));
    }

    #[test]
    fn test_template_file_rendered_with_context() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "etat.html",
            "Bonjour {{prenom}}, votre dossier {{stateName}} est suivi.",
        );
        let registry = TemplateRegistry::from_yaml(
            r#"
base_templates:
  suivi:
    forState: SUIVI
    file: etat.html
"#,
        )
        .unwrap();
        let engine = ResponseEngine::with_registry(dir.path(), registry);
        let mut state = DetectedState::new("s1", "SUIVI").with_context_value("prenom", "Karim");
        let result = engine.draft(&mut state, &IntentResult::none());

        assert_eq!(result.template_used, "suivi");
        assert_eq!(result.template_file, "etat.html");
        assert_eq!(
            result.response_text,
            "Bonjour Karim, votre dossier SUIVI est suivi."
        );
        assert!(result.placeholders_replaced.contains(&"prenom".to_string()));
    }

    #[test]
    fn test_missing_template_file_falls_back_to_generic_content() {
        let dir = tempdir().unwrap();
        let registry = TemplateRegistry::from_yaml(
            r#"
base_templates:
  fantome:
    forState: FANTOME
    file: absent.html
"#,
        )
        .unwrap();
        let engine = ResponseEngine::with_registry(dir.path(), registry);
        let mut state = DetectedState::new("s1", "FANTOME");
        let result = engine.draft(&mut state, &IntentResult::none());

        // The selection stands; only the content degrades.
        assert_eq!(result.template_used, "fantome");
        assert_eq!(result.template_file, "absent.html");
        assert!(result.response_text.starts_with("Bonjour"));
    }

    #[test]
    fn test_configured_blocks_appended_in_order() {
        let dir = tempdir().unwrap();
        write(dir.path(), "corps.html", "Corps du message.");
        write(dir.path(), "blocks/action.html", "Action : payer en ligne.");
        write(dir.path(), "blocks/rappel.html", "Rappel : documents requis.");
        let registry = TemplateRegistry::from_yaml(
            r#"
base_templates:
  corps:
    forState: CORPS
    file: corps.html
    blocks:
      - action
      - rappel
"#,
        )
        .unwrap();
        let engine = ResponseEngine::with_registry(dir.path(), registry);
        let mut state = DetectedState::new("s1", "CORPS");
        let result = engine.draft(&mut state, &IntentResult::none());

        let action_at = result.response_text.find("Action :").unwrap();
        let rappel_at = result.response_text.find("Rappel :").unwrap();
        assert!(action_at < rappel_at);
        assert_eq!(result.blocks_included, vec!["action", "rappel"]);
    }

    #[test]
    fn test_template_cache_survives_file_removal() {
        let dir = tempdir().unwrap();
        write(dir.path(), "corps.html", "Premier contenu.");
        let registry = TemplateRegistry::from_yaml(
            r#"
base_templates:
  corps:
    forState: CORPS
    file: corps.html
"#,
        )
        .unwrap();
        let engine = ResponseEngine::with_registry(dir.path(), registry);
        let mut state = DetectedState::new("s1", "CORPS");
        let first = engine.draft(&mut state, &IntentResult::none());
        assert_eq!(first.response_text, "Premier contenu.");

        fs::remove_file(dir.path().join("corps.html")).unwrap();
        let mut state = DetectedState::new("s1", "CORPS");
        let second = engine.draft(&mut state, &IntentResult::none());
        assert_eq!(second.response_text, "Premier contenu.");
    }

    #[test]
    fn test_crm_updates_passed_through() {
        let registry = TemplateRegistry::from_yaml(
            r#"
base_templates:
  relance:
    forState: RELANCE
    file: embedded:generic
    crmUpdate:
      - statut_dossier
      - derniere_relance
"#,
        )
        .unwrap();
        let engine = ResponseEngine::with_registry(PathBuf::new(), registry);
        let mut state = DetectedState::new("s1", "RELANCE");
        let result = engine.draft(&mut state, &IntentResult::none());
        assert_eq!(result.crm_updates, vec!["statut_dossier", "derniere_relance"]);
    }

    #[test]
    fn test_try_new_reports_missing_registry() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        let outcome = ResponseEngine::try_new(dir.path(), &missing);
        assert!(outcome.is_err());
    }
}
