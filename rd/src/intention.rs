//! Intention-flag auto-mapping
//!
//! Classified intents switch on `intention_*` section flags in the working
//! context; the generic template and several base templates gate their
//! sections on them. The table is applied after selection so a flag set by
//! a matched config's `contextFlags` is never overwritten, and a blocking
//! flag suppresses its mapping so the same fact is not rendered twice
//! (a reply that already says "report blocked" must not also promise new
//! dates).

use tracing::debug;

use crate::context::RenderContext;
use crate::domain::IntentResult;

/// One intent -> section flag mapping.
#[derive(Debug, Clone, Copy)]
pub struct IntentionMapping {
    /// Classifier intent name
    pub intent: &'static str,

    /// Context flag the intent switches on
    pub flag: &'static str,

    /// Context flag that suppresses this mapping when truthy
    pub blocked_by: Option<&'static str>,
}

const fn mapping(intent: &'static str, flag: &'static str) -> IntentionMapping {
    IntentionMapping {
        intent,
        flag,
        blocked_by: None,
    }
}

const fn blocked(
    intent: &'static str,
    flag: &'static str,
    blocked_by: &'static str,
) -> IntentionMapping {
    IntentionMapping {
        intent,
        flag,
        blocked_by: Some(blocked_by),
    }
}

/// The full mapping table.
pub const INTENTION_FLAGS: &[IntentionMapping] = &[
    blocked("REPORT_DATE", "intention_report_date", "reportBloque"),
    blocked("DEMANDE_RESULTAT", "intention_resultat", "attenteResultat"),
    blocked("CONVOCATION", "intention_convocation", "convocationEnvoyee"),
    mapping("PAIEMENT", "intention_paiement"),
    mapping("DOCUMENTS", "intention_documents"),
    mapping("UBER", "intention_uber"),
    mapping("CPF", "intention_cpf"),
    mapping("ACCES_EVALBOX", "intention_acces_evalbox"),
    mapping("PLANNING", "intention_planning"),
    mapping("ANNULATION", "intention_annulation"),
    mapping("REMBOURSEMENT", "intention_remboursement"),
    mapping("PREPARATION_EXAMEN", "intention_preparation"),
    mapping("PROBLEME_TECHNIQUE", "intention_technique"),
    mapping("RECLAMATION", "intention_reclamation"),
    mapping("RELANCE", "intention_relance"),
];

/// Mapping for one intent, if the table knows it.
pub fn mapping_for(intent: &str) -> Option<&'static IntentionMapping> {
    INTENTION_FLAGS.iter().find(|entry| entry.intent == intent)
}

/// Apply the table for the primary and secondary intents.
///
/// Returns the flags actually set, for the log line.
pub fn apply_intent_flags(intents: &IntentResult, ctx: &mut RenderContext) -> Vec<String> {
    let mut applied = Vec::new();
    for intent in intents.all() {
        let Some(entry) = mapping_for(intent) else {
            debug!(%intent, "No section flag mapped for intent");
            continue;
        };
        if ctx.contains(entry.flag) {
            debug!(flag = entry.flag, "Flag already set, not overwriting");
            continue;
        }
        if let Some(blocker) = entry.blocked_by
            && ctx.truthy(blocker)
        {
            debug!(flag = entry.flag, %blocker, "Flag suppressed by blocking flag");
            continue;
        }
        ctx.set(entry.flag, true);
        applied.push(entry.flag.to_string());
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_maps_primary_and_secondaries() {
        let intents = IntentResult::primary("PAIEMENT").with_secondary("CPF");
        let mut ctx = RenderContext::new();
        let applied = apply_intent_flags(&intents, &mut ctx);
        assert_eq!(applied, vec!["intention_paiement", "intention_cpf"]);
        assert!(ctx.truthy("intention_paiement"));
        assert!(ctx.truthy("intention_cpf"));
    }

    #[test]
    fn test_unknown_intent_ignored() {
        let intents = IntentResult::primary("INTENT_INCONNU");
        let mut ctx = RenderContext::new();
        assert!(apply_intent_flags(&intents, &mut ctx).is_empty());
    }

    #[test]
    fn test_existing_flag_never_overwritten() {
        let intents = IntentResult::primary("PAIEMENT");
        let mut ctx = RenderContext::new();
        ctx.set("intention_paiement", false);
        let applied = apply_intent_flags(&intents, &mut ctx);
        assert!(applied.is_empty());
        assert_eq!(ctx.get("intention_paiement"), Some(json!(false)));
    }

    #[test]
    fn test_report_date_suppressed_when_blocked() {
        let intents = IntentResult::primary("REPORT_DATE");
        let mut ctx = RenderContext::new();
        ctx.set("reportBloque", true);
        assert!(apply_intent_flags(&intents, &mut ctx).is_empty());
        assert!(!ctx.contains("intention_report_date"));
    }

    #[test]
    fn test_resultat_suppressed_while_waiting() {
        let intents = IntentResult::primary("DEMANDE_RESULTAT");
        let mut ctx = RenderContext::new();
        ctx.set("attenteResultat", true);
        assert!(apply_intent_flags(&intents, &mut ctx).is_empty());
    }

    #[test]
    fn test_convocation_suppressed_once_sent() {
        let intents = IntentResult::primary("CONVOCATION");
        let mut ctx = RenderContext::new();
        ctx.set("convocationEnvoyee", true);
        assert!(apply_intent_flags(&intents, &mut ctx).is_empty());
    }

    #[test]
    fn test_falsy_blocker_does_not_suppress() {
        let intents = IntentResult::primary("REPORT_DATE");
        let mut ctx = RenderContext::new();
        ctx.set("reportBloque", false);
        let applied = apply_intent_flags(&intents, &mut ctx);
        assert_eq!(applied, vec!["intention_report_date"]);
    }

    #[test]
    fn test_duplicate_intent_sets_flag_once() {
        let intents = IntentResult::primary("CPF").with_secondary("CPF");
        let mut ctx = RenderContext::new();
        let applied = apply_intent_flags(&intents, &mut ctx);
        assert_eq!(applied, vec!["intention_cpf"]);
    }
}
