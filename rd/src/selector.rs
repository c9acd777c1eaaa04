//! Template selection cascade
//!
//! Picks exactly one template configuration for a detected state. The
//! cascade is an explicit ordered list of typed rules evaluated
//! first-match-wins: the state:intent matrix always beats looser triggers,
//! and an embedded generic template closes the list so selection is total.
//! Matching merges the winning entry's `contextFlags` into the working
//! context and into `state.context_data` exactly once, at match time;
//! later stages key off those flags to activate narrow template sections.

use serde_json::Value;
use stencil::is_truthy;
use tracing::{debug, info};

use crate::context::RenderContext;
use crate::domain::DetectedState;
use crate::embedded::GENERIC_TEMPLATE_REF;
use crate::registry::{TemplateConfig, TemplateRegistry};

/// Context keys probed for the exam-result trigger, first non-empty wins.
const RESULTAT_KEYS: &[&str] = &["resultat_examen", "resultat"];

/// Context keys probed for the Evalbox account-status trigger.
const EVALBOX_KEYS: &[&str] = &["statut_evalbox", "evalbox"];

/// Registry key reserved for overriding the embedded generic template.
const GENERIC_KEY: &str = "generic";

/// One pass of the selection cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    /// Exact `"<state>:<intent>"` matrix lookup
    MatrixExact,
    /// `forIntention` equals the primary intent (plus optional condition)
    IntentionTrigger,
    /// `forState` equals the state name exactly
    StateTrigger,
    /// `forCondition` alone, no intention or state declared
    ConditionTrigger,
    /// `forUberCase` equals the derived milestone classification
    UberCaseTrigger,
    /// `forResultat` equals the exam-result context field
    ResultatTrigger,
    /// `forEvalbox` equals the raw account-status string
    EvalboxTrigger,
    /// Normalized state name equals a normalized template key
    NameFallback,
    /// Embedded generic template, always matches
    GenericFallback,
}

impl std::fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MatrixExact => write!(f, "matrix_exact"),
            Self::IntentionTrigger => write!(f, "intention"),
            Self::StateTrigger => write!(f, "state"),
            Self::ConditionTrigger => write!(f, "condition"),
            Self::UberCaseTrigger => write!(f, "uber_case"),
            Self::ResultatTrigger => write!(f, "resultat"),
            Self::EvalboxTrigger => write!(f, "evalbox"),
            Self::NameFallback => write!(f, "name_fallback"),
            Self::GenericFallback => write!(f, "generic_fallback"),
        }
    }
}

/// The production pass order. Reordering is a one-line change here.
pub const DEFAULT_CASCADE: &[SelectionRule] = &[
    SelectionRule::MatrixExact,
    SelectionRule::IntentionTrigger,
    SelectionRule::StateTrigger,
    SelectionRule::ConditionTrigger,
    SelectionRule::UberCaseTrigger,
    SelectionRule::ResultatTrigger,
    SelectionRule::EvalboxTrigger,
    SelectionRule::NameFallback,
    SelectionRule::GenericFallback,
];

/// Outcome of a selection: the registry key that matched, the entry's
/// payload, and which pass produced it.
#[derive(Debug, Clone)]
pub struct Selection {
    pub key: String,
    pub config: TemplateConfig,
    pub rule: SelectionRule,
}

/// Uber onboarding milestone classification, derived from four ordered
/// booleans in the context. The first missing milestone decides the case;
/// there is no CASE_C (retired from the business flow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UberCase {
    NotUber,
    CaseA,
    CaseB,
    CaseD,
    CaseE,
    Eligible,
}

impl UberCase {
    /// Classify from the working context. Milestone fields conventionally
    /// live under `uberData`; the context lookup reaches them either way.
    pub fn classify(ctx: &RenderContext) -> Self {
        if !ctx.truthy("offre_activee") {
            return Self::NotUber;
        }
        if !ctx.truthy("documents_recus") {
            return Self::CaseA;
        }
        if !ctx.truthy("compte_verifie") {
            return Self::CaseB;
        }
        // Absent eligibility means the verification outcome is unknown,
        // which is a different message than an explicit refusal.
        match ctx.get("eligible") {
            None | Some(Value::Null) => Self::CaseE,
            Some(value) if is_truthy(&value) => Self::Eligible,
            Some(_) => Self::CaseD,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotUber => "NOT_UBER",
            Self::CaseA => "CASE_A",
            Self::CaseB => "CASE_B",
            Self::CaseD => "CASE_D",
            Self::CaseE => "CASE_E",
            Self::Eligible => "ELIGIBLE",
        }
    }
}

impl std::fmt::Display for UberCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evaluates the cascade against one registry.
pub struct Selector<'r> {
    registry: &'r TemplateRegistry,
    cascade: &'static [SelectionRule],
}

impl<'r> Selector<'r> {
    pub fn new(registry: &'r TemplateRegistry) -> Self {
        Self {
            registry,
            cascade: DEFAULT_CASCADE,
        }
    }

    /// Same selector with a different pass order.
    pub fn with_cascade(registry: &'r TemplateRegistry, cascade: &'static [SelectionRule]) -> Self {
        Self { registry, cascade }
    }

    /// Run the cascade. Total: some pass always matches, and the embedded
    /// generic template backstops even a cascade configured without its
    /// fallback rule. Merges the winner's `contextFlags` before returning.
    pub fn select(&self, state: &mut DetectedState, ctx: &mut RenderContext) -> Selection {
        debug!("select: called");
        for rule in self.cascade {
            let Some((key, config)) = self.evaluate(*rule, state, ctx) else {
                continue;
            };
            merge_flags(state, ctx, &config);
            info!(state = %state.name, template = %key, rule = %rule, "Template selected");
            return Selection {
                key,
                config,
                rule: *rule,
            };
        }
        let (key, config) = self.generic_selection();
        merge_flags(state, ctx, &config);
        info!(state = %state.name, template = %key, "No pass matched, using generic template");
        Selection {
            key,
            config,
            rule: SelectionRule::GenericFallback,
        }
    }

    fn evaluate(
        &self,
        rule: SelectionRule,
        state: &DetectedState,
        ctx: &RenderContext,
    ) -> Option<(String, TemplateConfig)> {
        match rule {
            SelectionRule::MatrixExact => {
                let primary = ctx.get_str("primaryIntent")?;
                let key = format!("{}:{}", state.name, primary);
                let config = self.registry.matrix_entry(&key)?;
                Some((key, config.clone()))
            }
            SelectionRule::IntentionTrigger => {
                let primary = ctx.get_str("primaryIntent")?;
                self.find_base(|config| {
                    config.for_intention.as_deref() == Some(primary.as_str())
                        && config
                            .for_condition
                            .as_deref()
                            .is_none_or(|condition| condition_holds(condition, ctx))
                })
            }
            SelectionRule::StateTrigger => {
                self.find_base(|config| config.for_state.as_deref() == Some(state.name.as_str()))
            }
            SelectionRule::ConditionTrigger => self.find_base(|config| {
                config.for_intention.is_none()
                    && config.for_state.is_none()
                    && config
                        .for_condition
                        .as_deref()
                        .is_some_and(|condition| condition_holds(condition, ctx))
            }),
            SelectionRule::UberCaseTrigger => {
                let case = UberCase::classify(ctx);
                self.find_base(|config| {
                    config
                        .for_uber_case
                        .as_deref()
                        .is_some_and(|declared| declared.eq_ignore_ascii_case(case.as_str()))
                })
            }
            SelectionRule::ResultatTrigger => {
                let resultat = first_text(ctx, RESULTAT_KEYS)?;
                self.find_base(|config| {
                    config
                        .for_resultat
                        .as_deref()
                        .is_some_and(|declared| declared.trim().eq_ignore_ascii_case(&resultat))
                })
            }
            SelectionRule::EvalboxTrigger => {
                let status = first_text(ctx, EVALBOX_KEYS)?;
                self.find_base(|config| {
                    config
                        .for_evalbox
                        .as_deref()
                        .is_some_and(|declared| declared.trim() == status)
                })
            }
            SelectionRule::NameFallback => {
                let wanted = normalize_name(&state.name);
                self.registry
                    .base_templates()
                    .find(|(key, _)| normalize_name(key) == wanted)
                    .map(|(key, config)| (key.to_string(), config.clone()))
            }
            SelectionRule::GenericFallback => Some(self.generic_selection()),
        }
    }

    /// First base template satisfying the predicate, in declared order.
    fn find_base(
        &self,
        predicate: impl Fn(&TemplateConfig) -> bool,
    ) -> Option<(String, TemplateConfig)> {
        self.registry
            .base_templates()
            .find(|(_, config)| predicate(config))
            .map(|(key, config)| (key.to_string(), config.clone()))
    }

    /// The registry's `generic` entry when declared, otherwise the embedded
    /// universal template.
    fn generic_selection(&self) -> (String, TemplateConfig) {
        let config = self
            .registry
            .base_template(GENERIC_KEY)
            .cloned()
            .unwrap_or_else(|| TemplateConfig {
                file: GENERIC_TEMPLATE_REF.to_string(),
                ..TemplateConfig::default()
            });
        (GENERIC_KEY.to_string(), config)
    }
}

/// Merge a matched entry's flags into the working context and the state's
/// own context data. Happens once, at match time.
fn merge_flags(state: &mut DetectedState, ctx: &mut RenderContext, config: &TemplateConfig) {
    if config.context_flags.is_empty() {
        return;
    }
    ctx.merge(&config.context_flags);
    for (key, value) in &config.context_flags {
        state.context_data.insert(key.clone(), value.clone());
    }
    debug!(
        flags = config.context_flags.len(),
        "Merged matched contextFlags"
    );
}

/// Evaluate a `forCondition` expression: `path == literal`,
/// `path != literal`, or a bare path checked for truthiness. Literals may
/// be quoted; comparison is over the canonical text of the context value,
/// so `age == 3` holds for a numeric 3.
pub fn condition_holds(condition: &str, ctx: &RenderContext) -> bool {
    if let Some((path, literal)) = condition.split_once("==") {
        return condition_text(ctx, path.trim()).as_deref() == Some(unquote(literal));
    }
    if let Some((path, literal)) = condition.split_once("!=") {
        return condition_text(ctx, path.trim()).as_deref() != Some(unquote(literal));
    }
    ctx.truthy(condition.trim())
}

/// Canonical comparison text for a context value. Arrays and objects never
/// compare equal to a literal.
fn condition_text(ctx: &RenderContext, path: &str) -> Option<String> {
    match ctx.get(path)? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    raw
}

/// First non-empty string among the given context keys, trimmed.
fn first_text(ctx: &RenderContext, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        ctx.get_str(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Lowercase with `-` and whitespace unified to `_`, for the name fallback.
fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c == '-' || c.is_whitespace() {
                '_'
            } else {
                c
            }
        })
        .collect()
}
