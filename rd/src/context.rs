//! Render context
//!
//! The working key/value surface a render reads from: the detected state's
//! `context_data` plus engine-injected values. Lookup precedence for a path:
//!
//! 1. Exact key in the flat map, then dotted descent from the root
//! 2. The alias table: legacy template vocabulary mapped to current field
//!    names, or derived values such as the French-formatted session dates
//! 3. Fallback search inside the `crmData` and `uberData` sub-objects
//!
//! Templates authored years ago keep resolving against today's field names
//! without anyone rewriting them.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use stencil::{dig, is_truthy};

use crate::domain::{DetectedState, IntentResult};

/// Sub-objects the fallback search descends into, in order.
const NESTED_SOURCES: &[&str] = &["crmData", "uberData"];

enum AliasTarget {
    /// Resolves to another field, looked up through the base rules
    Field(&'static str),
    /// Computes its value from the whole context
    Derived(fn(&RenderContext) -> Option<Value>),
}

/// Legacy template vocabulary.
const ALIASES: &[(&str, AliasTarget)] = &[
    ("prenom", AliasTarget::Field("firstName")),
    ("date_examen", AliasTarget::Field("examDate")),
    ("lien_evalbox", AliasTarget::Field("evalboxUrl")),
    ("statut_dossier", AliasTarget::Field("fileStatus")),
    ("prochaines_dates", AliasTarget::Derived(next_dates_french)),
];

/// Mutable key/value surface for one render call.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    values: Map<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Working context for one state: its context data plus the state name
    /// and classified intents under the keys templates expect.
    pub fn for_state(state: &DetectedState, intents: &IntentResult) -> Self {
        let mut values = state.context_data.clone();
        values.insert("stateName".to_string(), Value::String(state.name.clone()));
        if let Some(primary) = &intents.primary_intent {
            values.insert("primaryIntent".to_string(), Value::String(primary.clone()));
        }
        if !intents.secondary_intents.is_empty() {
            values.insert(
                "secondaryIntents".to_string(),
                Value::Array(
                    intents
                        .secondary_intents
                        .iter()
                        .map(|intent| Value::String(intent.clone()))
                        .collect(),
                ),
            );
        }
        Self { values }
    }

    /// Set one value, overwriting.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Merge entries, overwriting existing keys.
    pub fn merge(&mut self, entries: &Map<String, Value>) {
        for (key, value) in entries {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Flat-key presence check. Aliases and nested objects do not count:
    /// no-overwrite rules care about what was explicitly set.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Full-precedence lookup.
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.base_lookup(path) {
            return Some(value);
        }
        if let Some(value) = self.alias_lookup(path) {
            return Some(value);
        }
        self.nested_lookup(path)
    }

    /// Lookup coerced to an owned string.
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get(path)
            .and_then(|value| value.as_str().map(str::to_string))
    }

    /// Truthiness of a path; absent is false.
    pub fn truthy(&self, path: &str) -> bool {
        self.get(path).is_some_and(|value| is_truthy(&value))
    }

    fn base_lookup(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.values.get(path) {
            return Some(value.clone());
        }
        let (head, rest) = path.split_once('.')?;
        dig(self.values.get(head)?, rest)
    }

    fn alias_lookup(&self, path: &str) -> Option<Value> {
        let (_, target) = ALIASES.iter().find(|(name, _)| *name == path)?;
        match target {
            AliasTarget::Field(field) => self
                .base_lookup(field)
                .or_else(|| self.nested_lookup(field)),
            AliasTarget::Derived(derive) => derive(self),
        }
    }

    fn nested_lookup(&self, path: &str) -> Option<Value> {
        for source in NESTED_SOURCES {
            if let Some(container) = self.values.get(*source)
                && let Some(value) = dig(container, path)
            {
                return Some(value);
            }
        }
        None
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl stencil::Scope for RenderContext {
    fn lookup(&self, path: &str) -> Option<Value> {
        self.get(path)
    }
}

/// `prochaines_dates`: the ISO `available_dates` list rendered as French
/// dd/mm/YYYY dates, comma-joined with a final « et ».
fn next_dates_french(ctx: &RenderContext) -> Option<Value> {
    let raw = ctx
        .base_lookup("available_dates")
        .or_else(|| ctx.nested_lookup("available_dates"))?;
    let Value::Array(items) = raw else {
        return None;
    };
    let mut dates = Vec::new();
    for item in &items {
        let Some(text) = item.as_str() else {
            continue;
        };
        match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(date) => dates.push(date.format("%d/%m/%Y").to_string()),
            // Entries that are not ISO dates pass through as written.
            Err(_) => dates.push(text.to_string()),
        }
    }
    if dates.is_empty() {
        return None;
    }
    Some(Value::String(join_french(&dates)))
}

fn join_french(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} et {}", rest.join(", "), last),
    }
}
