//! Alert fragment injection
//!
//! Detector alerts carry urgent facts the reply must surface even when the
//! selected template never mentions them. Each alert type maps to a
//! compiled-in fragment; its `{param}` slots are filled from the alert's
//! params and the fragment lands immediately before the signature block,
//! or at the end when no signature is found.

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::Alert;
use crate::embedded;

/// Closing phrases that open a signature block. The earliest final
/// occurrence wins, so a multi-line signature is kept whole.
pub const SIGNATURE_MARKERS: &[&str] = &[
    "Cordialement",
    "Bien à vous",
    "Bonne journée",
    "À bientôt",
    "L'équipe",
];

/// Inject fragments for the given alerts. Returns the amended text plus
/// the alert types actually inserted, for the audit trail.
pub fn inject(text: &str, alerts: &[Alert]) -> (String, Vec<String>) {
    let mut fragments = Vec::new();
    let mut inserted = Vec::new();
    for alert in alerts {
        let Some(fragment) = embedded::alert_fragment(&alert.alert_type) else {
            debug!(alert_type = %alert.alert_type, "No fragment for alert type, skipping");
            continue;
        };
        fragments.push(fill_params(fragment, &alert.params));
        inserted.push(alert.alert_type.clone());
    }
    if fragments.is_empty() {
        return (text.to_string(), inserted);
    }

    let block = fragments.join("\n\n");
    let amended = match signature_start(text) {
        Some(at) => {
            let (body, signature) = text.split_at(at);
            format!("{}\n\n{}\n\n{}", body.trim_end(), block, signature)
        }
        None => format!("{}\n\n{}", text.trim_end(), block),
    };
    (amended, inserted)
}

/// Byte offset of the line the signature starts on, if any marker occurs.
fn signature_start(text: &str) -> Option<usize> {
    let earliest = SIGNATURE_MARKERS
        .iter()
        .filter_map(|marker| text.rfind(marker))
        .min()?;
    Some(text[..earliest].rfind('\n').map_or(0, |newline| newline + 1))
}

fn fill_params(fragment: &str, params: &Map<String, Value>) -> String {
    let mut filled = fragment.to_string();
    for (key, value) in params {
        filled = filled.replace(&format!("{{{key}}}"), &param_text(value));
    }
    filled
}

/// Human text for a param value; string lists read as an enumeration.
fn param_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(param_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
