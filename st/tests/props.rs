//! Property tests for the parse -> render -> cleanup pipeline.

use proptest::prelude::*;
use serde_json::{Map, Value};
use stencil::{NoPartials, Renderer, Template, cleanup};

fn pipeline(text: &str, reserved: &[String]) -> String {
    let scope: Map<String, Value> = Map::new();
    let outcome = Renderer::new(&NoPartials)
        .with_reserved(reserved.iter().cloned())
        .render(&Template::parse(text), &scope);
    cleanup(&outcome.text, reserved)
}

/// Pieces that concatenate into realistic and adversarial template text:
/// plain prose, balanced constructs, and stray delimiters.
fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 \\n.,;:!?'<>/p-]{0,24}",
        Just("{{".to_string()),
        Just("}}".to_string()),
        Just("{{prenom}}".to_string()),
        Just("{{#if ok}}".to_string()),
        Just("{{/if}}".to_string()),
        Just("{{else}}".to_string()),
        Just("{{#each xs}}".to_string()),
        Just("{{/each}}".to_string()),
        Just("{{> signature}}".to_string()),
        Just("{{ai_personalization}}".to_string()),
        Just("<p></p>".to_string()),
        Just("{{!-- note --}}".to_string()),
    ]
}

proptest! {
    /// Text with no tokens at all passes through the pipeline unchanged
    /// after the first normalization.
    #[test]
    fn prop_token_free_text_stabilizes_after_one_pass(
        text in "[a-zA-Z0-9 \\n.,;:!?'<>/p-]{0,200}",
    ) {
        let once = pipeline(&text, &[]);
        let twice = pipeline(&once, &[]);
        prop_assert_eq!(twice, once);
    }

    /// Whatever the input, the only complete tokens left in final output
    /// are reserved placeholders.
    #[test]
    fn prop_only_reserved_tokens_survive(parts in prop::collection::vec(fragment(), 0..12)) {
        let reserved = vec!["ai_personalization".to_string()];
        let out = pipeline(&parts.concat(), &reserved);
        let token = regex::Regex::new(r"\{\{([^{}]*)\}\}").expect("valid token regex");
        for caps in token.captures_iter(&out) {
            prop_assert_eq!(caps[1].trim(), "ai_personalization");
        }
    }

    /// Cleaning already-clean text changes nothing.
    #[test]
    fn prop_cleanup_idempotent(parts in prop::collection::vec(fragment(), 0..12)) {
        let reserved = vec!["ai_personalization".to_string()];
        let once = cleanup(&parts.concat(), &reserved);
        prop_assert_eq!(cleanup(&once, &reserved), once);
    }

    /// Parsing arbitrary delimiter soup never panics, it degrades.
    #[test]
    fn prop_parse_never_panics(parts in prop::collection::vec(fragment(), 0..12)) {
        let text = parts.concat();
        let template = Template::parse(&text);
        let _ = template.nodes.len();
    }
}
