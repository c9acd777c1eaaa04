//! Output sanitation.
//!
//! Rendering leaves unresolved `{{...}}` tokens in place; this pass strips
//! them (reserved names excepted), drops comments and empty paragraph
//! wrappers, and normalizes whitespace. Running it twice gives the same
//! result as running it once.

use std::sync::LazyLock;

use regex::Regex;

static LONG_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{!--.*?--\}\}").expect("valid comment regex"));
static SHORT_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{![^}]*\}\}").expect("valid comment regex"));
static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid token regex"));
static EMPTY_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<p>\s*</p>").expect("valid paragraph regex"));
static EXTRA_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

/// Strips `{{!-- --}}`, `{{! }}` and `<!-- -->` comments.
pub fn strip_comments(text: &str) -> String {
    let out = LONG_COMMENT.replace_all(text, "");
    let out = SHORT_COMMENT.replace_all(&out, "");
    HTML_COMMENT.replace_all(&out, "").into_owned()
}

/// Collapses runs of three or more newlines down to a blank line.
pub fn collapse_newlines(text: &str) -> String {
    EXTRA_NEWLINES.replace_all(text, "\n\n").into_owned()
}

/// Full sanitation pass. `reserved` names the placeholders that must
/// survive verbatim.
pub fn cleanup(text: &str, reserved: &[String]) -> String {
    let mut out = strip_comments(text);

    // Removing a token can expose a new one ("{{ {{x}} }}"), so stripping
    // repeats until stable. Every changed round shrinks the text, which
    // bounds the loop.
    loop {
        let next = TOKEN
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                let inner = caps[1].trim();
                if reserved.iter().any(|name| name == inner) {
                    caps[0].to_string()
                } else {
                    String::new()
                }
            })
            .into_owned();
        let next = strip_empty_paragraphs(&next);
        if next == out {
            break;
        }
        out = next;
    }

    collapse_newlines(&out).trim().to_string()
}

fn strip_empty_paragraphs(text: &str) -> String {
    let mut out = text.to_string();
    // Nested wrappers: removing the inner <p></p> can leave a new empty one.
    loop {
        let next = EMPTY_PARAGRAPH.replace_all(&out, "").into_owned();
        if next == out {
            break;
        }
        out = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(text: &str) -> String {
        cleanup(text, &[])
    }

    fn clean_reserved(text: &str) -> String {
        cleanup(text, &["ai_personalization".to_string()])
    }

    #[test]
    fn test_unresolved_tokens_removed() {
        assert_eq!(clean("Bonjour {{prenom}}, bienvenue"), "Bonjour , bienvenue");
    }

    #[test]
    fn test_dangling_block_syntax_removed() {
        assert_eq!(clean("a {{#if x}} b {{/if}} c"), "a  b  c");
    }

    #[test]
    fn test_reserved_placeholder_kept() {
        assert_eq!(
            clean_reserved("Intro\n\n{{ai_personalization}}\n\nFin"),
            "Intro\n\n{{ai_personalization}}\n\nFin"
        );
    }

    #[test]
    fn test_reserved_with_padding_kept() {
        assert_eq!(clean_reserved("{{ ai_personalization }}"), "{{ ai_personalization }}");
    }

    #[test]
    fn test_comments_removed() {
        assert_eq!(clean("a{{! note }}b"), "ab");
        assert_eq!(clean("a{{!-- longue {{note}} --}}b"), "ab");
        assert_eq!(clean("a<!-- html\ncomment -->b"), "ab");
    }

    #[test]
    fn test_newlines_collapsed() {
        assert_eq!(clean("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_empty_paragraphs_removed() {
        assert_eq!(clean("x<p>  \n </p>y"), "xy");
    }

    #[test]
    fn test_nested_empty_paragraphs_removed() {
        assert_eq!(clean("a<p><p></p></p>b"), "ab");
    }

    #[test]
    fn test_token_removal_exposing_new_token() {
        assert_eq!(clean("{{ {{x}} }}"), "");
    }

    #[test]
    fn test_trims_ends() {
        assert_eq!(clean("\n\n  contenu  \n\n"), "contenu");
    }

    #[test]
    fn test_cleanup_idempotent() {
        let samples = [
            "Bonjour {{prenom}},\n\n\n\n{{#if x}}a{{/if}}\n<p></p>\nfin",
            "{{ai_personalization}} et {{autre}}",
            "texte sans jetons",
        ];
        for sample in samples {
            let once = clean_reserved(sample);
            assert_eq!(clean_reserved(&once), once, "not idempotent for {sample:?}");
        }
    }
}
