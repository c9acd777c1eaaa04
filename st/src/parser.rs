//! Tokenizer and tree builder.
//!
//! The source is scanned left to right exactly once. `{{` opens a tag, `}}`
//! closes it, and `{{!-- --}}` comments are allowed to contain `}}`. Block
//! tags are matched with a frame stack; anything that does not line up is
//! degraded to literal text and recorded as an issue rather than failing the
//! parse.

use tracing::debug;

use crate::ast::{Node, ParseIssue};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const LONG_COMMENT_OPEN: &str = "{{!--";
const LONG_COMMENT_CLOSE: &str = "--}}";

pub(crate) fn parse(source: &str) -> (Vec<Node>, Vec<ParseIssue>) {
    let mut builder = TreeBuilder::default();
    let mut pos = 0;

    while let Some(rel) = source[pos..].find(OPEN) {
        let start = pos + rel;
        if start > pos {
            builder.push_text(&source[pos..start]);
        }

        // Long comments close on `--}}` only, so they may wrap `}}`.
        if source[start..].starts_with(LONG_COMMENT_OPEN) {
            let after_open = start + LONG_COMMENT_OPEN.len();
            match source[after_open..].find(LONG_COMMENT_CLOSE) {
                Some(len) => {
                    pos = after_open + len + LONG_COMMENT_CLOSE.len();
                }
                None => {
                    builder.issue("unterminated {{!-- --}} comment", start);
                    builder.push_text(&source[start..]);
                    pos = source.len();
                }
            }
            continue;
        }

        let Some(len) = source[start + OPEN.len()..].find(CLOSE) else {
            builder.issue("unterminated tag", start);
            builder.push_text(&source[start..]);
            pos = source.len();
            break;
        };

        let inner_start = start + OPEN.len();
        let inner = &source[inner_start..inner_start + len];
        let end = inner_start + len + CLOSE.len();
        builder.tag(inner, &source[start..end], start);
        pos = end;
    }

    if pos < source.len() {
        builder.push_text(&source[pos..]);
    }
    builder.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    If,
    Unless,
    Each,
}

impl FrameKind {
    fn open_tag(self) -> &'static str {
        match self {
            FrameKind::If => "{{#if}}",
            FrameKind::Unless => "{{#unless}}",
            FrameKind::Each => "{{#each}}",
        }
    }

    fn close_tag(self) -> &'static str {
        match self {
            FrameKind::If => "{{/if}}",
            FrameKind::Unless => "{{/unless}}",
            FrameKind::Each => "{{/each}}",
        }
    }
}

/// One open block awaiting its closing tag.
struct Frame {
    kind: FrameKind,
    path: String,
    open_raw: String,
    open_offset: usize,
    nodes: Vec<Node>,
    else_nodes: Vec<Node>,
    in_else: bool,
}

impl Frame {
    fn into_node(self) -> Node {
        match self.kind {
            FrameKind::If => Node::If {
                path: self.path,
                then_branch: self.nodes,
                else_branch: self.else_nodes,
            },
            FrameKind::Unless => Node::Unless {
                path: self.path,
                then_branch: self.nodes,
                else_branch: self.else_nodes,
            },
            FrameKind::Each => Node::Each {
                path: self.path,
                body: self.nodes,
            },
        }
    }
}

#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    stack: Vec<Frame>,
    issues: Vec<ParseIssue>,
}

impl TreeBuilder {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.push_node(Node::Text(text.to_string()));
    }

    fn push_node(&mut self, node: Node) {
        let branch = match self.stack.last_mut() {
            Some(frame) if frame.in_else => &mut frame.else_nodes,
            Some(frame) => &mut frame.nodes,
            None => &mut self.root,
        };
        // Adjacent literal runs collapse into one node.
        if let Node::Text(text) = &node {
            if let Some(Node::Text(prev)) = branch.last_mut() {
                prev.push_str(text);
                return;
            }
        }
        branch.push(node);
    }

    fn issue(&mut self, message: impl Into<String>, offset: usize) {
        self.issues.push(ParseIssue {
            message: message.into(),
            offset,
        });
    }

    fn tag(&mut self, inner: &str, raw: &str, offset: usize) {
        let body = inner.trim();

        // `{{! ... }}` comments emit nothing.
        if body.starts_with('!') {
            return;
        }

        if let Some(rest) = body.strip_prefix('>') {
            let name = rest.trim();
            if is_name(name) {
                self.push_node(Node::Partial {
                    name: name.to_string(),
                });
            } else {
                self.issue("partial inclusion with no usable name", offset);
                self.push_text(raw);
            }
            return;
        }

        let (head, rest) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));

        match head {
            "#if" => self.open(FrameKind::If, rest, raw, offset),
            "#unless" => self.open(FrameKind::Unless, rest, raw, offset),
            "#each" => self.open(FrameKind::Each, rest, raw, offset),
            "/if" => self.close(FrameKind::If, raw, offset),
            "/unless" => self.close(FrameKind::Unless, raw, offset),
            "/each" => self.close(FrameKind::Each, raw, offset),
            "else" if rest.is_empty() => self.else_marker(raw, offset),
            _ if head.starts_with('#') || head.starts_with('/') => {
                self.issue(format!("unknown block tag {head}"), offset);
                self.push_text(raw);
            }
            _ if rest.is_empty() && is_path(body) => {
                self.push_node(Node::Variable {
                    path: body.to_string(),
                    raw: raw.to_string(),
                });
            }
            _ => {
                self.issue(format!("unrecognized tag {body}"), offset);
                self.push_text(raw);
            }
        }
    }

    fn open(&mut self, kind: FrameKind, rest: &str, raw: &str, offset: usize) {
        let path = rest.trim();
        if !is_path(path) {
            self.issue(format!("{} block with no usable path", kind.open_tag()), offset);
            self.push_text(raw);
            return;
        }
        self.stack.push(Frame {
            kind,
            path: path.to_string(),
            open_raw: raw.to_string(),
            open_offset: offset,
            nodes: Vec::new(),
            else_nodes: Vec::new(),
            in_else: false,
        });
    }

    fn close(&mut self, kind: FrameKind, raw: &str, offset: usize) {
        if self.stack.last().is_some_and(|frame| frame.kind == kind) {
            if let Some(frame) = self.stack.pop() {
                let node = frame.into_node();
                self.push_node(node);
            }
            return;
        }
        self.issue(format!("unmatched {}", kind.close_tag()), offset);
        self.push_text(raw);
    }

    fn else_marker(&mut self, raw: &str, offset: usize) {
        match self.stack.last_mut() {
            Some(frame) if frame.kind != FrameKind::Each && !frame.in_else => {
                frame.in_else = true;
            }
            Some(frame) if frame.kind != FrameKind::Each => {
                self.issue("duplicate {{else}}", offset);
                self.push_text(raw);
            }
            Some(_) => {
                self.issue("{{else}} is not supported inside {{#each}}", offset);
                self.push_text(raw);
            }
            None => {
                self.issue("{{else}} outside a block", offset);
                self.push_text(raw);
            }
        }
    }

    /// Unwinds still-open blocks at end of input: the opening tag turns back
    /// into literal text and its children are spliced into the parent.
    fn finish(mut self) -> (Vec<Node>, Vec<ParseIssue>) {
        while let Some(frame) = self.stack.pop() {
            self.issues.push(ParseIssue {
                message: format!("unterminated {} block", frame.kind.open_tag()),
                offset: frame.open_offset,
            });
            let mut replacement = Vec::with_capacity(frame.nodes.len() + 2);
            replacement.push(Node::Text(frame.open_raw.clone()));
            replacement.extend(frame.nodes);
            if frame.in_else {
                replacement.push(Node::Text("{{else}}".to_string()));
                replacement.extend(frame.else_nodes);
            }
            for node in replacement {
                self.push_node(node);
            }
        }
        if !self.issues.is_empty() {
            debug!(count = self.issues.len(), "template parsed with issues");
            self.issues.sort_by_key(|issue| issue.offset);
        }
        (self.root, self.issues)
    }
}

/// Dotted lookup paths: `prenom`, `this.date`, `crmData.resultat`.
fn is_path(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Partial names additionally allow directory separators.
fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(source: &str) -> Vec<Node> {
        let (nodes, issues) = parse(source);
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
        nodes
    }

    #[test]
    fn test_plain_text_is_one_node() {
        let parsed = nodes("Bonjour, votre dossier est complet.");
        assert_eq!(
            parsed,
            vec![Node::Text("Bonjour, votre dossier est complet.".to_string())]
        );
    }

    #[test]
    fn test_variable_token() {
        let parsed = nodes("Bonjour {{prenom}},");
        assert_eq!(parsed.len(), 3);
        assert_eq!(
            parsed[1],
            Node::Variable {
                path: "prenom".to_string(),
                raw: "{{prenom}}".to_string(),
            }
        );
    }

    #[test]
    fn test_variable_keeps_original_spacing_in_raw() {
        let parsed = nodes("{{ date_examen }}");
        assert_eq!(
            parsed,
            vec![Node::Variable {
                path: "date_examen".to_string(),
                raw: "{{ date_examen }}".to_string(),
            }]
        );
    }

    #[test]
    fn test_partial_token() {
        let parsed = nodes("{{> signature}}");
        assert_eq!(
            parsed,
            vec![Node::Partial {
                name: "signature".to_string(),
            }]
        );
    }

    #[test]
    fn test_if_else_block() {
        let parsed = nodes("{{#if ok}}oui{{else}}non{{/if}}");
        assert_eq!(
            parsed,
            vec![Node::If {
                path: "ok".to_string(),
                then_branch: vec![Node::Text("oui".to_string())],
                else_branch: vec![Node::Text("non".to_string())],
            }]
        );
    }

    #[test]
    fn test_unless_block() {
        let parsed = nodes("{{#unless paye}}relance{{/unless}}");
        assert_eq!(
            parsed,
            vec![Node::Unless {
                path: "paye".to_string(),
                then_branch: vec![Node::Text("relance".to_string())],
                else_branch: vec![],
            }]
        );
    }

    #[test]
    fn test_each_block_with_nested_if() {
        let parsed = nodes("{{#each docs}}{{#if this.recu}}ok{{/if}}{{/each}}");
        assert_eq!(
            parsed,
            vec![Node::Each {
                path: "docs".to_string(),
                body: vec![Node::If {
                    path: "this.recu".to_string(),
                    then_branch: vec![Node::Text("ok".to_string())],
                    else_branch: vec![],
                }],
            }]
        );
    }

    #[test]
    fn test_short_comment_emits_nothing() {
        let parsed = nodes("a{{! note interne }}b");
        assert_eq!(parsed, vec![Node::Text("ab".to_string())]);
    }

    #[test]
    fn test_long_comment_may_contain_braces() {
        let parsed = nodes("a{{!-- garde {{ceci}} --}}b");
        assert_eq!(parsed, vec![Node::Text("ab".to_string())]);
    }

    #[test]
    fn test_unterminated_tag_degrades_to_text() {
        let (parsed, issues) = parse("avant {{prenom");
        assert_eq!(parsed, vec![Node::Text("avant {{prenom".to_string())]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_unterminated_block_keeps_children() {
        let (parsed, issues) = parse("{{#if ok}}oui {{prenom}}");
        assert_eq!(issues.len(), 1);
        assert_eq!(
            parsed,
            vec![
                Node::Text("{{#if ok}}oui ".to_string()),
                Node::Variable {
                    path: "prenom".to_string(),
                    raw: "{{prenom}}".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_mismatched_close_degrades_to_text() {
        let (parsed, issues) = parse("{{#if ok}}a{{/each}}b{{/if}}");
        assert_eq!(issues.len(), 1);
        assert_eq!(
            parsed,
            vec![Node::If {
                path: "ok".to_string(),
                then_branch: vec![Node::Text("a{{/each}}b".to_string())],
                else_branch: vec![],
            }]
        );
    }

    #[test]
    fn test_else_outside_block_degrades_to_text() {
        let (parsed, issues) = parse("a{{else}}b");
        assert_eq!(parsed, vec![Node::Text("a{{else}}b".to_string())]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_else_in_each_degrades_to_text() {
        let (parsed, issues) = parse("{{#each xs}}a{{else}}b{{/each}}");
        assert_eq!(issues.len(), 1);
        assert_eq!(
            parsed,
            vec![Node::Each {
                path: "xs".to_string(),
                body: vec![Node::Text("a{{else}}b".to_string())],
            }]
        );
    }

    #[test]
    fn test_unknown_block_tag_degrades_to_text() {
        let (parsed, issues) = parse("{{#with x}}y{{/with}}");
        assert_eq!(issues.len(), 2);
        assert_eq!(
            parsed,
            vec![Node::Text("{{#with x}}y{{/with}}".to_string())]
        );
    }

    #[test]
    fn test_tag_with_garbage_degrades_to_text() {
        let (parsed, issues) = parse("{{pre nom}}");
        assert_eq!(parsed, vec![Node::Text("{{pre nom}}".to_string())]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_issues_sorted_by_offset() {
        let (_, issues) = parse("{{#if a}}{{bad tag}}");
        assert_eq!(issues.len(), 2);
        assert!(issues[0].offset <= issues[1].offset);
    }
}
