//! Parsed template representation.
//!
//! A template is tokenized exactly once into a tree of [`Node`]s. Rendering
//! walks the tree; nothing re-scans the text afterwards. Authoring mistakes
//! never abort a parse: the offending construct is kept as literal text and
//! reported as a [`ParseIssue`].

use std::fmt;

use crate::parser;

/// One node of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text, emitted verbatim.
    Text(String),
    /// A `{{path}}` substitution site. `raw` keeps the original token so the
    /// renderer can leave it in place when no usable value exists.
    Variable { path: String, raw: String },
    /// A `{{> name}}` inclusion resolved against a partial source at render
    /// time.
    Partial { name: String },
    /// `{{#if path}} ... {{else}} ... {{/if}}`.
    If {
        path: String,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    /// `{{#unless path}} ... {{else}} ... {{/unless}}`.
    Unless {
        path: String,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    /// `{{#each path}} ... {{/each}}`, body evaluated once per element with
    /// `this` bound to the element.
    Each { path: String, body: Vec<Node> },
}

/// A non-fatal authoring problem found while parsing.
///
/// The parser degrades the construct to literal text and keeps going, so a
/// template with issues still renders; callers decide whether to surface the
/// diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseIssue {
    /// Human-readable description of the problem.
    pub message: String,
    /// Byte offset into the source where the construct started.
    pub offset: usize,
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.offset)
    }
}

/// A template parsed into its node tree plus any authoring diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Root nodes in document order.
    pub nodes: Vec<Node>,
    /// Problems encountered while parsing, in source order.
    pub issues: Vec<ParseIssue>,
}

impl Template {
    /// Parses `source` into a node tree. Never fails: malformed constructs
    /// degrade to literal text and are recorded in [`Template::issues`].
    pub fn parse(source: &str) -> Self {
        let (nodes, issues) = parser::parse(source);
        Template { nodes, issues }
    }

    /// True when the template contains no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when parsing recorded at least one authoring problem.
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}
