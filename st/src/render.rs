//! Tree evaluation.
//!
//! Rendering never fails. Missing values leave the original token in place
//! (a later [`cleanup`](crate::cleanup) pass strips what remains), missing
//! partials emit nothing, and partial recursion is cut off at a fixed depth.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::ast::{Node, Template};

/// Partial inclusions deeper than this are dropped. Catches definition
/// cycles such as a block including itself.
pub const MAX_PARTIAL_DEPTH: usize = 8;

/// Value source for lookup paths.
///
/// Implementors own the resolution rules for a dotted path; the renderer
/// only adds `this` scoping inside `{{#each}}` bodies on top of it.
pub trait Scope {
    fn lookup(&self, path: &str) -> Option<Value>;
}

/// Flat JSON object: exact key first, then dotted descent into nested
/// objects.
impl Scope for Map<String, Value> {
    fn lookup(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.get(path) {
            return Some(value.clone());
        }
        let (head, rest) = path.split_once('.')?;
        dig(self.get(head)?, rest)
    }
}

/// Source of `{{> name}}` content.
pub trait Partials {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Resolves nothing. For templates that use no partials.
pub struct NoPartials;

impl Partials for NoPartials {
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }
}

impl Partials for HashMap<String, String> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// What a render produced, text plus an audit of what happened inside.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutcome {
    /// Rendered text, before any cleanup pass.
    pub text: String,
    /// Partial names that were found and included, in first-use order.
    pub partials_included: Vec<String>,
    /// Variable paths that were substituted with a value.
    pub variables_replaced: Vec<String>,
    /// Reserved placeholder names left untouched in the output.
    pub reserved_seen: Vec<String>,
}

/// Walks a [`Template`] against a [`Scope`].
pub struct Renderer<'p> {
    partials: &'p dyn Partials,
    reserved: Vec<String>,
    max_partial_depth: usize,
}

impl<'p> Renderer<'p> {
    pub fn new(partials: &'p dyn Partials) -> Self {
        Renderer {
            partials,
            reserved: Vec::new(),
            max_partial_depth: MAX_PARTIAL_DEPTH,
        }
    }

    /// Placeholder names that are never substituted or stripped. They pass
    /// through for a later generation step to fill.
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = depth;
        self
    }

    pub fn render(&self, template: &Template, scope: &dyn Scope) -> RenderOutcome {
        let mut outcome = RenderOutcome::default();
        let mut text = String::new();
        self.eval(&template.nodes, scope, None, 0, &mut text, &mut outcome);
        outcome.text = text;
        outcome
    }

    fn eval(
        &self,
        nodes: &[Node],
        scope: &dyn Scope,
        element: Option<&Value>,
        depth: usize,
        buf: &mut String,
        outcome: &mut RenderOutcome,
    ) {
        for node in nodes {
            match node {
                Node::Text(text) => buf.push_str(text),
                Node::Variable { path, raw } => {
                    self.variable(path, raw, scope, element, buf, outcome);
                }
                Node::Partial { name } => {
                    self.partial(name, scope, element, depth, buf, outcome);
                }
                Node::If {
                    path,
                    then_branch,
                    else_branch,
                } => {
                    let branch = if self.truthy_at(path, scope, element) {
                        then_branch
                    } else {
                        else_branch
                    };
                    self.eval(branch, scope, element, depth, buf, outcome);
                }
                Node::Unless {
                    path,
                    then_branch,
                    else_branch,
                } => {
                    let branch = if self.truthy_at(path, scope, element) {
                        else_branch
                    } else {
                        then_branch
                    };
                    self.eval(branch, scope, element, depth, buf, outcome);
                }
                Node::Each { path, body } => {
                    let Some(Value::Array(items)) = resolve(path, scope, element) else {
                        continue;
                    };
                    for item in &items {
                        self.eval(body, scope, Some(item), depth, buf, outcome);
                    }
                }
            }
        }
    }

    fn variable(
        &self,
        path: &str,
        raw: &str,
        scope: &dyn Scope,
        element: Option<&Value>,
        buf: &mut String,
        outcome: &mut RenderOutcome,
    ) {
        if self.reserved.iter().any(|name| name == path) {
            buf.push_str(raw);
            push_unique(&mut outcome.reserved_seen, path);
            return;
        }
        match resolve(path, scope, element) {
            Some(value) if substitutable(&value) => {
                buf.push_str(&value_text(&value));
                push_unique(&mut outcome.variables_replaced, path);
            }
            // Token stays; cleanup strips it later.
            _ => buf.push_str(raw),
        }
    }

    fn partial(
        &self,
        name: &str,
        scope: &dyn Scope,
        element: Option<&Value>,
        depth: usize,
        buf: &mut String,
        outcome: &mut RenderOutcome,
    ) {
        if depth >= self.max_partial_depth {
            warn!(partial = %name, depth, "partial inclusion too deep, dropping");
            return;
        }
        let Some(source) = self.partials.resolve(name) else {
            debug!(partial = %name, "partial not found, emitting nothing");
            return;
        };
        let template = Template::parse(&source);
        for issue in &template.issues {
            debug!(partial = %name, %issue, "issue in included partial");
        }
        push_unique(&mut outcome.partials_included, name);
        self.eval(&template.nodes, scope, element, depth + 1, buf, outcome);
    }

    fn truthy_at(&self, path: &str, scope: &dyn Scope, element: Option<&Value>) -> bool {
        resolve(path, scope, element).is_some_and(|value| is_truthy(&value))
    }
}

/// `this` and `this.*` read from the current `{{#each}}` element; everything
/// else goes to the scope.
fn resolve(path: &str, scope: &dyn Scope, element: Option<&Value>) -> Option<Value> {
    if path == "this" {
        return element.cloned();
    }
    if let Some(rest) = path.strip_prefix("this.") {
        return dig(element?, rest);
    }
    scope.lookup(path)
}

/// Descends a dotted path through nested objects.
pub fn dig(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

/// Host-style truthiness: null, false, zero, empty string, empty array and
/// empty object are all falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Only strings and numbers are written into the output. Booleans, arrays
/// and objects are gate material, not printable content.
fn substitutable(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Number(_) => true,
        _ => false,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}
