//! Stencil - block-structured text templating with graceful degradation
//!
//! A small template language for operational text: `{{variable}}`
//! substitution, `{{#if}}`/`{{#unless}}` gates, `{{#each}}` iteration and
//! `{{> name}}` partial inclusion. The source is parsed once into a node
//! tree, then evaluated against a [`Scope`].
//!
//! Authoring mistakes never abort anything: malformed constructs degrade to
//! literal text with a [`ParseIssue`] attached, unresolved tokens stay in
//! the output until [`cleanup`] strips them, and reserved placeholder names
//! survive every pass untouched.
//!
//! # Example
//!
//! ```ignore
//! use stencil::{cleanup, NoPartials, Renderer, Template};
//!
//! let template = Template::parse("Bonjour {{prenom}}{{#if retard}}, vite{{/if}}");
//! let outcome = Renderer::new(&NoPartials).render(&template, &scope);
//! let text = cleanup(&outcome.text, &[]);
//! ```

pub mod ast;
pub mod cleanup;
mod parser;
pub mod render;

// Re-export commonly used types
pub use ast::{Node, ParseIssue, Template};
pub use cleanup::{cleanup, collapse_newlines, strip_comments};
pub use render::{
    MAX_PARTIAL_DEPTH, NoPartials, Partials, RenderOutcome, Renderer, Scope, dig, is_truthy,
};
