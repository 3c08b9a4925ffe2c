#![forbid(unsafe_code)]

//! Page model for the tweb thin client.
//!
//! The runtime never talks to a real browser document. It owns a [`Dom`]:
//! an arena of element and text nodes that the embedding host renders and
//! reports events against. Server replies patch this tree by replacing whole
//! subtrees identified by element id.
//!
//! # Invariants
//!
//! - A replaced or removed subtree is released: its slots return to a free
//!   list and their generation is bumped. Stale [`NodeId`]s held by a host
//!   resolve to nothing instead of to whatever now occupies the slot.
//! - Tree walks use explicit work lists, so nesting depth is bounded by
//!   memory and not by the call stack.
//! - The id index only ever points at connected elements; the first element
//!   in document order wins when markup repeats an id.
//! - Focus never rests on a detached node.

mod dom;
mod parse;

pub use dom::{Dom, Element, NodeId, NodeKind};
pub use parse::{decode_entities, escape_attr, escape_text, parse_fragment};

/// Errors from building or patching the page model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// Markup could not be parsed into a fragment.
    HtmlParse(String),
}

impl core::fmt::Display for DomError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
        }
    }
}

impl std::error::Error for DomError {}
