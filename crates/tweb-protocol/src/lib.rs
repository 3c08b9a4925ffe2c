#![forbid(unsafe_code)]

//! Wire format of server replies.
//!
//! A reply is a JSON envelope holding an ordered list of records. Each record
//! is either an `element` (replace the subtree with this id by this markup)
//! or a `script` (run one typed [`Command`]). [`parse_payload`] turns the
//! envelope into [`Directive`]s; it never touches the page.
//!
//! ```json
//! {"records": [
//!   {"kind": "element", "id": "grid1", "html": "<div id=\"grid1\">...</div>"},
//!   {"kind": "script", "command": "set_focus", "id": "name"}
//! ]}
//! ```

mod command;
mod envelope;

pub use command::{Command, PopupRequest};
pub use envelope::{Directive, PayloadBuilder, parse_payload};

/// Errors from decoding a reply envelope.
///
/// Any of these makes the whole payload a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not valid JSON.
    Json(String),
    /// Valid JSON, but not an object with a `records` array.
    NotAnEnvelope,
    /// A record without a `kind`.
    MissingKind { index: usize },
    /// An element record without a required field.
    MissingField { index: usize, field: &'static str },
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "JSON parse error: {msg}"),
            Self::NotAnEnvelope => write!(f, "payload is not a record envelope"),
            Self::MissingKind { index } => write!(f, "record {index} has no kind"),
            Self::MissingField { index, field } => {
                write!(f, "element record {index} is missing `{field}`")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}
