#![forbid(unsafe_code)]

//! Popup frame intents.
//!
//! The server historically keyed intents by small integers. Those integers
//! only exist at the wire boundary ([`Action::wire_code`]); everything inside
//! the client matches on the enum.

use serde::{Deserialize, Serialize};

/// What a popup frame (or a grid CRUD button) intends to do with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// No specific intent.
    #[default]
    None,
    /// Create a new record.
    Insert,
    /// Edit an existing record.
    Change,
    /// Delete an existing record.
    Delete,
    /// Create a record from a copy of an existing one.
    Copy,
    /// Read-only view of a record.
    View,
    /// Pick a record for the caller.
    Lookup,
    /// Show a grid.
    Browse,
    /// Show a form.
    Form,
}

impl Action {
    /// All actions, in wire-code order.
    pub const ALL: [Action; 9] = [
        Action::None,
        Action::Insert,
        Action::Change,
        Action::Delete,
        Action::Copy,
        Action::View,
        Action::Lookup,
        Action::Browse,
        Action::Form,
    ];

    /// Numeric code the server expects in the `_action_` parameter.
    #[must_use]
    pub const fn wire_code(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Insert => 1,
            Self::Change => 2,
            Self::Delete => 3,
            Self::Copy => 4,
            Self::View => 5,
            Self::Lookup => 6,
            Self::Browse => 100,
            Self::Form => 101,
        }
    }

    /// Inverse of [`wire_code`](Self::wire_code).
    #[must_use]
    pub fn from_wire_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.wire_code() == code)
    }

    /// Lowercase name used in markup attributes (`data-crud="change"`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Insert => "insert",
            Self::Change => "change",
            Self::Delete => "delete",
            Self::Copy => "copy",
            Self::View => "view",
            Self::Lookup => "lookup",
            Self::Browse => "browse",
            Self::Form => "form",
        }
    }

    /// Parse a markup name (case-insensitive) or a numeric wire code.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(code) = text.parse::<u16>() {
            return Self::from_wire_code(code);
        }
        Self::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(text))
    }

    /// Browse and form frames can be populated from client-held state.
    #[must_use]
    pub const fn is_local_capable(self) -> bool {
        matches!(self, Self::Browse | Self::Form)
    }

    /// Row-level actions that require an existing record key.
    #[must_use]
    pub const fn needs_row_key(self) -> bool {
        matches!(self, Self::Change | Self::Delete | Self::Copy | Self::View)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
