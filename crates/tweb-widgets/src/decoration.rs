#![forbid(unsafe_code)]

//! Class names the clients toggle.

use serde::{Deserialize, Serialize};

/// CSS classes applied by widget clients and the finishing passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decoration {
    /// Even record blocks (0-based).
    pub stripe_even: String,
    /// Odd record blocks.
    pub stripe_odd: String,
    /// Rows of the selected block.
    pub selected: String,
    /// Rows of the block under the pointer.
    pub hover: String,
    /// Grid root while a paging call is in flight.
    pub busy: String,
    /// Grid root while a popup it spawned is open.
    pub suspended: String,
    /// Empty inputs showing their placeholder text.
    pub placeholder: String,
}

impl Default for Decoration {
    fn default() -> Self {
        Self {
            stripe_even: "tw-even".into(),
            stripe_odd: "tw-odd".into(),
            selected: "tw-selected".into(),
            hover: "tw-hover".into(),
            busy: "tw-busy".into(),
            suspended: "tw-suspended".into(),
            placeholder: "tw-placeholder".into(),
        }
    }
}

impl Decoration {
    /// Names that must be non-empty for the decoration passes to work.
    pub(crate) fn entries(&self) -> [(&'static str, &str); 7] {
        [
            ("stripe_even", &self.stripe_even),
            ("stripe_odd", &self.stripe_odd),
            ("selected", &self.selected),
            ("hover", &self.hover),
            ("busy", &self.busy),
            ("suspended", &self.suspended),
            ("placeholder", &self.placeholder),
        ]
    }

    /// Problems with this table, one message per problem.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, class) in self.entries() {
            if class.trim().is_empty() {
                errors.push(format!("decoration.{name} must not be empty"));
            } else if class.contains(char::is_whitespace) {
                errors.push(format!("decoration.{name} must be a single class name"));
            }
        }
        errors
    }
}
