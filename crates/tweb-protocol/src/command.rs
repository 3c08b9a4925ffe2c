#![forbid(unsafe_code)]

//! Typed page commands.
//!
//! The set is closed: a script record naming anything else is skipped by the
//! envelope parser. Commands are plain data; the runtime decides what each
//! one does to the page and the navigation stack.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tweb_core::Action;

/// One command carried by a `script` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Re-run the initialization hook of the widget rooted at `id`.
    ReinitWidget { id: String },
    /// Move keyboard focus.
    SetFocus { id: String },
    /// Show a message to the user.
    ShowMessage { text: String },
    /// Set the live value of a form control.
    SetValue { id: String, value: String },
    /// Detach an element.
    RemoveElement { id: String },
    /// Clear the `hidden` attribute.
    Show { id: String },
    /// Set the `hidden` attribute.
    Hide { id: String },
    /// Navigate the whole tab away.
    Redirect { url: String },
    /// Push a popup frame.
    OpenPopup(PopupRequest),
    /// Pop the top popup frame.
    ClosePopup {
        #[serde(default)]
        saved: bool,
    },
    /// The server refused a commit; keep the popup open.
    RejectCommit {
        #[serde(default)]
        message: Option<String>,
    },
    /// Re-derive a grid's visual state, optionally moving its selection.
    RefreshGrid {
        id: String,
        #[serde(default)]
        selection: Option<String>,
    },
    /// Update the top popup frame's record key.
    SetRowKey { key: String },
}

impl Command {
    /// Wire name, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReinitWidget { .. } => "reinit_widget",
            Self::SetFocus { .. } => "set_focus",
            Self::ShowMessage { .. } => "show_message",
            Self::SetValue { .. } => "set_value",
            Self::RemoveElement { .. } => "remove_element",
            Self::Show { .. } => "show",
            Self::Hide { .. } => "hide",
            Self::Redirect { .. } => "redirect",
            Self::OpenPopup(_) => "open_popup",
            Self::ClosePopup { .. } => "close_popup",
            Self::RejectCommit { .. } => "reject_commit",
            Self::RefreshGrid { .. } => "refresh_grid",
            Self::SetRowKey { .. } => "set_row_key",
        }
    }
}

/// Everything needed to push a popup frame.
///
/// Only `target` is required; the rest defaults to an empty, chrome-showing
/// frame with [`Action::None`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupRequest {
    pub target: String,
    pub row_key: String,
    pub title: String,
    pub action: Action,
    pub browse_anchor: Option<String>,
    pub called_from: Option<String>,
    pub params: BTreeMap<String, String>,
    pub autosave: bool,
    pub on_complete: Option<Box<Command>>,
    pub grandparent: Option<String>,
    pub view_state: Option<String>,
    pub equate: Option<String>,
    pub parent_procedure: Option<String>,
}

impl PopupRequest {
    #[must_use]
    pub fn new(target: impl Into<String>, action: Action) -> Self {
        Self {
            target: target.into(),
            action,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn row_key(mut self, key: impl Into<String>) -> Self {
        self.row_key = key.into();
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn browse_anchor(mut self, grid_id: impl Into<String>) -> Self {
        self.browse_anchor = Some(grid_id.into());
        self
    }

    #[must_use]
    pub fn called_from(mut self, procedure: impl Into<String>) -> Self {
        self.called_from = Some(procedure.into());
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    #[must_use]
    pub fn on_complete(mut self, command: Command) -> Self {
        self.on_complete = Some(Box::new(command));
        self
    }

    #[must_use]
    pub fn view_state(mut self, token: impl Into<String>) -> Self {
        self.view_state = Some(token.into());
        self
    }

    #[must_use]
    pub fn equate(mut self, token: impl Into<String>) -> Self {
        self.equate = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn commands_are_tagged_by_name() {
        let cmd: Command =
            serde_json::from_str(r#"{"command":"set_value","id":"qty","value":"3"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::SetValue {
                id: "qty".into(),
                value: "3".into()
            }
        );
        assert_eq!(cmd.name(), "set_value");
    }

    #[test]
    fn open_popup_defaults() {
        let cmd: Command = serde_json::from_str(
            r#"{"command":"open_popup","target":"CustomerForm","action":"change","row_key":"7"}"#,
        )
        .unwrap();
        let Command::OpenPopup(req) = cmd else {
            panic!("expected open_popup");
        };
        assert_eq!(req.target, "CustomerForm");
        assert_eq!(req.action, Action::Change);
        assert_eq!(req.row_key, "7");
        assert!(!req.autosave);
        assert!(req.params.is_empty());
    }

    #[test]
    fn nested_on_complete() {
        let cmd: Command = serde_json::from_str(
            r#"{"command":"open_popup","target":"T","on_complete":{"command":"set_focus","id":"x"}}"#,
        )
        .unwrap();
        let Command::OpenPopup(req) = cmd else {
            panic!("expected open_popup");
        };
        assert_eq!(
            req.on_complete.as_deref(),
            Some(&Command::SetFocus { id: "x".into() })
        );
    }

    #[test]
    fn close_popup_saved_defaults_false() {
        let cmd: Command = serde_json::from_str(r#"{"command":"close_popup"}"#).unwrap();
        assert_eq!(cmd, Command::ClosePopup { saved: false });
    }

    #[test]
    fn unknown_command_fails_to_decode() {
        assert!(serde_json::from_str::<Command>(r#"{"command":"eval","code":"1"}"#).is_err());
    }
}
