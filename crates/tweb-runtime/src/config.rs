#![forbid(unsafe_code)]

//! Runtime configuration as data.
//!
//! Every behaviour switch of the runtime lives in one [`RuntimeConfig`] that
//! can be loaded from TOML or JSON. Missing keys take their defaults, so an
//! empty document is a valid configuration.
//!
//! ```toml
//! client_held_state = true
//! session_header = "X-Tab-Session"
//!
//! [decoration]
//! selected = "row-selected"
//! ```
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_toml_file("tweb.toml")?;
//! let config = RuntimeConfig::from_json_str(json)?.into_validated()?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tweb_widgets::Decoration;

/// Runtime switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Populate browse/form popups from a cached reply when one exists.
    pub client_held_state: bool,
    /// Drop replies older than one already applied for the same endpoint.
    pub drop_stale_responses: bool,
    /// Transport header carrying the tab session token.
    pub session_header: String,
    /// Popup container ids are this prefix plus the stack depth.
    pub popup_container_prefix: String,
    /// Focus the first focusable field of a popup once it is populated.
    pub focus_first_field: bool,
    /// Confirmation prompt for row deletes without their own `data-confirm`.
    pub confirm_delete_prompt: String,
    /// Class names toggled by the widgets and finishing passes.
    pub decoration: Decoration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            client_held_state: false,
            drop_stale_responses: false,
            session_header: "X-Tab-Session".into(),
            popup_container_prefix: "tw-popup-".into(),
            focus_first_field: true,
            confirm_delete_prompt: "Delete this record?".into(),
            decoration: Decoration::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Validate all values.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.session_header.is_empty() {
            errors.push("session_header must not be empty".into());
        } else if !self
            .session_header
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
        {
            errors.push(format!(
                "session_header is not a valid header name: {:?}",
                self.session_header
            ));
        }

        if self.popup_container_prefix.is_empty() {
            errors.push("popup_container_prefix must not be empty".into());
        } else if self.popup_container_prefix.contains(char::is_whitespace) {
            errors.push("popup_container_prefix must not contain whitespace".into());
        }

        if self.confirm_delete_prompt.trim().is_empty() {
            errors.push("confirm_delete_prompt must not be empty".into());
        }

        errors.extend(self.decoration.validate());
        errors
    }

    /// `self` if valid, else every problem at once.
    pub fn into_validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Container id of the popup at `depth` (1-based).
    #[must_use]
    pub fn popup_container(&self, depth: usize) -> String {
        format!("{}{depth}", self.popup_container_prefix)
    }
}

/// Errors from loading a [`RuntimeConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
