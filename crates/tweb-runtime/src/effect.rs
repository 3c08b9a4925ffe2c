#![forbid(unsafe_code)]

//! Effects handed to the host.
//!
//! The runtime never performs I/O. Everything observable outside the page
//! model leaves as an [`Effect`] in the order it was decided; the host
//! executes it and, for calls and confirmations, answers with the effect's
//! [`Ticket`].

use tweb_core::RemoteCall;

/// Correlates an effect with its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

impl core::fmt::Display for Ticket {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A remote call ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub ticket: Ticket,
    pub call: RemoteCall,
    /// Transport headers (the tab session token).
    pub headers: Vec<(String, String)>,
    /// Per-endpoint sequence number, starting at 1.
    pub seq: u64,
}

impl RemoteRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Something the host must do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Execute and [`deliver`](crate::ThinClient::deliver) the reply.
    Call(RemoteRequest),
    /// Execute; the reply is ignored.
    Notify(RemoteRequest),
    /// Show popup chrome around `container`.
    ShowModal { container: String, title: String },
    /// Hide the chrome around `container`.
    HideModal { container: String },
    /// Ask the user; answer through
    /// [`answer_confirm`](crate::ThinClient::answer_confirm).
    Confirm { ticket: Ticket, prompt: String },
    /// Show a message.
    Alert { text: String },
    /// Navigate this tab.
    Redirect { url: String },
    /// Open a new tab.
    OpenTab { url: String },
}

impl Effect {
    /// The request of a call or notify effect.
    #[must_use]
    pub fn request(&self) -> Option<&RemoteRequest> {
        match self {
            Self::Call(request) | Self::Notify(request) => Some(request),
            _ => None,
        }
    }
}
