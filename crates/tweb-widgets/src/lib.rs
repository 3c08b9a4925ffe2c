#![forbid(unsafe_code)]

//! Widget clients for tweb.
//!
//! A widget client is the live half of a piece of server markup. The server
//! renders the grid or form; the client owns the bits of state the markup
//! cannot carry across re-renders (selection, expand flags, pending edits),
//! re-applies that state after every patch, and turns user interaction into
//! [`WidgetOutcome`]s for the runtime to execute.
//!
//! Clients never perform I/O and never touch the navigation stack. They
//! mutate the page only for immediate local feedback (selection, striping,
//! dimming).

pub mod decoration;
pub mod form;
pub mod grid;

pub use decoration::Decoration;
pub use form::FormClient;
pub use grid::{GridClient, GridViewState, RowBlock};

use tweb_core::RemoteCall;
use tweb_dom::{Dom, NodeId};
use tweb_protocol::PopupRequest;

/// Markup attribute naming a widget root's kind.
pub const WIDGET_ATTR: &str = "data-widget";

/// What a widget interaction asks the runtime to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetOutcome {
    /// Issue a call and apply its reply.
    Call(RemoteCall),
    /// Issue a call and ignore its reply.
    Notify(RemoteCall),
    /// Push a popup frame.
    Open(PopupRequest),
    /// Ask the user first; run `then` only on acceptance.
    Confirm {
        /// `None` means the runtime's default prompt.
        prompt: Option<String>,
        then: Box<WidgetOutcome>,
    },
    /// A record was picked (lookup selection).
    Select { row_key: String },
}

/// Behaviour shared by every widget client.
pub trait Widget {
    /// Id of the widget's root element.
    fn id(&self) -> &str;

    /// Re-read configuration from freshly patched markup and restore local
    /// state on top of it.
    fn rebind(&mut self, dom: &mut Dom, decoration: &Decoration);

    /// Root element, if it is still on the page.
    fn root(&self, dom: &Dom) -> Option<NodeId> {
        dom.by_id(self.id())
    }

    /// Whether the widget's root is still on the page.
    fn is_attached(&self, dom: &Dom) -> bool {
        self.root(dom).is_some()
    }
}

/// Widget kind declared by `node`, if it is a widget root.
#[must_use]
pub fn widget_kind(dom: &Dom, node: NodeId) -> Option<&str> {
    dom.attr(node, WIDGET_ATTR)
}
