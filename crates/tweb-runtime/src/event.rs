#![forbid(unsafe_code)]

//! Host-reported user input.

use tweb_core::KeyEvent;
use tweb_dom::NodeId;

/// One user interaction, addressed to the page node it happened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Click(NodeId),
    DoubleClick(NodeId),
    /// Pointer entered a node.
    Hover(NodeId),
    /// Pointer left a node.
    PointerLeave(NodeId),
    /// Keystroke-level edit of a control.
    Input { node: NodeId, value: String },
    /// Committed edit (blur, enter, select change).
    Change { node: NodeId, value: String },
    Key { node: NodeId, key: KeyEvent },
}

impl Event {
    /// Node the event is addressed to.
    #[must_use]
    pub fn node(&self) -> NodeId {
        match self {
            Self::Click(node)
            | Self::DoubleClick(node)
            | Self::Hover(node)
            | Self::PointerLeave(node)
            | Self::Input { node, .. }
            | Self::Change { node, .. }
            | Self::Key { node, .. } => *node,
        }
    }
}
