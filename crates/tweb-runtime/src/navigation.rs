#![forbid(unsafe_code)]

//! Popup navigation stack.
//!
//! A single LIFO stack of [`PopupFrame`]s, owned by the
//! [`ThinClient`](crate::ThinClient). The stack itself is pure bookkeeping:
//! it knows what to send when a frame runs and how to resume the frame below
//! when one closes. Issuing those calls, showing chrome and serializing
//! concurrent navigation are the app context's job.
//!
//! # Invariants
//!
//! 1. **Depth**: `depth() == pushes - pops`, never negative; `pop` on an
//!    empty stack is a no-op.
//! 2. **Saved flag**: false on push; only [`mark_saved`](NavigationStack::mark_saved)
//!    sets it. A frame popped without it was cancelled.
//! 3. **Resume**: popping a frame yields a gain-focus call to the new top's
//!    target, or to the closed root frame's `called_from` page, or nothing.
//!    The call's refresh flag reflects the closed frame's `saved`.
//! 4. **Serials**: every pushed frame gets a fresh serial, so a late reply can
//!    tell whether the frame it was meant for is still on top.
//! 5. **Autosave**: autosave frames are built with [`detach`](NavigationStack::detach)
//!    and never join the stack, so the top frame is always the visible popup.

use tweb_core::{Action, CallEvent, Params, RefreshMode, RemoteCall, keys};
use tweb_protocol::{Command, PopupRequest};

/// One open popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupFrame {
    pub serial: u64,
    pub target: String,
    pub action: Action,
    pub row_key: String,
    pub title: String,
    pub called_from: Option<String>,
    pub parent_procedure: Option<String>,
    pub grandparent: Option<String>,
    pub view_state: Option<String>,
    pub equate: Option<String>,
    pub autosave: bool,
    pub browse_anchor: Option<String>,
    pub saved: bool,
    pub other_params: Params,
    pub on_complete: Option<Command>,
    /// Element id the popup's content is rendered into.
    pub container: String,
}

impl PopupFrame {
    fn from_request(request: PopupRequest, serial: u64, container: String) -> Self {
        Self {
            serial,
            target: request.target,
            action: request.action,
            row_key: request.row_key,
            title: request.title,
            called_from: request.called_from,
            parent_procedure: request.parent_procedure,
            grandparent: request.grandparent,
            view_state: request.view_state,
            equate: request.equate,
            autosave: request.autosave,
            browse_anchor: request.browse_anchor,
            saved: false,
            other_params: request.params.into_iter().collect(),
            on_complete: request.on_complete.map(|cmd| *cmd),
            container,
        }
    }

    fn with_context(&self, mut call: RemoteCall) -> RemoteCall {
        for (key, value) in [
            (keys::CALLED_FROM, &self.called_from),
            (keys::PARENT, &self.parent_procedure),
            (keys::GRANDPARENT, &self.grandparent),
            (keys::VIEW_STATE, &self.view_state),
            (keys::EQUATE, &self.equate),
        ] {
            if let Some(value) = value {
                call.params.set(key, value);
            }
        }
        call
    }

    /// The call that populates this frame.
    #[must_use]
    pub fn run_call(&self) -> RemoteCall {
        let mut call = RemoteCall::event(&self.target, CallEvent::Open)
            .action(self.action)
            .param(keys::ROW_KEY, &self.row_key);
        if !self.autosave {
            call = call.param(keys::POPUP, "1");
        }
        self.with_context(call).params(&self.other_params)
    }

    /// The commit call, carrying flushed field edits.
    #[must_use]
    pub fn save_call(&self, edits: &Params) -> RemoteCall {
        let call = RemoteCall::event(&self.target, CallEvent::Save)
            .method(tweb_core::Method::Post)
            .action(self.action)
            .param(keys::ROW_KEY, &self.row_key);
        self.with_context(call).params(edits)
    }

    /// The abandon call.
    #[must_use]
    pub fn cancel_call(&self) -> RemoteCall {
        let call = RemoteCall::event(&self.target, CallEvent::Cancel)
            .action(self.action)
            .param(keys::ROW_KEY, &self.row_key);
        self.with_context(call)
    }
}

/// Result of a pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popped {
    pub closed: PopupFrame,
    /// Gain-focus call resuming whatever is now in front.
    pub resume: Option<RemoteCall>,
}

/// A navigation request, queued while the stack has a call in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOp {
    Push(PopupRequest),
    /// Pop the top frame with the given outcome.
    Close { saved: bool },
    Commit,
    Cancel,
    /// Pick a record for the frame below and close.
    Select { row_key: String },
}

/// The stack.
#[derive(Debug, Clone)]
pub struct NavigationStack {
    frames: Vec<PopupFrame>,
    container_prefix: String,
    next_serial: u64,
}

impl NavigationStack {
    #[must_use]
    pub fn new(container_prefix: impl Into<String>) -> Self {
        Self {
            frames: Vec::new(),
            container_prefix: container_prefix.into(),
            next_serial: 1,
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn top(&self) -> Option<&PopupFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut PopupFrame> {
        self.frames.last_mut()
    }

    /// Frames bottom to top.
    #[must_use]
    pub fn frames(&self) -> &[PopupFrame] {
        &self.frames
    }

    fn take_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    /// Append a frame and return it.
    pub fn push(&mut self, request: PopupRequest) -> &PopupFrame {
        let serial = self.take_serial();
        let container = format!("{}{}", self.container_prefix, self.frames.len() + 1);
        self.frames
            .push(PopupFrame::from_request(request, serial, container));
        let index = self.frames.len() - 1;
        &self.frames[index]
    }

    /// Remove the top frame and plan the resume call.
    pub fn pop(&mut self) -> Option<Popped> {
        let closed = self.frames.pop()?;
        let resume = Self::resume_call(&closed, self.frames.last());
        Some(Popped { closed, resume })
    }

    /// A frame that runs beside the stack. It has no container.
    pub fn detach(&mut self, request: PopupRequest) -> PopupFrame {
        let serial = self.take_serial();
        PopupFrame::from_request(request, serial, String::new())
    }

    /// Gain-focus call for a detached frame that completed on its own.
    #[must_use]
    pub fn resume_after(&self, finished: &PopupFrame) -> Option<RemoteCall> {
        Self::resume_call(finished, self.frames.last())
    }

    fn resume_call(closed: &PopupFrame, parent: Option<&PopupFrame>) -> Option<RemoteCall> {
        let endpoint = match parent {
            Some(parent) => parent.target.clone(),
            None => closed.called_from.clone().filter(|c| !c.is_empty())?,
        };
        let mut call = RemoteCall::event(endpoint, CallEvent::GainFocus)
            .action(closed.action)
            .param(keys::ROW_KEY, &closed.row_key)
            .param(keys::CALLED_FROM, &closed.target)
            .param(keys::REFRESH, RefreshMode::resume(closed.saved).as_str());
        if let Some(view_state) = &closed.view_state {
            call = call.param(keys::VIEW_STATE, view_state);
        }
        if let Some(equate) = &closed.equate {
            call = call.param(keys::EQUATE, equate);
        }
        Some(call)
    }

    /// Update the top frame's record key. Returns whether a frame was open.
    pub fn set_row_key(&mut self, key: &str) -> bool {
        match self.frames.last_mut() {
            Some(top) => {
                top.row_key = key.to_string();
                true
            }
            None => false,
        }
    }

    /// Set or clear the top frame's saved flag.
    pub fn mark_saved(&mut self, saved: bool) -> bool {
        match self.frames.last_mut() {
            Some(top) => {
                top.saved = saved;
                true
            }
            None => false,
        }
    }
}
