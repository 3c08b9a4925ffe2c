#![forbid(unsafe_code)]

//! Core: shared vocabulary for the tweb thin client.
//!
//! # Role in tweb
//! `tweb-core` holds the small value types every other crate speaks in:
//!
//! - **Action**: the intent of a popup frame (insert, change, lookup, ...).
//! - **RemoteCall**: an endpoint plus ordered parameters, the unit of work the
//!   host transport executes.
//! - **KeyEvent**: normalized keyboard input delivered by the host.
//! - **TabSession**: the per-tab token that disambiguates browser tabs sharing
//!   one server-side session.
//!
//! Nothing in here touches the page model or performs I/O.

pub mod action;
pub mod call;
pub mod event;
pub mod session;

pub use action::Action;
pub use call::{CallEvent, Method, NavDirection, Params, RefreshMode, RemoteCall, keys};
pub use event::{KeyCode, KeyEvent, KeyEventKind, Modifiers};
pub use session::{MemoryTabStorage, TabOrigin, TabSession, TabStorage};
