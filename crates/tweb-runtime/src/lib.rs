#![forbid(unsafe_code)]

//! Host-driven runtime for the tweb thin client.
//!
//! The server renders markup and decides what happens next; this crate keeps
//! the page model in step with it.
//!
//! - [`interpreter`] applies reply payloads (element patches and typed
//!   commands) to the page.
//! - [`navigation`] keeps the stack of popup frames and plans the calls that
//!   populate, commit, abandon and resume them.
//! - [`app`] ties both to the widget clients and the tab session behind a
//!   single [`ThinClient`] that speaks [`Effect`]s to its host.
//!
//! # Example
//!
//! ```
//! use tweb_core::{TabOrigin, TabSession};
//! use tweb_runtime::{Effect, RuntimeConfig, ThinClient};
//!
//! let mut client = ThinClient::new(
//!     RuntimeConfig::default(),
//!     TabSession::with_token("tab-1", TabOrigin::Minted),
//! );
//! client.load(r#"<div id="status">idle</div>"#).unwrap();
//! client.apply_payload(
//!     r#"{"records":[{"kind":"element","id":"status","html":"<div id=\"status\">busy</div>"}]}"#,
//! );
//! let status = client.page().by_id("status").unwrap();
//! assert_eq!(client.page().text_content(status), "busy");
//! assert!(client.drain_effects().iter().all(|e| !matches!(e, Effect::Call(_))));
//! ```

pub mod app;
pub mod config;
pub mod effect;
pub mod event;
pub mod gateway;
pub mod interpreter;
pub mod navigation;

pub use app::ThinClient;
pub use config::{ConfigError, RuntimeConfig};
pub use effect::{Effect, RemoteRequest, Ticket};
pub use event::Event;
pub use gateway::{Gateway, GatewayError};
pub use interpreter::ApplyReport;
pub use navigation::{NavOp, NavigationStack, Popped, PopupFrame};
