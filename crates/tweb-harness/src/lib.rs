#![forbid(unsafe_code)]

//! Test harness for the tweb thin client.
//!
//! - [`ScriptedGateway`] answers remote calls from per-endpoint queues and
//!   records every request it sees.
//! - [`Driver`] plays host: it feeds events to a
//!   [`ThinClient`](tweb_runtime::ThinClient), executes the effects it emits
//!   through a gateway until the client is idle, and records chrome, alerts
//!   and confirmations for assertions. Every step is also written to a JSONL
//!   transcript.

pub mod driver;
pub mod gateway;

pub use driver::{Chrome, Driver};
pub use gateway::ScriptedGateway;

/// Install a `fmt` subscriber honouring `RUST_LOG`, once per process.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
