#![forbid(unsafe_code)]

//! Synchronous transport contract for hosts that can block.

use crate::effect::RemoteRequest;

/// Executes remote calls.
pub trait Gateway {
    /// Perform `request` and return the raw reply payload.
    fn call(&mut self, request: &RemoteRequest) -> Result<String, GatewayError>;
}

/// Transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The call did not complete.
    Transport(String),
    /// The server answered with a non-success status.
    Status(u16),
}

impl core::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Status(code) => write!(f, "server returned status {code}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl<G: Gateway + ?Sized> Gateway for &mut G {
    fn call(&mut self, request: &RemoteRequest) -> Result<String, GatewayError> {
        (**self).call(request)
    }
}
