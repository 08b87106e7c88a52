//! Protocol error types
//!
//! Errors raised at the transport boundary: a request that could not be handed
//! to the peer, or a reply that does not match the request it answers.

use std::fmt;

/// Protocol error type
#[derive(Debug)]
pub enum ProtocolError {
	/// Session to the peer is gone; no reply will ever arrive
	Disconnected,
	/// No reply arrived within the configured reply timeout
	Timeout,
	/// Reply payload does not belong to the request kind it correlates with
	UnexpectedResponse(String),
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::Disconnected => write!(f, "Peer session disconnected"),
			ProtocolError::Timeout => write!(f, "Timed out waiting for reply"),
			ProtocolError::UnexpectedResponse(msg) => write!(f, "Unexpected response: {}", msg),
		}
	}
}

impl std::error::Error for ProtocolError {}

// vim: ts=4
