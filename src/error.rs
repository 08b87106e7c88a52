//! Error types for file manager operations

use std::error::Error;
use std::fmt;
use std::io;

use crate::protocol::{ProtocolError, RequestKind};
use crate::types::{ManagerState, ResourceRef};

/// Why a file manager operation did not succeed
///
/// These never escape the manager as panics or `Err` returns from the
/// dispatching calls; they reach callers through `CompletionListener::on_error`
/// right before `on_complete(false)`.
#[derive(Debug)]
pub enum FileManagerError {
	/// Listing queried before the manager became ready
	NotReady { state: ManagerState },

	/// Descriptor carries neither inline bytes nor a resource reference
	NoSourceProvided { name: Option<String> },

	/// Resource could not be opened or read, or read to nothing
	SourceUnavailable { reference: ResourceRef, source: io::Error },

	/// Descriptor lacks a name or a resolvable file type
	MissingRequiredField { field: &'static str },

	/// Listing request failed at the transport or was refused by the peer
	ListingFailed { message: String },

	/// Peer answered an upload or delete with failure
	PeerRejected { operation: RequestKind, name: String, info: Option<String> },

	/// Batch operation called with nothing in it
	EmptyBatch,

	/// At least one element of a batch failed
	BatchFailed { failed: usize, total: usize },

	/// No reply within the configured reply timeout
	Timeout { operation: RequestKind },

	/// Transport error (nested)
	Protocol(ProtocolError),
}

impl fmt::Display for FileManagerError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FileManagerError::NotReady { state } => {
				write!(f, "File manager is not ready (state: {})", state)
			}
			FileManagerError::NoSourceProvided { name } => match name {
				Some(name) => write!(f, "No file data or resource provided for {}", name),
				None => write!(f, "No file data or resource provided"),
			},
			FileManagerError::SourceUnavailable { reference, source } => {
				write!(f, "Cannot read resource {}: {}", reference, source)
			}
			FileManagerError::MissingRequiredField { field } => {
				write!(f, "Missing required field: {}", field)
			}
			FileManagerError::ListingFailed { message } => {
				write!(f, "Failed to list remote files: {}", message)
			}
			FileManagerError::PeerRejected { operation, name, info } => match info {
				Some(info) => write!(f, "{} of {} rejected by peer: {}", operation, name, info),
				None => write!(f, "{} of {} rejected by peer", operation, name),
			},
			FileManagerError::EmptyBatch => write!(f, "Batch operation requires at least one item"),
			FileManagerError::BatchFailed { failed, total } => {
				write!(f, "{} of {} batch operations failed", failed, total)
			}
			FileManagerError::Timeout { operation } => {
				write!(f, "{} timed out waiting for peer reply", operation)
			}
			FileManagerError::Protocol(e) => write!(f, "Protocol error: {}", e),
		}
	}
}

impl Error for FileManagerError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			FileManagerError::SourceUnavailable { source, .. } => Some(source),
			FileManagerError::Protocol(e) => Some(e),
			_ => None,
		}
	}
}

impl From<ProtocolError> for FileManagerError {
	fn from(e: ProtocolError) -> Self {
		FileManagerError::Protocol(e)
	}
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
	/// Config file could not be read
	Io { path: String, source: io::Error },

	/// Config file content is malformed
	Parse { path: String, message: String },

	/// A setting holds a value the manager cannot use
	Invalid { message: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::Io { path, source } => write!(f, "Cannot read config {}: {}", path, source),
			ConfigError::Parse { path, message } => {
				write!(f, "Cannot parse config {}: {}", path, message)
			}
			ConfigError::Invalid { message } => write!(f, "Invalid configuration: {}", message),
		}
	}
}

impl Error for ConfigError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			ConfigError::Io { source, .. } => Some(source),
			_ => None,
		}
	}
}


// vim: ts=4
