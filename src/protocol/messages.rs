//! Request and response shapes exchanged with the peer
//!
//! These are the logical messages only; how a transport encodes them on the
//! wire is its own business.

use std::fmt;

use crate::types::FileType;

/// Transport-assigned token linking a request to its single reply
pub type CorrelationId = u32;

/// Requests the file manager issues
#[derive(Debug, Clone, PartialEq)]
pub enum RpcRequest {
	/// Ask for the names of all stored files and the free space estimate
	ListFiles,

	/// Store a file under `name`, replacing any previous file of that name
	PutFile { name: String, file_type: FileType, persistent: bool, data: Vec<u8> },

	/// Remove the file stored under `name`
	DeleteFile { name: String },
}

impl RpcRequest {
	pub fn kind(&self) -> RequestKind {
		match self {
			RpcRequest::ListFiles => RequestKind::ListFiles,
			RpcRequest::PutFile { .. } => RequestKind::PutFile,
			RpcRequest::DeleteFile { .. } => RequestKind::DeleteFile,
		}
	}

	/// Remote file name the request targets, if any
	pub fn file_name(&self) -> Option<&str> {
		match self {
			RpcRequest::ListFiles => None,
			RpcRequest::PutFile { name, .. } | RpcRequest::DeleteFile { name } => Some(name),
		}
	}
}

/// Request discriminant, used in logs and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
	ListFiles,
	PutFile,
	DeleteFile,
}

impl fmt::Display for RequestKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RequestKind::ListFiles => write!(f, "ListFiles"),
			RequestKind::PutFile => write!(f, "PutFile"),
			RequestKind::DeleteFile => write!(f, "DeleteFile"),
		}
	}
}

/// Kind-specific part of a reply
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
	/// Nothing beyond the success flag (typical for failures)
	Empty,
	ListFiles { filenames: Vec<String>, space_available: Option<u64> },
	PutFile { space_available: Option<u64> },
	DeleteFile { space_available: Option<u64> },
}

impl ResponsePayload {
	/// Request kind this payload answers; `None` for `Empty`
	pub fn kind(&self) -> Option<RequestKind> {
		match self {
			ResponsePayload::Empty => None,
			ResponsePayload::ListFiles { .. } => Some(RequestKind::ListFiles),
			ResponsePayload::PutFile { .. } => Some(RequestKind::PutFile),
			ResponsePayload::DeleteFile { .. } => Some(RequestKind::DeleteFile),
		}
	}
}

/// Peer reply to one request
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
	pub success: bool,
	/// Free-form diagnostic from the peer
	pub info: Option<String>,
	pub payload: ResponsePayload,
}

impl RpcResponse {
	pub fn success(payload: ResponsePayload) -> Self {
		RpcResponse { success: true, info: None, payload }
	}

	pub fn failure<S: Into<String>>(info: S) -> Self {
		RpcResponse { success: false, info: Some(info.into()), payload: ResponsePayload::Empty }
	}

	/// Free space reported alongside the reply, whatever its kind
	pub fn space_available(&self) -> Option<u64> {
		match &self.payload {
			ResponsePayload::Empty => None,
			ResponsePayload::ListFiles { space_available, .. }
			| ResponsePayload::PutFile { space_available }
			| ResponsePayload::DeleteFile { space_available } => *space_available,
		}
	}
}

/// A reply as it comes back from the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
	pub correlation_id: CorrelationId,
	pub response: RpcResponse,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_request_kind_and_name() {
		let put = RpcRequest::PutFile {
			name: "icon.png".to_string(),
			file_type: FileType::GraphicPng,
			persistent: false,
			data: vec![1],
		};
		assert_eq!(put.kind(), RequestKind::PutFile);
		assert_eq!(put.file_name(), Some("icon.png"));
		assert_eq!(RpcRequest::ListFiles.file_name(), None);
		assert_eq!(RequestKind::DeleteFile.to_string(), "DeleteFile");
	}

	#[test]
	fn test_space_available_from_any_payload() {
		let list = RpcResponse::success(ResponsePayload::ListFiles {
			filenames: vec![],
			space_available: Some(10),
		});
		assert_eq!(list.space_available(), Some(10));
		let put = RpcResponse::success(ResponsePayload::PutFile { space_available: Some(3) });
		assert_eq!(put.space_available(), Some(3));
		let failed = RpcResponse::failure("REJECTED");
		assert!(!failed.success);
		assert_eq!(failed.space_available(), None);
		assert_eq!(failed.info.as_deref(), Some("REJECTED"));
	}
}

// vim: ts=4
