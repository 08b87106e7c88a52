//! In-process peer
//!
//! `MemoryPeer` keeps a file repository in memory and answers requests
//! through a reply sink, the way a remote device would over a real session.
//! It can refuse specific operations, drop off the session, or hold replies
//! back so callers can release them in whatever order they like.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use super::error::ProtocolError;
use super::messages::{CorrelationId, ResponsePayload, RpcRequest, RpcResponse};
use super::traits::{reply_channel, ProtocolResult, ReplyInbox, ReplySink, RpcTransport};
use crate::types::FileType;

/// Default storage capacity of a fresh peer (bytes)
pub const DEFAULT_CAPACITY: u64 = 100 * 1024 * 1024;

/// A file as the peer stores it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
	pub file_type: FileType,
	pub persistent: bool,
	pub data: Vec<u8>,
}

/// A reply the peer has produced but not yet sent
#[derive(Debug, Clone)]
pub struct HeldReply {
	pub correlation_id: CorrelationId,
	pub request: RpcRequest,
	pub response: RpcResponse,
}

#[derive(Debug, Default)]
struct PeerState {
	files: BTreeMap<String, StoredFile>,
	capacity: u64,
	refuse_listing: bool,
	rejected_puts: BTreeSet<String>,
	rejected_deletes: BTreeSet<String>,
	disconnected: bool,
	holding: bool,
	held: Vec<HeldReply>,
	requests: Vec<RpcRequest>,
}

impl PeerState {
	fn used(&self) -> u64 {
		self.files.values().map(|f| f.data.len() as u64).sum()
	}

	fn space_available(&self) -> u64 {
		self.capacity.saturating_sub(self.used())
	}

	fn handle(&mut self, request: &RpcRequest) -> RpcResponse {
		match request {
			RpcRequest::ListFiles => {
				if self.refuse_listing {
					return RpcResponse::failure("GENERIC_ERROR");
				}
				RpcResponse::success(ResponsePayload::ListFiles {
					filenames: self.files.keys().cloned().collect(),
					space_available: Some(self.space_available()),
				})
			}
			RpcRequest::PutFile { name, file_type, persistent, data } => {
				if self.rejected_puts.contains(name) {
					return RpcResponse::failure("REJECTED");
				}
				let replaced = self.files.get(name).map(|f| f.data.len() as u64).unwrap_or(0);
				if data.len() as u64 > self.space_available() + replaced {
					return RpcResponse::failure("OUT_OF_MEMORY");
				}
				self.files.insert(
					name.clone(),
					StoredFile { file_type: *file_type, persistent: *persistent, data: data.clone() },
				);
				RpcResponse::success(ResponsePayload::PutFile {
					space_available: Some(self.space_available()),
				})
			}
			RpcRequest::DeleteFile { name } => {
				if self.rejected_deletes.contains(name) {
					return RpcResponse::failure("REJECTED");
				}
				if self.files.remove(name).is_none() {
					return RpcResponse::failure("INVALID_DATA: no such file");
				}
				RpcResponse::success(ResponsePayload::DeleteFile {
					space_available: Some(self.space_available()),
				})
			}
		}
	}
}

/// In-memory file repository speaking the request/reply protocol
pub struct MemoryPeer {
	sink: ReplySink,
	state: Mutex<PeerState>,
	held_changed: Notify,
}

impl MemoryPeer {
	/// Create a peer that answers through `sink`
	pub fn new(sink: ReplySink) -> Self {
		MemoryPeer {
			sink,
			state: Mutex::new(PeerState { capacity: DEFAULT_CAPACITY, ..Default::default() }),
			held_changed: Notify::new(),
		}
	}

	/// Create a peer together with the inbox a file manager reads replies from
	pub fn connect() -> (Arc<MemoryPeer>, ReplyInbox) {
		let (sink, inbox) = reply_channel();
		(Arc::new(MemoryPeer::new(sink)), inbox)
	}

	fn state(&self) -> MutexGuard<'_, PeerState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	// === Repository ===

	/// Place a file on the peer without going through the protocol
	pub fn seed<S: Into<String>>(&self, name: S, file_type: FileType, data: Vec<u8>) {
		self.state().files.insert(name.into(), StoredFile { file_type, persistent: false, data });
	}

	pub fn set_capacity(&self, capacity: u64) {
		self.state().capacity = capacity;
	}

	pub fn file_names(&self) -> BTreeSet<String> {
		self.state().files.keys().cloned().collect()
	}

	pub fn stored(&self, name: &str) -> Option<StoredFile> {
		self.state().files.get(name).cloned()
	}

	pub fn space_available(&self) -> u64 {
		self.state().space_available()
	}

	// === Failure injection ===

	/// Answer every ListFiles with failure
	pub fn refuse_listing(&self, refuse: bool) {
		self.state().refuse_listing = refuse;
	}

	/// Answer PutFile for `name` with failure
	pub fn reject_put<S: Into<String>>(&self, name: S) {
		self.state().rejected_puts.insert(name.into());
	}

	/// Answer DeleteFile for `name` with failure
	pub fn reject_delete<S: Into<String>>(&self, name: S) {
		self.state().rejected_deletes.insert(name.into());
	}

	/// Refuse to accept requests at all
	pub fn set_disconnected(&self, disconnected: bool) {
		self.state().disconnected = disconnected;
	}

	// === Reply ordering ===

	/// Queue replies instead of sending them immediately
	pub fn hold_replies(&self, hold: bool) {
		self.state().holding = hold;
	}

	pub fn held_count(&self) -> usize {
		self.state().held.len()
	}

	/// Wait until at least `count` replies are being held
	pub async fn wait_for_held(&self, count: usize) {
		loop {
			let notified = self.held_changed.notified();
			if self.held_count() >= count {
				return;
			}
			notified.await;
		}
	}

	/// Send held replies chosen and ordered by `order`; the rest stay held
	pub fn release_with<F>(&self, order: F) -> usize
	where
		F: FnOnce(Vec<HeldReply>) -> (Vec<HeldReply>, Vec<HeldReply>),
	{
		let to_send = {
			let mut state = self.state();
			let held = std::mem::take(&mut state.held);
			let (to_send, keep) = order(held);
			state.held = keep;
			to_send
		};
		let count = to_send.len();
		for held in to_send {
			if let Err(e) = self.sink.deliver(held.correlation_id, held.response) {
				debug!("Dropping held reply {}: {}", held.correlation_id, e);
			}
		}
		count
	}

	/// Send every held reply in arrival order
	pub fn release_all(&self) -> usize {
		self.release_with(|held| (held, Vec::new()))
	}

	/// Send every held reply, newest first
	pub fn release_reversed(&self) -> usize {
		self.release_with(|mut held| {
			held.reverse();
			(held, Vec::new())
		})
	}

	/// Send held replies to requests for `name`, keep the rest
	pub fn release_for(&self, name: &str) -> usize {
		self.release_with(|held| held.into_iter().partition(|h| h.request.file_name() == Some(name)))
	}

	// === Inspection ===

	/// Every request received so far, in arrival order
	pub fn requests(&self) -> Vec<RpcRequest> {
		self.state().requests.clone()
	}

	pub fn request_count(&self) -> usize {
		self.state().requests.len()
	}
}

#[async_trait]
impl RpcTransport for MemoryPeer {
	fn transport_name(&self) -> &str {
		"memory"
	}

	async fn send(&self, correlation_id: CorrelationId, request: RpcRequest) -> ProtocolResult<()> {
		let immediate = {
			let mut state = self.state();
			if state.disconnected {
				return Err(ProtocolError::Disconnected);
			}
			state.requests.push(request.clone());
			let response = state.handle(&request);
			if state.holding {
				state.held.push(HeldReply { correlation_id, request, response });
				None
			} else {
				Some(response)
			}
		};

		match immediate {
			Some(response) => self.sink.deliver(correlation_id, response),
			None => {
				self.held_changed.notify_waiters();
				Ok(())
			}
		}
	}
}


// vim: ts=4
