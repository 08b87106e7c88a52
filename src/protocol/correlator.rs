//! Request correlation
//!
//! Every outgoing request gets a fresh correlation id and a parked oneshot in
//! the pending table. The reply router takes replies off the inbox and wakes
//! whichever request they belong to, so any number of requests can be in
//! flight and answered in any order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::ProtocolError;
use super::messages::{CorrelationId, Reply, RpcRequest, RpcResponse};
use super::traits::{ProtocolResult, ReplyInbox, RpcTransport};

type PendingTable = HashMap<CorrelationId, oneshot::Sender<RpcResponse>>;

/// Pending-request table in front of a transport
pub struct Correlator {
	transport: Arc<dyn RpcTransport>,
	next_id: AtomicU32,
	pending: Mutex<PendingTable>,
	reply_timeout: Option<Duration>,
	closed: AtomicBool,
}

/// Removes a pending entry when the waiting request goes away for any reason
struct PendingGuard<'a> {
	correlator: &'a Correlator,
	id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
	fn drop(&mut self) {
		self.correlator.pending().remove(&self.id);
	}
}

impl Correlator {
	pub fn new(transport: Arc<dyn RpcTransport>, reply_timeout: Option<Duration>) -> Self {
		Correlator {
			transport,
			next_id: AtomicU32::new(1),
			pending: Mutex::new(HashMap::new()),
			reply_timeout,
			closed: AtomicBool::new(false),
		}
	}

	fn pending(&self) -> MutexGuard<'_, PendingTable> {
		self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Send one request and wait for its reply
	///
	/// Resolves exactly once: with the reply, or with an error if the send
	/// failed, the reply timed out, or the correlator was closed.
	pub async fn request(&self, request: RpcRequest) -> ProtocolResult<RpcResponse> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = oneshot::channel();
		self.pending().insert(id, tx);
		let _guard = PendingGuard { correlator: self, id };
		if self.is_closed() {
			return Err(ProtocolError::Disconnected);
		}

		let kind = request.kind();
		debug!("Sending {} via {} (correlation id {})", kind, self.transport.transport_name(), id);
		self.transport.send(id, request).await?;

		let reply = match self.reply_timeout {
			Some(limit) => match tokio::time::timeout(limit, rx).await {
				Ok(reply) => reply,
				Err(_) => {
					warn!("{} (correlation id {}) timed out after {:?}", kind, id, limit);
					return Err(ProtocolError::Timeout);
				}
			},
			None => rx.await,
		};

		let response = reply.map_err(|_| ProtocolError::Disconnected)?;
		match response.payload.kind() {
			Some(answered) if answered != kind => {
				warn!("{} (correlation id {}) answered with a {} payload", kind, id, answered);
				Err(ProtocolError::UnexpectedResponse(format!(
					"{} answered with a {} payload",
					kind, answered
				)))
			}
			_ => Ok(response),
		}
	}

	/// Hand a reply to the request waiting for it
	pub fn route(&self, reply: Reply) {
		let waiter = self.pending().remove(&reply.correlation_id);
		match waiter {
			Some(tx) => {
				if tx.send(reply.response).is_err() {
					debug!("Request {} gave up before its reply arrived", reply.correlation_id);
				}
			}
			None => {
				debug!("Discarding reply for unknown correlation id {}", reply.correlation_id);
			}
		}
	}

	/// Number of requests still waiting for a reply
	pub fn pending_count(&self) -> usize {
		self.pending().len()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Fail every waiting request, and every later one, with `Disconnected`
	pub fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
		let drained: Vec<_> = self.pending().drain().collect();
		if !drained.is_empty() {
			debug!("Dropping {} pending requests", drained.len());
		}
	}

	/// Spawn the task that feeds replies from `inbox` into this correlator
	///
	/// The task holds only a weak reference and stops once the correlator is
	/// dropped or every reply sink is gone.
	pub fn spawn_router(self: &Arc<Self>, mut inbox: ReplyInbox) -> JoinHandle<()> {
		let weak: Weak<Correlator> = Arc::downgrade(self);
		tokio::spawn(async move {
			while let Some(reply) = inbox.recv().await {
				match weak.upgrade() {
					Some(correlator) => correlator.route(reply),
					None => break,
				}
			}
			if let Some(correlator) = weak.upgrade() {
				debug!("Reply channel closed");
				correlator.close();
			}
		})
	}
}


// vim: ts=4
