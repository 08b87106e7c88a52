//! Transport boundary
//!
//! A transport hands requests to the peer and pushes each reply back through
//! the `ReplySink` it was built with. It never interprets replies; matching a
//! reply to its request is the correlator's job.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::ProtocolError;
use super::messages::{CorrelationId, Reply, RpcRequest, RpcResponse};

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Request/response channel to the peer
///
/// Implementations must deliver at most one reply per correlation id, in any
/// order, from any task or thread.
#[async_trait]
pub trait RpcTransport: Send + Sync {
	/// Short name for logs
	fn transport_name(&self) -> &str;

	/// Hand `request` to the peer; its reply must later carry `correlation_id`
	async fn send(&self, correlation_id: CorrelationId, request: RpcRequest) -> ProtocolResult<()>;
}

/// Create the channel replies travel on, transport side and manager side
pub fn reply_channel() -> (ReplySink, ReplyInbox) {
	let (tx, rx) = mpsc::unbounded_channel();
	(ReplySink { tx }, ReplyInbox { rx })
}

/// Transport-side handle for pushing replies
#[derive(Debug, Clone)]
pub struct ReplySink {
	tx: mpsc::UnboundedSender<Reply>,
}

impl ReplySink {
	/// Push a reply; fails only once the receiving manager is gone
	pub fn deliver(&self, correlation_id: CorrelationId, response: RpcResponse) -> ProtocolResult<()> {
		self.tx.send(Reply { correlation_id, response }).map_err(|_| ProtocolError::Disconnected)
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

/// Manager-side end of the reply channel
#[derive(Debug)]
pub struct ReplyInbox {
	rx: mpsc::UnboundedReceiver<Reply>,
}

impl ReplyInbox {
	/// Next reply, or `None` once every sink is dropped
	pub async fn recv(&mut self) -> Option<Reply> {
		self.rx.recv().await
	}
}


// vim: ts=4
