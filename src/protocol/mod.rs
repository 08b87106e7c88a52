//! Protocol abstraction layer
//!
//! The file manager talks to the peer only through `RpcTransport` and the
//! reply channel. The correlator matches replies to requests; `MemoryPeer`
//! is an in-process peer for tests and embedding.
//!
//! # Example Usage
//!
//! ```ignore
//! use peerfiles::protocol::MemoryPeer;
//! use peerfiles::FileManager;
//!
//! let (peer, replies) = MemoryPeer::connect();
//! let manager = FileManager::with_defaults(peer.clone(), replies);
//! manager.wait_until_settled().await;
//! ```

pub mod correlator;
pub mod error;
pub mod memory;
pub mod messages;
pub mod traits;

// Re-export public API
pub use correlator::Correlator;
pub use error::ProtocolError;
pub use memory::{HeldReply, MemoryPeer, StoredFile};
pub use messages::{CorrelationId, Reply, RequestKind, ResponsePayload, RpcRequest, RpcResponse};
pub use traits::{reply_channel, ProtocolResult, ReplyInbox, ReplySink, RpcTransport};

// vim: ts=4
