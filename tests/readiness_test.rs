//! Readiness state machine tests
//!
//! Drives a FileManager against an in-process peer and checks how the initial
//! listing gates synchronous queries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use peerfiles::protocol::{
	reply_channel, CorrelationId, MemoryPeer, ProtocolResult, ReplySink, ResponsePayload, RpcRequest,
	RpcResponse, RpcTransport,
};
use peerfiles::{
	completion, FileDescriptor, FileManager, FileManagerError, FileType, Listener, ListenerBuilder,
	ManagerState, NoResources,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn recorder() -> (Option<Listener>, mpsc::UnboundedReceiver<bool>) {
	let (tx, rx) = mpsc::unbounded_channel();
	let listener = completion(move |ok| {
		let _ = tx.send(ok);
	});
	(listener, rx)
}

async fn outcome(rx: &mut mpsc::UnboundedReceiver<bool>) -> bool {
	tokio::time::timeout(Duration::from_secs(5), rx.recv())
		.await
		.expect("listener was never called")
		.expect("listener dropped without an outcome")
}

fn seeded_peer(names: &[&str]) -> (Arc<MemoryPeer>, peerfiles::protocol::ReplyInbox) {
	let (peer, inbox) = MemoryPeer::connect();
	for name in names {
		peer.seed(*name, FileType::Binary, vec![0u8; 10]);
	}
	(peer, inbox)
}

/// Peer that answers every request with an upload confirmation
struct PutOnlyPeer {
	sink: ReplySink,
}

#[async_trait]
impl RpcTransport for PutOnlyPeer {
	fn transport_name(&self) -> &str {
		"put-only"
	}

	async fn send(&self, correlation_id: CorrelationId, _request: RpcRequest) -> ProtocolResult<()> {
		let response = RpcResponse::success(ResponsePayload::PutFile { space_available: Some(1) });
		self.sink.deliver(correlation_id, response)
	}
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_listing_unavailable_until_first_reply() {
	peerfiles::logging::try_init_tracing();
	let (peer, inbox) = seeded_peer(&["a.png", "b.png"]);
	peer.hold_replies(true);

	let manager = FileManager::with_defaults(peer.clone(), inbox);
	peer.wait_for_held(1).await;

	assert_eq!(manager.current_state(), ManagerState::Uninitialized);
	assert!(manager.remote_file_names().is_none());
	assert!(manager.bytes_available().is_none());
	assert!(manager.has_remote_file("a.png").is_none());
	match manager.try_remote_file_names() {
		Err(FileManagerError::NotReady { state }) => assert_eq!(state, ManagerState::Uninitialized),
		other => panic!("expected NotReady, got {:?}", other),
	}

	peer.hold_replies(false);
	peer.release_all();
	assert_eq!(manager.wait_until_settled().await, ManagerState::Ready);

	let names = manager.remote_file_names().expect("ready manager has a listing");
	assert_eq!(names.len(), 2);
	assert!(names.contains("a.png"));
	assert_eq!(manager.has_remote_file("b.png"), Some(true));
	assert_eq!(manager.has_remote_file("c.png"), Some(false));
}

#[tokio::test]
async fn test_bootstrap_issues_exactly_one_listing() {
	let (peer, inbox) = seeded_peer(&[]);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	assert_eq!(manager.wait_until_settled().await, ManagerState::Ready);
	tokio::time::sleep(Duration::from_millis(20)).await;

	assert_eq!(peer.request_count(), 1);
	assert_eq!(manager.remote_file_names().unwrap().len(), 0);
	assert_eq!(manager.pending_requests(), 0);
}

#[tokio::test]
async fn test_state_subscription_sees_transition() {
	let (peer, inbox) = seeded_peer(&["a.png"]);
	peer.hold_replies(true);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	let mut states = manager.subscribe_state();
	assert_eq!(*states.borrow(), ManagerState::Uninitialized);

	peer.wait_for_held(1).await;
	peer.release_all();
	states.changed().await.unwrap();
	assert_eq!(*states.borrow(), ManagerState::Ready);
}

#[tokio::test]
async fn test_space_available_from_listing() {
	let (peer, inbox) = MemoryPeer::connect();
	peer.set_capacity(1000);
	peer.seed("a.bin", FileType::Binary, vec![0u8; 100]);

	let manager = FileManager::with_defaults(peer.clone(), inbox);
	manager.wait_until_settled().await;
	assert_eq!(manager.bytes_available(), Some(900));
}

// ============================================================================
// Error state
// ============================================================================

#[tokio::test]
async fn test_failed_listing_moves_to_error() {
	let (peer, inbox) = seeded_peer(&["a.png"]);
	peer.refuse_listing(true);

	let manager = FileManager::with_defaults(peer.clone(), inbox);
	assert_eq!(manager.wait_until_settled().await, ManagerState::Error);
	assert!(manager.remote_file_names().is_none());
	match manager.try_remote_file_names() {
		Err(FileManagerError::NotReady { state }) => assert_eq!(state, ManagerState::Error),
		other => panic!("expected NotReady, got {:?}", other),
	}

	// No automatic retry, even once the peer would answer
	peer.refuse_listing(false);
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(peer.request_count(), 1);
	assert_eq!(manager.current_state(), ManagerState::Error);
}

#[tokio::test]
async fn test_listing_reply_of_wrong_kind_moves_to_error() {
	let (sink, inbox) = reply_channel();
	let peer = Arc::new(PutOnlyPeer { sink });
	let manager = FileManager::with_defaults(peer, inbox);

	assert_eq!(manager.wait_until_settled().await, ManagerState::Error);
	assert!(manager.remote_file_names().is_none());
	assert!(manager.bytes_available().is_none());
}

#[tokio::test]
async fn test_disconnected_transport_moves_to_error() {
	let (peer, inbox) = seeded_peer(&[]);
	peer.set_disconnected(true);

	let manager = FileManager::with_defaults(peer.clone(), inbox);
	assert_eq!(manager.wait_until_settled().await, ManagerState::Error);
	assert_eq!(peer.request_count(), 0);
}

#[tokio::test]
async fn test_errored_manager_refuses_refresh() {
	let (peer, inbox) = seeded_peer(&[]);
	peer.refuse_listing(true);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	manager.wait_until_settled().await;
	peer.refuse_listing(false);

	let (tx, mut rx) = mpsc::unbounded_channel();
	let errors = tx.clone();
	let listener = ListenerBuilder::new()
		.on_error(move |e| {
			let _ = errors.send(format!("error:{}", e));
		})
		.on_complete(move |ok| {
			let _ = tx.send(format!("complete:{}", ok));
		})
		.build();
	manager.refresh_remote_files(Some(listener));

	assert!(rx.recv().await.unwrap().starts_with("error:File manager is not ready"));
	assert_eq!(rx.recv().await.unwrap(), "complete:false");
	assert_eq!(peer.request_count(), 1);
	assert_eq!(manager.current_state(), ManagerState::Error);
}

#[tokio::test]
async fn test_errored_manager_still_uploads() {
	let (peer, inbox) = seeded_peer(&[]);
	peer.refuse_listing(true);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	manager.wait_until_settled().await;

	let (listener, mut rx) = recorder();
	let file = FileDescriptor::new("icon.png").with_data(vec![1, 2, 3]);
	manager.upload_file(&file, &NoResources, listener);

	assert!(outcome(&mut rx).await);
	assert!(peer.stored("icon.png").is_some());
	assert!(manager.remote_file_names().is_none());
}

// ============================================================================
// Changes confirmed before the listing
// ============================================================================

#[tokio::test]
async fn test_upload_confirmed_before_listing_reaches_cache() {
	let (peer, inbox) = seeded_peer(&["a.png"]);
	peer.hold_replies(true);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	peer.wait_for_held(1).await;

	let (listener, mut rx) = recorder();
	let file = FileDescriptor::new("icon.png").with_data(vec![1, 2, 3]);
	manager.upload_file(&file, &NoResources, listener);
	peer.wait_for_held(2).await;

	// Upload reply first, then the listing taken before the upload
	assert_eq!(peer.release_reversed(), 2);
	assert!(outcome(&mut rx).await);
	assert_eq!(manager.wait_until_settled().await, ManagerState::Ready);

	assert!(peer.stored("icon.png").is_some());
	assert_eq!(manager.has_remote_file("icon.png"), Some(true));
	assert_eq!(manager.has_remote_file("a.png"), Some(true));
}

#[tokio::test]
async fn test_delete_confirmed_before_listing_reaches_cache() {
	let (peer, inbox) = seeded_peer(&["a.png", "b.png"]);
	peer.hold_replies(true);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	peer.wait_for_held(1).await;

	let (listener, mut rx) = recorder();
	manager.delete_file("a.png", listener);
	peer.wait_for_held(2).await;

	assert_eq!(peer.release_reversed(), 2);
	assert!(outcome(&mut rx).await);
	assert_eq!(manager.wait_until_settled().await, ManagerState::Ready);

	let names = manager.remote_file_names().unwrap();
	assert!(!names.contains("a.png"));
	assert!(names.contains("b.png"));
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_replaces_listing() {
	let (peer, inbox) = seeded_peer(&["a.png"]);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	manager.wait_until_settled().await;

	peer.seed("b.png", FileType::GraphicPng, vec![1]);
	assert_eq!(manager.has_remote_file("b.png"), Some(false));

	let (listener, mut rx) = recorder();
	manager.refresh_remote_files(listener);
	assert!(outcome(&mut rx).await);
	assert_eq!(manager.has_remote_file("b.png"), Some(true));
	assert_eq!(peer.request_count(), 2);
}

#[tokio::test]
async fn test_failed_refresh_keeps_manager_ready() {
	let (peer, inbox) = seeded_peer(&["a.png"]);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	manager.wait_until_settled().await;

	peer.refuse_listing(true);
	let (listener, mut rx) = recorder();
	manager.refresh_remote_files(listener);

	assert!(!outcome(&mut rx).await);
	assert_eq!(manager.current_state(), ManagerState::Ready);
	assert_eq!(manager.has_remote_file("a.png"), Some(true));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_dispose_fails_outstanding_operations() {
	let (peer, inbox) = seeded_peer(&["a.png"]);
	let manager = FileManager::with_defaults(peer.clone(), inbox);
	manager.wait_until_settled().await;

	peer.hold_replies(true);
	let (listener, mut rx) = recorder();
	manager.delete_file("a.png", listener);
	peer.wait_for_held(1).await;

	manager.dispose();
	assert!(!outcome(&mut rx).await);
	assert_eq!(manager.has_remote_file("a.png"), Some(true));

	let (listener, mut rx) = recorder();
	manager.delete_file("a.png", listener);
	assert!(!outcome(&mut rx).await);
	assert_eq!(peer.request_count(), 2);
}

// vim: ts=4
