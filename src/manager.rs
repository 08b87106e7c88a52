//! Remote file manager
//!
//! Keeps track of which files exist on the peer, uploads and deletes files
//! one at a time or in batches, and answers listing queries synchronously once
//! the initial listing has arrived.
//!
//! Construction immediately requests the listing. Until that reply is
//! processed the manager is `Uninitialized` and `remote_file_names()` yields
//! `None`; afterwards it is `Ready` (or `Error` if the listing failed, with no
//! automatic retry). Successful uploads and deletes adjust the cached listing
//! directly, so it never needs a full re-fetch to stay consistent.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::callbacks::{deliver, Listener};
use crate::config::ManagerConfig;
use crate::error::FileManagerError;
use crate::protocol::{
	Correlator, ProtocolError, ReplyInbox, RequestKind, ResponsePayload, RpcRequest, RpcResponse,
	RpcTransport,
};
use crate::source::{self, ResourceProvider};
use crate::types::{FileDescriptor, FileType, ManagerState, RemoteListing};

/// A confirmed upload or delete, as it changes the listing
#[derive(Debug, Clone, PartialEq)]
enum ListingChange {
	Inserted { name: String, space: Option<u64> },
	Removed { name: String, space: Option<u64> },
}

impl ListingChange {
	fn apply_to(&self, listing: &mut RemoteListing) {
		match self {
			ListingChange::Inserted { name, space } => {
				listing.insert(name);
				listing.update_space(*space);
			}
			ListingChange::Removed { name, space } => {
				listing.remove(name);
				listing.update_space(*space);
			}
		}
	}
}

/// Readiness together with the listing it guards
///
/// The listing only exists in `Ready`, so nothing can read or mutate it
/// before the initial fetch succeeded. Changes confirmed before that are
/// kept in `early` and replayed onto the first listing.
#[derive(Debug)]
enum Readiness {
	Uninitialized { early: Vec<ListingChange> },
	Ready(RemoteListing),
	Error { reason: String },
}

impl Readiness {
	fn new() -> Self {
		Readiness::Uninitialized { early: Vec::new() }
	}

	fn state(&self) -> ManagerState {
		match self {
			Readiness::Uninitialized { .. } => ManagerState::Uninitialized,
			Readiness::Ready(_) => ManagerState::Ready,
			Readiness::Error { .. } => ManagerState::Error,
		}
	}

	fn listing(&self) -> Option<&RemoteListing> {
		match self {
			Readiness::Ready(listing) => Some(listing),
			_ => None,
		}
	}

	fn listing_mut(&mut self) -> Option<&mut RemoteListing> {
		match self {
			Readiness::Ready(listing) => Some(listing),
			_ => None,
		}
	}

	/// Apply a confirmed change, or hold it until the first listing arrives
	fn record(&mut self, change: ListingChange) {
		match self {
			Readiness::Ready(listing) => change.apply_to(listing),
			Readiness::Uninitialized { early } => early.push(change),
			Readiness::Error { .. } => debug!("No listing to update, dropping {:?}", change),
		}
	}

	/// Record the outcome of the first listing; returns false if already settled
	fn settle(&mut self, outcome: Result<RemoteListing, String>) -> bool {
		let early = match self {
			Readiness::Uninitialized { early } => std::mem::take(early),
			_ => return false,
		};
		*self = match outcome {
			Ok(mut listing) => {
				if !early.is_empty() {
					debug!("Replaying {} changes confirmed before the listing", early.len());
				}
				for change in &early {
					change.apply_to(&mut listing);
				}
				Readiness::Ready(listing)
			}
			Err(reason) => Readiness::Error { reason },
		};
		true
	}
}

/// Upload that passed local validation
struct PreparedUpload {
	name: String,
	request: RpcRequest,
}

/// State shared between the manager handle and its in-flight operations
struct Shared {
	correlator: Arc<Correlator>,
	readiness: Mutex<Readiness>,
	state_tx: watch::Sender<ManagerState>,
	config: ManagerConfig,
}

fn request_error(operation: RequestKind, e: ProtocolError) -> FileManagerError {
	match e {
		ProtocolError::Timeout => FileManagerError::Timeout { operation },
		other => FileManagerError::Protocol(other),
	}
}

impl Shared {
	fn readiness(&self) -> MutexGuard<'_, Readiness> {
		self.readiness.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn apply(&self, change: ListingChange) {
		self.readiness().record(change);
	}

	async fn fetch_listing(&self) -> Result<RemoteListing, FileManagerError> {
		let response = self
			.correlator
			.request(RpcRequest::ListFiles)
			.await
			.map_err(|e| FileManagerError::ListingFailed { message: e.to_string() })?;

		if !response.success {
			return Err(FileManagerError::ListingFailed {
				message: response.info.unwrap_or_else(|| "peer reported failure".to_string()),
			});
		}

		match response.payload {
			ResponsePayload::ListFiles { filenames, space_available } => {
				Ok(RemoteListing::new(filenames, space_available))
			}
			_ => {
				let e = ProtocolError::UnexpectedResponse("ListFiles answered without a listing".to_string());
				Err(FileManagerError::ListingFailed { message: e.to_string() })
			}
		}
	}

	/// Fire-once initial listing
	async fn bootstrap(&self) {
		let outcome = self.fetch_listing().await;
		let mut readiness = self.readiness();
		let settled = match outcome {
			Ok(listing) => {
				info!(
					"Remote listing: {} files, {:?} bytes available",
					listing.names().len(),
					listing.bytes_available()
				);
				readiness.settle(Ok(listing))
			}
			Err(e) => {
				error!("Failed to request list of uploaded files: {}", e);
				readiness.settle(Err(e.to_string()))
			}
		};
		if settled {
			let state = readiness.state();
			info!("File manager is now {}", state);
			self.state_tx.send_replace(state);
		}
	}

	async fn refresh(&self) -> Result<(), FileManagerError> {
		let fresh = self.fetch_listing().await?;
		let mut readiness = self.readiness();
		if let Some(listing) = readiness.listing_mut() {
			debug!("Refreshed remote listing: {} files", fresh.names().len());
			listing.replace(fresh);
			return Ok(());
		}

		if readiness.settle(Ok(fresh)) {
			info!("File manager is now {}", ManagerState::Ready);
			self.state_tx.send_replace(ManagerState::Ready);
			return Ok(());
		}

		if let Readiness::Error { reason } = &*readiness {
			debug!("Ignoring refreshed listing, initial listing failed: {}", reason);
		}
		Err(FileManagerError::NotReady { state: readiness.state() })
	}

	async fn delete(&self, name: String) -> Result<(), FileManagerError> {
		let response = self
			.correlator
			.request(RpcRequest::DeleteFile { name: name.clone() })
			.await
			.map_err(|e| request_error(RequestKind::DeleteFile, e))?;

		if !response.success {
			error!("Unable to delete file named {}: {:?}", name, response.info);
			return Err(FileManagerError::PeerRejected {
				operation: RequestKind::DeleteFile,
				name,
				info: response.info,
			});
		}

		info!("File named {} deleted", name);
		self.apply(ListingChange::Removed { space: response.space_available(), name });
		Ok(())
	}

	async fn put(&self, upload: PreparedUpload) -> Result<(), FileManagerError> {
		let PreparedUpload { name, request } = upload;
		let response: RpcResponse = self
			.correlator
			.request(request)
			.await
			.map_err(|e| request_error(RequestKind::PutFile, e))?;

		if !response.success {
			error!("Unsuccessful upload of {}: {:?}", name, response.info);
			return Err(FileManagerError::PeerRejected {
				operation: RequestKind::PutFile,
				name,
				info: response.info,
			});
		}

		info!("File named {} uploaded", name);
		self.apply(ListingChange::Inserted { space: response.space_available(), name });
		Ok(())
	}

	/// Resolve bytes and required fields without touching the peer
	fn prepare_upload(
		&self,
		file: &FileDescriptor,
		resources: &dyn ResourceProvider,
	) -> Result<PreparedUpload, FileManagerError> {
		let data = source::resolve(file, resources, self.config.read_chunk_size)?;

		let name = match file.name().filter(|n| !n.is_empty()) {
			Some(name) => name.to_string(),
			None => {
				warn!("Refusing upload without a file name");
				return Err(FileManagerError::MissingRequiredField { field: "name" });
			}
		};

		let file_type = file.file_type().or_else(|| {
			if self.config.infer_file_type {
				FileType::from_name(&name)
			} else {
				None
			}
		});
		let file_type = match file_type {
			Some(file_type) => file_type,
			None => {
				warn!("Refusing upload of {}: file type unknown", name);
				return Err(FileManagerError::MissingRequiredField { field: "file_type" });
			}
		};

		let persistent = file.is_persistent().unwrap_or(self.config.default_persistent);
		debug!("Prepared {} ({}, {} bytes, persistent: {})", name, file_type, data.len(), persistent);
		Ok(PreparedUpload {
			name: name.clone(),
			request: RpcRequest::PutFile { name, file_type, persistent, data },
		})
	}

	/// Run independent operations and fold their outcomes into one
	async fn run_batch<F>(&self, operations: Vec<F>) -> Result<(), FileManagerError>
	where
		F: Future<Output = Result<(), FileManagerError>>,
	{
		let total = operations.len();
		let limit = match self.config.max_concurrent_requests {
			0 => total.max(1),
			n => n,
		};

		let outcomes: Vec<Result<(), FileManagerError>> =
			stream::iter(operations).buffer_unordered(limit).collect().await;

		let failures: Vec<FileManagerError> = outcomes.into_iter().filter_map(Result::err).collect();
		if failures.is_empty() {
			info!("Batch of {} operations succeeded", total);
			return Ok(());
		}
		for failure in &failures {
			warn!("Batch element failed: {}", failure);
		}
		Err(FileManagerError::BatchFailed { failed: failures.len(), total })
	}
}

/// Client-side manager of the peer's file repository
///
/// Must be created inside a tokio runtime. Every operation returns right after
/// dispatch; outcomes arrive through the optional listener, exactly once per
/// call. Batch calls report once for the whole batch.
pub struct FileManager {
	shared: Arc<Shared>,
	router: JoinHandle<()>,
}

impl FileManager {
	/// Start a manager on `transport`, whose replies arrive on `replies`
	///
	/// The initial listing request is issued right away.
	pub fn new(transport: Arc<dyn RpcTransport>, replies: ReplyInbox, config: ManagerConfig) -> Self {
		let correlator = Arc::new(Correlator::new(transport, config.reply_timeout()));
		let router = correlator.spawn_router(replies);
		let (state_tx, _) = watch::channel(ManagerState::Uninitialized);
		let shared = Arc::new(Shared {
			correlator,
			readiness: Mutex::new(Readiness::new()),
			state_tx,
			config,
		});

		let bootstrap = shared.clone();
		tokio::spawn(async move { bootstrap.bootstrap().await });

		FileManager { shared, router }
	}

	/// Start a manager with the default configuration
	pub fn with_defaults(transport: Arc<dyn RpcTransport>, replies: ReplyInbox) -> Self {
		FileManager::new(transport, replies, ManagerConfig::default())
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.shared.config
	}

	// === Readiness ===

	pub fn current_state(&self) -> ManagerState {
		self.shared.readiness().state()
	}

	/// Watch state transitions
	pub fn subscribe_state(&self) -> watch::Receiver<ManagerState> {
		self.shared.state_tx.subscribe()
	}

	/// Wait until the initial listing has been answered, either way
	pub async fn wait_until_settled(&self) -> ManagerState {
		let mut rx = self.subscribe_state();
		loop {
			let state = *rx.borrow_and_update();
			if state != ManagerState::Uninitialized {
				return state;
			}
			if rx.changed().await.is_err() {
				return self.current_state();
			}
		}
	}

	// === Getters ===

	/// Names of the files on the peer, or `None` until the manager is ready
	pub fn remote_file_names(&self) -> Option<BTreeSet<String>> {
		self.try_remote_file_names().ok()
	}

	/// Like `remote_file_names`, with the reason when unavailable
	pub fn try_remote_file_names(&self) -> Result<BTreeSet<String>, FileManagerError> {
		let readiness = self.shared.readiness();
		match readiness.listing() {
			Some(listing) => Ok(listing.names().clone()),
			None => Err(FileManagerError::NotReady { state: readiness.state() }),
		}
	}

	/// Free space the peer last reported
	pub fn bytes_available(&self) -> Option<u64> {
		self.shared.readiness().listing().and_then(RemoteListing::bytes_available)
	}

	pub fn has_remote_file(&self, name: &str) -> Option<bool> {
		self.shared.readiness().listing().map(|listing| listing.contains(name))
	}

	/// Requests dispatched and still waiting for a reply
	pub fn pending_requests(&self) -> usize {
		self.shared.correlator.pending_count()
	}

	// === Listing ===

	/// Fetch the listing again and replace the cached one wholesale
	///
	/// A failed refresh reports false but leaves a ready manager ready. An
	/// errored manager stays errored and sends nothing.
	pub fn refresh_remote_files(&self, listener: Option<Listener>) {
		let state = self.current_state();
		if state == ManagerState::Error {
			warn!("Refusing to refresh listing of an errored file manager");
			deliver(listener.as_deref(), Err(FileManagerError::NotReady { state }));
			return;
		}
		self.spawn_operation(listener, |shared| async move { shared.refresh().await });
	}

	// === Deletion ===

	pub fn delete_file(&self, name: &str, listener: Option<Listener>) {
		let name = name.to_string();
		self.spawn_operation(listener, move |shared| async move { shared.delete(name).await });
	}

	/// Delete every name; the listener hears once, true only if all succeeded
	pub fn delete_files<S: AsRef<str>>(&self, names: &[S], listener: Option<Listener>) {
		if names.is_empty() {
			warn!("Batch deletion needs at least one file name");
			deliver(listener.as_deref(), Err(FileManagerError::EmptyBatch));
			return;
		}

		let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
		info!("Deleting {} remote files", names.len());
		self.spawn_operation(listener, move |shared| async move {
			let operations = names
				.into_iter()
				.map(|name| {
					let shared = shared.clone();
					async move { shared.delete(name).await }
				})
				.collect();
			shared.run_batch(operations).await
		});
	}

	// === Upload ===

	/// Upload one file
	///
	/// Bytes are resolved before anything is sent; reading a resource happens
	/// on the calling thread. Missing data, name or file type fail locally.
	pub fn upload_file(
		&self,
		file: &FileDescriptor,
		resources: &dyn ResourceProvider,
		listener: Option<Listener>,
	) {
		match self.shared.prepare_upload(file, resources) {
			Ok(upload) => {
				self.spawn_operation(listener, move |shared| async move { shared.put(upload).await })
			}
			Err(e) => deliver(listener.as_deref(), Err(e)),
		}
	}

	/// Upload every file; the listener hears once, true only if all succeeded
	///
	/// Elements that fail locally are counted as failures without stopping
	/// the others.
	pub fn upload_files(
		&self,
		files: &[FileDescriptor],
		resources: &dyn ResourceProvider,
		listener: Option<Listener>,
	) {
		if files.is_empty() {
			warn!("Batch upload needs at least one file");
			deliver(listener.as_deref(), Err(FileManagerError::EmptyBatch));
			return;
		}

		let jobs: Vec<Result<PreparedUpload, FileManagerError>> =
			files.iter().map(|file| self.shared.prepare_upload(file, resources)).collect();
		info!("Uploading {} files", jobs.len());
		self.spawn_operation(listener, move |shared| async move {
			let operations = jobs
				.into_iter()
				.map(|job| {
					let shared = shared.clone();
					async move {
						match job {
							Ok(upload) => shared.put(upload).await,
							Err(e) => Err(e),
						}
					}
				})
				.collect();
			shared.run_batch(operations).await
		});
	}

	// === Lifecycle ===

	/// Stop routing replies; every outstanding and later operation fails
	pub fn dispose(&self) {
		info!("Disposing file manager");
		self.shared.correlator.close();
		self.router.abort();
	}

	fn spawn_operation<F, Fut>(&self, listener: Option<Listener>, operation: F)
	where
		F: FnOnce(Arc<Shared>) -> Fut,
		Fut: Future<Output = Result<(), FileManagerError>> + Send + 'static,
	{
		let operation = operation(self.shared.clone());
		tokio::spawn(async move {
			let outcome = operation.await;
			// The cache update already happened under the readiness lock; the
			// listener runs unlocked so it may call back into the manager.
			deliver(listener.as_deref(), outcome);
		});
	}
}


// vim: ts=4
