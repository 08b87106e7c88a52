//! # peerfiles - Remote File Repository Manager
//!
//! Client-side manager for the file repository a peer device exposes over an
//! asynchronous request/response protocol. It learns which files exist on the
//! peer, uploads files from memory or local resources, deletes files by name,
//! and answers listing queries synchronously once the listing is known.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use peerfiles::callbacks::completion;
//! use peerfiles::protocol::MemoryPeer;
//! use peerfiles::source::NoResources;
//! use peerfiles::{FileDescriptor, FileManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (peer, replies) = MemoryPeer::connect();
//!     let manager = FileManager::with_defaults(peer, replies);
//!     manager.wait_until_settled().await;
//!
//!     let icon = FileDescriptor::new("icon.png").with_data(std::fs::read("icon.png").unwrap());
//!     manager.upload_file(&icon, &NoResources, completion(|ok| println!("uploaded: {}", ok)));
//! }
//! ```

pub mod callbacks;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod protocol;
pub mod source;
pub mod types;

// Re-export commonly used types and functions
pub use callbacks::{completion, CompletionListener, Listener, ListenerBuilder};
pub use config::ManagerConfig;
pub use error::{ConfigError, FileManagerError};
pub use manager::FileManager;
pub use source::{FsResources, NoResources, ResourceProvider};
pub use types::{FileDescriptor, FileType, ManagerState, RemoteListing, ResourceRef};

// vim: ts=4
