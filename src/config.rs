//! File manager configuration
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (ManagerConfig::default())
//! 2. Config file (TOML, JSON or JSON5, picked by extension)
//! 3. Whatever the embedding application sets on the struct afterwards

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Chunk size used when copying a resource into memory
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Tunables for a `FileManager`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerConfig {
	/// Chunk size for the streaming copy of local resources
	pub read_chunk_size: usize,

	/// Give up on a reply after this many milliseconds (None = wait forever)
	pub reply_timeout_ms: Option<u64>,

	/// Maximum requests in flight within one batch (0 = unlimited)
	pub max_concurrent_requests: usize,

	/// Persistence for descriptors that leave it unset
	pub default_persistent: bool,

	/// Infer the file type from the name's extension when unset
	pub infer_file_type: bool,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		ManagerConfig {
			read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
			reply_timeout_ms: None,
			max_concurrent_requests: 0,
			default_persistent: false,
			infer_file_type: true,
		}
	}
}

impl ManagerConfig {
	/// Load and validate a config file
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let display = path.display().to_string();
		let contents = std::fs::read_to_string(path)
			.map_err(|source| ConfigError::Io { path: display.clone(), source })?;

		let parse_error = |message: String| ConfigError::Parse { path: display.clone(), message };
		let config: ManagerConfig = match path.extension().and_then(|e| e.to_str()) {
			Some("toml") => toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
			Some("json") => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
			Some("json5") => json5::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
			other => {
				return Err(parse_error(format!("unsupported config format {:?}", other)));
			}
		};

		config.validate()?;
		Ok(config)
	}

	/// Reject settings the manager cannot work with
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.read_chunk_size == 0 {
			return Err(ConfigError::Invalid { message: "readChunkSize must be positive".to_string() });
		}
		if self.reply_timeout_ms == Some(0) {
			return Err(ConfigError::Invalid {
				message: "replyTimeoutMs must be positive when set".to_string(),
			});
		}
		Ok(())
	}

	pub fn reply_timeout(&self) -> Option<Duration> {
		self.reply_timeout_ms.map(Duration::from_millis)
	}
}


// vim: ts=4
