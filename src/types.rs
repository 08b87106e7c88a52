//! Core data types shared by the manager, the resolver and the protocol layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Classification tag the peer attaches to every stored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
	GraphicBmp,
	GraphicJpeg,
	GraphicPng,
	AudioWave,
	AudioMp3,
	AudioAac,
	Binary,
	Json,
}

impl FileType {
	/// Classify a file by its extension (case-insensitive)
	pub fn from_extension(ext: &str) -> Option<FileType> {
		match ext.to_ascii_lowercase().as_str() {
			"bmp" => Some(FileType::GraphicBmp),
			"jpg" | "jpeg" => Some(FileType::GraphicJpeg),
			"png" => Some(FileType::GraphicPng),
			"wav" | "wave" => Some(FileType::AudioWave),
			"mp3" => Some(FileType::AudioMp3),
			"aac" | "m4a" => Some(FileType::AudioAac),
			"bin" => Some(FileType::Binary),
			"json" => Some(FileType::Json),
			_ => None,
		}
	}

	/// Classify a remote file name, e.g. `icon.png`
	pub fn from_name(name: &str) -> Option<FileType> {
		Path::new(name).extension().and_then(|ext| ext.to_str()).and_then(FileType::from_extension)
	}

	/// Tag as the peer spells it
	pub fn as_str(&self) -> &'static str {
		match self {
			FileType::GraphicBmp => "GRAPHIC_BMP",
			FileType::GraphicJpeg => "GRAPHIC_JPEG",
			FileType::GraphicPng => "GRAPHIC_PNG",
			FileType::AudioWave => "AUDIO_WAVE",
			FileType::AudioMp3 => "AUDIO_MP3",
			FileType::AudioAac => "AUDIO_AAC",
			FileType::Binary => "BINARY",
			FileType::Json => "JSON",
		}
	}
}

impl fmt::Display for FileType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Reference to a locally bundled resource, opened through a `ResourceProvider`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef(String);

impl ResourceRef {
	pub fn new<S: Into<String>>(reference: S) -> Self {
		ResourceRef(reference.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ResourceRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ResourceRef {
	fn from(s: &str) -> Self {
		ResourceRef::new(s)
	}
}

impl From<String> for ResourceRef {
	fn from(s: String) -> Self {
		ResourceRef(s)
	}
}

/// Everything needed to upload one file to the peer
///
/// Only the name is required. Bytes come either inline or from a resource;
/// inline bytes win when both are set. File type is inferred from the name
/// when left unset, and persistence falls back to the manager's default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDescriptor {
	name: Option<String>,
	data: Option<Vec<u8>>,
	resource: Option<ResourceRef>,
	file_type: Option<FileType>,
	persistent: Option<bool>,
}

impl FileDescriptor {
	/// Create a descriptor for the given remote file name
	pub fn new<S: Into<String>>(name: S) -> Self {
		FileDescriptor { name: Some(name.into()), ..Default::default() }
	}

	/// Create a descriptor without a name (rejected at upload time)
	pub fn unnamed() -> Self {
		FileDescriptor::default()
	}

	pub fn with_data<D: Into<Vec<u8>>>(mut self, data: D) -> Self {
		self.data = Some(data.into());
		self
	}

	pub fn with_resource<R: Into<ResourceRef>>(mut self, resource: R) -> Self {
		self.resource = Some(resource.into());
		self
	}

	pub fn with_file_type(mut self, file_type: FileType) -> Self {
		self.file_type = Some(file_type);
		self
	}

	/// Whether the file should survive peer power cycles
	pub fn persistent(mut self, persistent: bool) -> Self {
		self.persistent = Some(persistent);
		self
	}

	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	pub fn data(&self) -> Option<&[u8]> {
		self.data.as_deref()
	}

	pub fn resource(&self) -> Option<&ResourceRef> {
		self.resource.as_ref()
	}

	pub fn file_type(&self) -> Option<FileType> {
		self.file_type
	}

	pub fn is_persistent(&self) -> Option<bool> {
		self.persistent
	}
}

/// Readiness of a file manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerState {
	/// Initial listing has not been answered yet
	Uninitialized,
	/// Listing fetched; synchronous queries are available
	Ready,
	/// Initial listing failed; the instance stays degraded
	Error,
}

impl fmt::Display for ManagerState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ManagerState::Uninitialized => write!(f, "uninitialized"),
			ManagerState::Ready => write!(f, "ready"),
			ManagerState::Error => write!(f, "error"),
		}
	}
}

/// Cached view of the peer's file repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
	names: BTreeSet<String>,
	bytes_available: Option<u64>,
}

impl RemoteListing {
	pub fn new<I, S>(names: I, bytes_available: Option<u64>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		RemoteListing { names: names.into_iter().map(Into::into).collect(), bytes_available }
	}

	pub fn names(&self) -> &BTreeSet<String> {
		&self.names
	}

	pub fn contains(&self, name: &str) -> bool {
		self.names.contains(name)
	}

	pub fn bytes_available(&self) -> Option<u64> {
		self.bytes_available
	}

	/// Record a confirmed upload
	pub fn insert(&mut self, name: &str) {
		self.names.insert(name.to_string());
	}

	/// Record a confirmed deletion; removing an unknown name is a no-op
	pub fn remove(&mut self, name: &str) {
		self.names.remove(name);
	}

	/// Take a fresh space estimate if the peer sent one
	pub fn update_space(&mut self, bytes_available: Option<u64>) {
		if bytes_available.is_some() {
			self.bytes_available = bytes_available;
		}
	}

	/// Replace the whole view with a fresh listing
	pub fn replace(&mut self, fresh: RemoteListing) {
		*self = fresh;
	}
}


// vim: ts=4
