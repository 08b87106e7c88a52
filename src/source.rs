//! Byte source resolution for uploads
//!
//! A descriptor's payload is either carried inline or read from a local
//! resource. Resources are opened through a `ResourceProvider` borrowed for
//! the duration of one resolution and copied into memory in fixed-size chunks.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::FileManagerError;
use crate::types::{FileDescriptor, ResourceRef};

/// Opens local resources by reference
pub trait ResourceProvider {
	/// Open `reference` for reading; the stream is dropped once resolution ends
	fn open(&self, reference: &ResourceRef) -> io::Result<Box<dyn Read + '_>>;
}

/// Provider for callers without local resources; every open fails
pub struct NoResources;

impl ResourceProvider for NoResources {
	fn open(&self, reference: &ResourceRef) -> io::Result<Box<dyn Read + '_>> {
		Err(io::Error::new(
			io::ErrorKind::NotFound,
			format!("no resource provider for {}", reference),
		))
	}
}

/// Resources stored as files below a root directory
#[derive(Debug, Clone)]
pub struct FsResources {
	root: PathBuf,
}

impl FsResources {
	pub fn new<P: Into<PathBuf>>(root: P) -> Self {
		FsResources { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Map a reference to a path below the root, refusing anything that escapes it
	fn locate(&self, reference: &ResourceRef) -> io::Result<PathBuf> {
		let relative = Path::new(reference.as_str());
		let confined = relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
		if reference.as_str().is_empty() || !confined {
			return Err(io::Error::new(
				io::ErrorKind::InvalidInput,
				format!("resource reference escapes root: {}", reference),
			));
		}
		Ok(self.root.join(relative))
	}
}

impl ResourceProvider for FsResources {
	fn open(&self, reference: &ResourceRef) -> io::Result<Box<dyn Read + '_>> {
		let path = self.locate(reference)?;
		debug!("Opening resource {}", path.display());
		Ok(Box::new(File::open(path)?))
	}
}

/// Produce the bytes to upload for `file`
///
/// Inline data wins; otherwise the resource is read through `resources`.
/// Empty inline data counts as absent.
pub fn resolve(
	file: &FileDescriptor,
	resources: &dyn ResourceProvider,
	chunk_size: usize,
) -> Result<Vec<u8>, FileManagerError> {
	if let Some(data) = file.data().filter(|d| !d.is_empty()) {
		return Ok(data.to_vec());
	}

	match file.resource() {
		Some(reference) => read_resource(reference, resources, chunk_size),
		None => {
			warn!("No file data or resource provided for {:?}", file.name());
			Err(FileManagerError::NoSourceProvided { name: file.name().map(str::to_string) })
		}
	}
}

/// Read a resource fully into memory
pub fn read_resource(
	reference: &ResourceRef,
	resources: &dyn ResourceProvider,
	chunk_size: usize,
) -> Result<Vec<u8>, FileManagerError> {
	let unavailable = |source: io::Error| {
		warn!("Can't read resource {}: {}", reference, source);
		FileManagerError::SourceUnavailable { reference: reference.clone(), source }
	};

	let mut stream = resources.open(reference).map_err(unavailable)?;
	let data = read_chunked(&mut stream, chunk_size).map_err(unavailable)?;
	if data.is_empty() {
		return Err(unavailable(io::Error::new(io::ErrorKind::UnexpectedEof, "resource is empty")));
	}
	debug!("Read {} bytes from resource {}", data.len(), reference);
	Ok(data)
}

/// Copy a stream into memory `chunk_size` bytes at a time until end-of-stream
fn read_chunked<R: Read + ?Sized>(reader: &mut R, chunk_size: usize) -> io::Result<Vec<u8>> {
	let mut buffer = vec![0u8; chunk_size.max(1)];
	let mut out = Vec::new();
	loop {
		match reader.read(&mut buffer) {
			Ok(0) => return Ok(out),
			Ok(n) => out.extend_from_slice(&buffer[..n]),
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(e),
		}
	}
}


// vim: ts=4
