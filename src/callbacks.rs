//! Completion listeners for file manager operations

use crate::error::FileManagerError;

type CompleteFn = dyn Fn(bool) + Send + Sync;
type ErrorFn = dyn Fn(&FileManagerError) + Send + Sync;

/// Boxed listener as accepted by the file manager
pub type Listener = Box<dyn CompletionListener>;

/// Receives the outcome of one operation (or one whole batch)
///
/// `on_complete` fires exactly once per operation. On failure, `on_error`
/// fires first with the reason.
pub trait CompletionListener: Send + Sync {
	/// Called once with the success flag
	fn on_complete(&self, success: bool);

	/// Called right before `on_complete(false)` with the reason
	fn on_error(&self, _error: &FileManagerError) {}
}

impl<F> CompletionListener for F
where
	F: Fn(bool) + Send + Sync,
{
	fn on_complete(&self, success: bool) {
		self(success)
	}
}

/// Wrap a closure as an optional listener
pub fn completion<F>(callback: F) -> Option<Listener>
where
	F: Fn(bool) + Send + Sync + 'static,
{
	Some(Box::new(callback))
}

/// Report an outcome to a listener, if there is one
///
/// The single place outcomes leave the manager; every single and batch
/// operation ends here.
pub fn deliver(listener: Option<&dyn CompletionListener>, outcome: Result<(), FileManagerError>) {
	let listener = match listener {
		Some(listener) => listener,
		None => return,
	};
	match outcome {
		Ok(()) => listener.on_complete(true),
		Err(e) => {
			listener.on_error(&e);
			listener.on_complete(false);
		}
	}
}

/// Builder for listeners using function closures
pub struct ListenerBuilder {
	complete: Option<Box<CompleteFn>>,
	error: Option<Box<ErrorFn>>,
}

impl ListenerBuilder {
	/// Create a new listener builder
	pub fn new() -> Self {
		ListenerBuilder { complete: None, error: None }
	}

	/// Set completion callback
	pub fn on_complete<F>(mut self, callback: F) -> Self
	where
		F: Fn(bool) + Send + Sync + 'static,
	{
		self.complete = Some(Box::new(callback));
		self
	}

	/// Set error callback
	pub fn on_error<F>(mut self, callback: F) -> Self
	where
		F: Fn(&FileManagerError) + Send + Sync + 'static,
	{
		self.error = Some(Box::new(callback));
		self
	}

	/// Build the listener
	pub fn build(self) -> Listener {
		Box::new(CompositeListener { complete: self.complete, error: self.error })
	}
}

impl Default for ListenerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct CompositeListener {
	complete: Option<Box<CompleteFn>>,
	error: Option<Box<ErrorFn>>,
}

impl CompletionListener for CompositeListener {
	fn on_complete(&self, success: bool) {
		if let Some(ref callback) = self.complete {
			callback(success);
		}
	}

	fn on_error(&self, error: &FileManagerError) {
		if let Some(ref callback) = self.error {
			callback(error);
		}
	}
}


// vim: ts=4
