use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Awaitable completion signal of one open or close transition.
///
/// Clones share the same signal. Completing is idempotent. A waiter also
/// resolves once every clone has been dropped, so an abandoned transition
/// never blocks forever.
#[derive(Clone)]
pub struct Transition {
	done: Arc<watch::Sender<bool>>,
}

impl Transition {
	/// Creates an unresolved transition.
	pub fn pending() -> Self {
		Self::with_state(false)
	}

	/// Creates an already-resolved transition.
	pub fn completed() -> Self {
		Self::with_state(true)
	}

	fn with_state(done: bool) -> Self {
		let (tx, _) = watch::channel(done);
		Self { done: Arc::new(tx) }
	}

	/// Resolves the transition. Returns true if this call resolved it.
	pub fn complete(&self) -> bool {
		self.done.send_if_modified(|done| {
			if *done {
				false
			} else {
				*done = true;
				true
			}
		})
	}

	pub fn is_completed(&self) -> bool {
		*self.done.borrow()
	}

	/// Future resolving once the transition completes.
	pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
		let mut rx = self.done.subscribe();
		async move {
			let _ = rx.wait_for(|done| *done).await;
		}
	}
}

impl Default for Transition {
	fn default() -> Self {
		Self::completed()
	}
}

impl fmt::Debug for Transition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Transition").field("completed", &self.is_completed()).finish()
	}
}
