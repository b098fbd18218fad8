use std::time::Duration;

use tokio::task::JoinHandle;

use super::resolve_after;
use crate::{Feature, Transition, TransitionProvider};

/// Holds open and close completion for fixed delays.
///
/// The open delay starts once the resource is visible; the close delay starts
/// when closing begins, before the resource is hidden.
#[derive(Debug)]
pub struct TimeDelayFeature {
	open_delay: Duration,
	close_delay: Duration,
	open: Transition,
	close: Transition,
	timer: Option<JoinHandle<()>>,
}

impl TimeDelayFeature {
	pub fn new(open_delay: Duration, close_delay: Duration) -> Self {
		Self {
			open_delay,
			close_delay,
			open: Transition::completed(),
			close: Transition::completed(),
			timer: None,
		}
	}

	pub fn open_delay(&self) -> Duration {
		self.open_delay
	}

	pub fn close_delay(&self) -> Duration {
		self.close_delay
	}

	fn cancel_timer(&mut self) {
		if let Some(timer) = self.timer.take() {
			timer.abort();
		}
	}
}

impl Feature for TimeDelayFeature {
	fn name(&self) -> &'static str {
		"time_delay"
	}

	fn on_opening(&mut self) {
		self.cancel_timer();
		self.close.complete();
		self.open = Transition::pending();
	}

	fn on_opened(&mut self) {
		self.timer = resolve_after(&self.open, self.open_delay);
	}

	fn on_closing(&mut self) {
		self.cancel_timer();
		self.open.complete();
		self.close = Transition::pending();
		self.timer = resolve_after(&self.close, self.close_delay);
	}

	fn transitions(&self) -> Option<&dyn TransitionProvider> {
		Some(self)
	}
}

impl TransitionProvider for TimeDelayFeature {
	fn open_transition(&self) -> Transition {
		self.open.clone()
	}

	fn close_transition(&self) -> Transition {
		self.close.clone()
	}
}

impl Drop for TimeDelayFeature {
	fn drop(&mut self) {
		self.cancel_timer();
	}
}
