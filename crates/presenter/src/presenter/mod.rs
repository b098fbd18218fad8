use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use stagehand_loader::UiObjectRef;
use stagehand_primitives::{BoxFutureStatic, InstanceIdentity};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::PresenterError;
use crate::behavior::{PresenterBehavior, PresenterParts};
use crate::feature::{Feature, PresenterContext};
use crate::transition::Transition;

/// Lifecycle state of one presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenterState {
	/// Loaded and hidden.
	Closed,
	/// Open requested, feature `on_opening` hooks running.
	Opening,
	/// Visible, waiting for open transitions.
	AwaitingOpenTransition,
	/// Visible and settled.
	Open,
	/// Close requested, feature `on_closing` hooks running.
	Closing,
	/// Still visible, waiting for close transitions.
	AwaitingCloseTransition,
	/// Unloaded; the presenter is inert.
	Destroyed,
}

impl PresenterState {
	/// True for every state between an open request and the next close request.
	pub fn is_open(self) -> bool {
		matches!(self, Self::Opening | Self::AwaitingOpenTransition | Self::Open)
	}

	/// True while the resource should be shown.
	pub fn is_visible(self) -> bool {
		!matches!(self, Self::Closed | Self::Destroyed)
	}
}

/// How an open or close transition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
	/// Ran to completion and fired its completed hook.
	Completed,
	/// Interrupted by the opposite transition before settling.
	Superseded,
	/// The presenter was destroyed while the transition was pending.
	Destroyed,
	/// The presenter was already in or heading to the requested state.
	Unchanged,
}

#[derive(Clone, Copy)]
enum Phase {
	Open,
	Close,
}

struct Core {
	behavior: Box<dyn PresenterBehavior>,
	features: Vec<Box<dyn Feature>>,
	opened: Transition,
	closed: Transition,
}

struct Shared {
	identity: InstanceIdentity,
	layer: i32,
	object: UiObjectRef,
	state: RwLock<PresenterState>,
	/// Bumped on every open, close and destroy; a pending wait whose cycle is
	/// no longer current has been superseded.
	cycle: watch::Sender<u64>,
	core: Mutex<Core>,
}

/// Shared handle to one presenter.
///
/// `open` and `close` run their synchronous part (state change, hooks,
/// activation) immediately. The awaiting part runs on a spawned task, so a
/// transition settles even if the returned future is dropped; the future only
/// reports the outcome.
#[derive(Clone)]
pub struct Presenter {
	shared: Arc<Shared>,
}

/// Non-owning presenter handle.
#[derive(Clone, Default)]
pub struct WeakPresenter {
	shared: Weak<Shared>,
}

impl WeakPresenter {
	pub fn upgrade(&self) -> Option<Presenter> {
		self.shared.upgrade().map(|shared| Presenter { shared })
	}
}

impl fmt::Debug for WeakPresenter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakPresenter").field("alive", &(self.shared.strong_count() > 0)).finish()
	}
}

impl Presenter {
	/// Wraps a freshly instantiated resource and runs initialization hooks.
	///
	/// The resource is hidden and tagged with `layer`.
	pub fn new(identity: InstanceIdentity, layer: i32, object: UiObjectRef, parts: PresenterParts) -> Self {
		object.set_active(false);
		object.set_layer(layer);

		let (cycle, _) = watch::channel(0);
		let presenter = Self {
			shared: Arc::new(Shared {
				identity,
				layer,
				object,
				state: RwLock::new(PresenterState::Closed),
				cycle,
				core: Mutex::new(Core {
					behavior: parts.behavior,
					features: parts.features,
					opened: Transition::completed(),
					closed: Transition::completed(),
				}),
			}),
		};

		let ctx = PresenterContext {
			identity: presenter.shared.identity.clone(),
			object: presenter.shared.object.clone(),
			presenter: presenter.downgrade(),
		};
		let mut guard = presenter.shared.core.lock();
		let core = &mut *guard;
		core.behavior.on_initialized(&ctx);
		for feature in &mut core.features {
			feature.on_initialized(&ctx);
		}
		debug!(identity = %presenter.shared.identity, features = core.features.len(), "presenter.initialized");
		drop(guard);

		presenter
	}

	pub fn identity(&self) -> &InstanceIdentity {
		&self.shared.identity
	}

	pub fn layer(&self) -> i32 {
		self.shared.layer
	}

	/// The resource driven by this presenter.
	pub fn object(&self) -> &UiObjectRef {
		&self.shared.object
	}

	pub fn state(&self) -> PresenterState {
		*self.shared.state.read()
	}

	pub fn is_open(&self) -> bool {
		self.state().is_open()
	}

	pub fn is_destroyed(&self) -> bool {
		self.state() == PresenterState::Destroyed
	}

	pub fn feature_count(&self) -> usize {
		self.shared.core.lock().features.len()
	}

	/// Completion signal of the current (or last) open transition.
	pub fn open_completed(&self) -> Transition {
		self.shared.core.lock().opened.clone()
	}

	/// Completion signal of the current (or last) close transition.
	pub fn close_completed(&self) -> Transition {
		self.shared.core.lock().closed.clone()
	}

	pub fn downgrade(&self) -> WeakPresenter {
		WeakPresenter {
			shared: Arc::downgrade(&self.shared),
		}
	}

	/// Returns true if both handles refer to the same presenter.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.shared, &other.shared)
	}

	/// Hands data to the presenter behavior.
	///
	/// # Errors
	///
	/// Returns the behavior's rejection, or [`PresenterError::Destroyed`].
	pub fn set_data(&self, data: Box<dyn Any + Send>) -> Result<(), PresenterError> {
		if self.is_destroyed() {
			return Err(PresenterError::Destroyed(self.shared.identity.to_string()));
		}
		self.shared.core.lock().behavior.on_set_data(data)
	}

	/// Starts the open transition.
	pub fn open(&self) -> BoxFutureStatic<TransitionOutcome> {
		let mut guard = self.shared.core.lock();
		let state = self.state();
		match state {
			PresenterState::Destroyed => {
				warn!(identity = %self.shared.identity, "presenter.open_destroyed");
				return Box::pin(async { TransitionOutcome::Destroyed });
			}
			PresenterState::Opening | PresenterState::AwaitingOpenTransition | PresenterState::Open => {
				warn!(identity = %self.shared.identity, ?state, "presenter.already_open");
				let done = guard.opened.wait();
				return Box::pin(async move {
					done.await;
					TransitionOutcome::Unchanged
				});
			}
			PresenterState::Closed | PresenterState::Closing | PresenterState::AwaitingCloseTransition => {}
		}

		let cycle = self.next_cycle();
		let core = &mut *guard;
		core.closed.complete();
		core.opened = Transition::pending();

		self.set_state(PresenterState::Opening);
		for feature in &mut core.features {
			feature.on_opening();
		}

		self.shared.object.set_active(true);
		self.set_state(PresenterState::AwaitingOpenTransition);
		core.behavior.on_opened();
		for feature in &mut core.features {
			feature.on_opened();
		}

		let pending = collect_transitions(&core.features, Phase::Open);
		trace!(identity = %self.shared.identity, cycle, pending = pending.len(), "presenter.opening");
		drop(guard);

		self.drive(cycle, pending, Phase::Open)
	}

	/// Starts the close transition.
	pub fn close(&self) -> BoxFutureStatic<TransitionOutcome> {
		let mut guard = self.shared.core.lock();
		let state = self.state();
		match state {
			PresenterState::Destroyed => {
				warn!(identity = %self.shared.identity, "presenter.close_destroyed");
				return Box::pin(async { TransitionOutcome::Destroyed });
			}
			PresenterState::Closed | PresenterState::Closing | PresenterState::AwaitingCloseTransition => {
				warn!(identity = %self.shared.identity, ?state, "presenter.already_closed");
				let done = guard.closed.wait();
				return Box::pin(async move {
					done.await;
					TransitionOutcome::Unchanged
				});
			}
			PresenterState::Opening | PresenterState::AwaitingOpenTransition | PresenterState::Open => {}
		}

		let cycle = self.next_cycle();
		let core = &mut *guard;
		core.opened.complete();
		core.closed = Transition::pending();

		self.set_state(PresenterState::Closing);
		core.behavior.on_closed();
		for feature in &mut core.features {
			feature.on_closing();
		}

		self.set_state(PresenterState::AwaitingCloseTransition);
		let pending = collect_transitions(&core.features, Phase::Close);
		trace!(identity = %self.shared.identity, cycle, pending = pending.len(), "presenter.closing");
		drop(guard);

		self.drive(cycle, pending, Phase::Close)
	}

	/// Marks the presenter destroyed and drops its features.
	///
	/// Pending transitions short-circuit without firing hooks; their
	/// completion signals resolve.
	pub fn destroy(&self) {
		let mut guard = self.shared.core.lock();
		if self.is_destroyed() {
			return;
		}
		self.next_cycle();
		self.set_state(PresenterState::Destroyed);
		guard.opened.complete();
		guard.closed.complete();
		let features = std::mem::take(&mut guard.features);
		drop(guard);
		drop(features);
		debug!(identity = %self.shared.identity, "presenter.destroyed");
	}

	/// Settles `pending` on its own task and finishes the phase there.
	fn drive(&self, cycle: u64, pending: Vec<Transition>, phase: Phase) -> BoxFutureStatic<TransitionOutcome> {
		let this = self.clone();
		let task = tokio::spawn(async move {
			this.settle(cycle, pending).await;
			match phase {
				Phase::Open => this.finish_open(cycle),
				Phase::Close => this.finish_close(cycle),
			}
		});
		let identity = self.shared.identity.clone();
		Box::pin(async move {
			task.await.unwrap_or_else(|err| {
				warn!(identity = %identity, %err, "presenter.transition_task_failed");
				TransitionOutcome::Superseded
			})
		})
	}

	fn set_state(&self, state: PresenterState) {
		*self.shared.state.write() = state;
	}

	fn next_cycle(&self) -> u64 {
		let mut next = 0;
		self.shared.cycle.send_modify(|cycle| {
			*cycle = cycle.wrapping_add(1);
			next = *cycle;
		});
		next
	}

	fn is_current(&self, cycle: u64) -> bool {
		*self.shared.cycle.borrow() == cycle
	}

	/// Waits until every pending transition resolved or the cycle is superseded.
	async fn settle(&self, cycle: u64, pending: Vec<Transition>) {
		if pending.is_empty() {
			return;
		}
		let mut cycles = self.shared.cycle.subscribe();
		let superseded = async move {
			let _ = cycles.wait_for(|current| *current != cycle).await;
		};
		tokio::select! {
			_ = join_all(pending.iter().map(Transition::wait)) => {}
			_ = superseded => {}
		}
	}

	fn finish_open(&self, cycle: u64) -> TransitionOutcome {
		let mut guard = self.shared.core.lock();
		if self.is_destroyed() {
			guard.opened.complete();
			return TransitionOutcome::Destroyed;
		}
		if !self.is_current(cycle) {
			trace!(identity = %self.shared.identity, cycle, "presenter.open_superseded");
			return TransitionOutcome::Superseded;
		}

		self.set_state(PresenterState::Open);
		guard.behavior.on_open_transition_completed();
		guard.opened.complete();
		debug!(identity = %self.shared.identity, "presenter.opened");
		TransitionOutcome::Completed
	}

	fn finish_close(&self, cycle: u64) -> TransitionOutcome {
		let mut guard = self.shared.core.lock();
		if self.is_destroyed() {
			guard.closed.complete();
			return TransitionOutcome::Destroyed;
		}
		if !self.is_current(cycle) {
			trace!(identity = %self.shared.identity, cycle, "presenter.close_superseded");
			return TransitionOutcome::Superseded;
		}

		let core = &mut *guard;
		self.shared.object.set_active(false);
		for feature in &mut core.features {
			feature.on_closed();
		}
		self.set_state(PresenterState::Closed);
		core.behavior.on_close_transition_completed();
		core.closed.complete();
		debug!(identity = %self.shared.identity, "presenter.closed");
		TransitionOutcome::Completed
	}
}

fn collect_transitions(features: &[Box<dyn Feature>], phase: Phase) -> Vec<Transition> {
	features
		.iter()
		.filter_map(|feature| feature.transitions())
		.map(|provider| match phase {
			Phase::Open => provider.open_transition(),
			Phase::Close => provider.close_transition(),
		})
		.filter(|transition| !transition.is_completed())
		.collect()
}

impl fmt::Debug for Presenter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Presenter")
			.field("identity", &self.shared.identity)
			.field("layer", &self.shared.layer)
			.field("state", &self.state())
			.finish()
	}
}
