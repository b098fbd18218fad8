//! [`UiService`]: the presenter registry and lifecycle orchestrator.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use stagehand_loader::{AssetLoader, LoaderError, UiObjectRef};
use stagehand_presenter::{Presenter, PresenterParts, TransitionOutcome};
use stagehand_primitives::{InstanceIdentity, PresenterType, UiConfig, UiConfigs, UiSetConfig};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use self::inflight::{Election, InFlightMap};
use self::state::{Resolved, ServiceState};
use crate::{Error, LoadedEntry, Result, ServiceEvent, ServiceSnapshot};

mod inflight;
mod sets;
mod state;


const EVENT_CAPACITY: usize = 128;

/// Builds the behavior and ordered feature list for a freshly instantiated resource.
pub type PresenterFactory = Arc<dyn Fn(&InstanceIdentity, &UiObjectRef) -> PresenterParts + Send + Sync>;

/// Presenter registry.
///
/// Owns type configs, the loaded-instance store, the visible list and
/// presenter sets. Cheap to clone; clones share state.
///
/// Loads are single-flight per [`InstanceIdentity`]: concurrent callers share
/// one instantiation, and a resource that loses a registration race is
/// released through [`AssetLoader::unload`] instead of being registered twice.
#[derive(Clone)]
pub struct UiService {
	inner: Arc<Inner>,
}

struct Inner {
	loader: Arc<dyn AssetLoader>,
	state: RwLock<ServiceState>,
	inflight: InFlightMap,
	events: broadcast::Sender<ServiceEvent>,
}

impl UiService {
	pub fn new(loader: Arc<dyn AssetLoader>) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			inner: Arc::new(Inner {
				loader,
				state: RwLock::new(ServiceState::default()),
				inflight: InFlightMap::default(),
				events,
			}),
		}
	}

	/// Registers a configuration bundle.
	///
	/// Every entry is validated before anything is registered.
	///
	/// # Errors
	///
	/// Returns [`Error::Config`] if any entry is invalid.
	pub fn init(&self, configs: UiConfigs) -> Result<()> {
		configs.validate()?;
		let (config_count, set_count) = (configs.configs.len(), configs.sets.len());
		for config in configs.configs {
			self.add_config(config);
		}
		for set in configs.sets {
			self.add_set(set);
		}
		info!(configs = config_count, sets = set_count, "service.initialized");
		Ok(())
	}

	/// Registers a type config. The first config registered for a type wins.
	pub fn add_config(&self, config: UiConfig) {
		let mut state = self.inner.state.write();
		if state.configs.contains_key(&config.presenter_type) {
			warn!(presenter_type = %config.presenter_type, "service.duplicate_config");
			return;
		}
		if !config.layer_in_range() {
			warn!(presenter_type = %config.presenter_type, layer = config.layer, "config.layer_out_of_range");
		}
		state.configs.insert(config.presenter_type.clone(), config);
	}

	/// Registers a set. The first set registered under an id wins.
	pub fn add_set(&self, set: UiSetConfig) {
		let mut state = self.inner.state.write();
		if state.sets.contains_key(&set.set_id) {
			warn!(set_id = %set.set_id, "service.duplicate_set");
			return;
		}
		state.sets.insert(set.set_id, set);
	}

	/// Associates a presenter factory with a type, replacing any previous one.
	///
	/// Types without a factory are built with [`PresenterParts::plain`].
	pub fn register_presenter<F>(&self, presenter_type: impl Into<PresenterType>, factory: F)
	where
		F: Fn(&InstanceIdentity, &UiObjectRef) -> PresenterParts + Send + Sync + 'static,
	{
		self.inner.state.write().factories.insert(presenter_type.into(), Arc::new(factory));
	}

	pub fn config(&self, presenter_type: impl Into<PresenterType>) -> Option<UiConfig> {
		self.inner.state.read().configs.get(&presenter_type.into()).cloned()
	}

	pub fn loader(&self) -> &Arc<dyn AssetLoader> {
		&self.inner.loader
	}

	/// Resolves the identity an address-less request refers to.
	///
	/// An explicit address is used as is. Otherwise: no loaded instance of the
	/// type yields the default identity, one yields that instance, and several
	/// yield the first with a warning.
	pub fn resolve_address(&self, presenter_type: impl Into<PresenterType>, address: Option<&str>) -> InstanceIdentity {
		let presenter_type = presenter_type.into();
		if let Some(address) = address {
			return InstanceIdentity::new(presenter_type, address);
		}
		match self.inner.state.read().resolve(&presenter_type) {
			Resolved::Default(identity) | Resolved::Single(identity) => identity,
			Resolved::Ambiguous { first, matches } => {
				warn!(identity = %first, matches, "service.ambiguous_address");
				first
			}
		}
	}

	/// Like [`Self::resolve_address`], but refuses to guess between several instances.
	fn resolve_address_strict(&self, presenter_type: PresenterType, address: Option<&str>) -> Result<InstanceIdentity> {
		if let Some(address) = address {
			return Ok(InstanceIdentity::new(presenter_type, address));
		}
		match self.inner.state.read().resolve(&presenter_type) {
			Resolved::Default(identity) | Resolved::Single(identity) => Ok(identity),
			Resolved::Ambiguous { matches, .. } => Err(Error::AmbiguousAddress { presenter_type, matches }),
		}
	}

	/// Returns the loaded instance, instantiating it if needed.
	///
	/// Idempotent: concurrent and repeated calls for one identity yield the
	/// same presenter from a single instantiation. Cancelling `cancel` stops
	/// the instantiation step and registers nothing.
	///
	/// # Errors
	///
	/// - [`Error::MissingConfig`] if the type has no config.
	/// - [`Error::Cancelled`] if `cancel` fired first.
	/// - [`Error::Loader`] if the loader failed.
	pub async fn load_ui(
		&self,
		presenter_type: impl Into<PresenterType>,
		address: Option<&str>,
		open_after: bool,
		cancel: &CancellationToken,
	) -> Result<Presenter> {
		let identity = self.resolve_address(presenter_type, address);
		let presenter = self.load_identity(identity, cancel).await?;
		if open_after {
			self.open_loaded(&presenter, None).await?;
		}
		Ok(presenter)
	}

	/// Loads if needed, then opens.
	///
	/// Opening a visible instance logs a warning and returns it unchanged.
	///
	/// # Errors
	///
	/// Same as [`Self::load_ui`].
	pub async fn open_ui(&self, presenter_type: impl Into<PresenterType>, address: Option<&str>, cancel: &CancellationToken) -> Result<Presenter> {
		let identity = self.resolve_address(presenter_type, address);
		self.open_identity(identity, None, cancel).await
	}

	/// Loads if needed, hands `data` to the presenter, then opens.
	///
	/// Data is delivered before the open transition starts.
	///
	/// # Errors
	///
	/// Same as [`Self::load_ui`], plus [`Error::Presenter`] if the presenter
	/// rejects the data.
	pub async fn open_ui_with_data<T: Any + Send>(
		&self,
		presenter_type: impl Into<PresenterType>,
		address: Option<&str>,
		data: T,
		cancel: &CancellationToken,
	) -> Result<Presenter> {
		let identity = self.resolve_address(presenter_type, address);
		self.open_identity(identity, Some(Box::new(data)), cancel).await
	}

	/// Hides an instance.
	///
	/// The visible entry is removed immediately and the close sequence runs on
	/// a spawned task. With `destroy`, the instance is unloaded once the close
	/// transition completes. Closing an instance that is not visible logs a
	/// warning and returns an idle [`Closing`].
	///
	/// Must be called within a Tokio runtime.
	///
	/// # Errors
	///
	/// Returns [`Error::AmbiguousAddress`] if `destroy` is set, no address is
	/// given and several instances of the type are loaded.
	pub fn close_ui(&self, presenter_type: impl Into<PresenterType>, address: Option<&str>, destroy: bool) -> Result<Closing> {
		let presenter_type = presenter_type.into();
		let identity = if destroy {
			self.resolve_address_strict(presenter_type, address)?
		} else {
			self.resolve_address(presenter_type, address)
		};
		Ok(self.close_identity(&identity, destroy))
	}

	/// Destroys an instance and releases its resource through the loader.
	///
	/// Does not close first: pending transitions short-circuit.
	///
	/// # Errors
	///
	/// Returns [`Error::NotLoaded`] if the instance is not loaded.
	pub fn unload_ui(&self, presenter_type: impl Into<PresenterType>, address: Option<&str>) -> Result<()> {
		let identity = self.resolve_address(presenter_type, address);
		let presenter = self.inner.state.write().remove(&identity).ok_or(Error::NotLoaded(identity))?;
		self.release(&presenter);
		Ok(())
	}

	/// Detaches an instance without releasing it; the caller takes ownership.
	///
	/// # Errors
	///
	/// Returns [`Error::NotLoaded`] if the instance is not loaded.
	pub fn remove_ui(&self, presenter_type: impl Into<PresenterType>, address: Option<&str>) -> Result<Presenter> {
		let identity = self.resolve_address(presenter_type, address);
		let presenter = self.inner.state.write().remove(&identity).ok_or_else(|| Error::NotLoaded(identity.clone()))?;
		debug!(identity = %identity, "service.removed");
		self.emit(ServiceEvent::Removed(identity));
		Ok(presenter)
	}

	/// # Errors
	///
	/// Returns [`Error::NotLoaded`] if the instance is not loaded.
	pub fn get_ui(&self, presenter_type: impl Into<PresenterType>, address: Option<&str>) -> Result<Presenter> {
		let identity = self.resolve_address(presenter_type, address);
		self.find_loaded(&identity).ok_or(Error::NotLoaded(identity))
	}

	pub fn is_visible(&self, presenter_type: impl Into<PresenterType>, address: Option<&str>) -> bool {
		let identity = self.resolve_address(presenter_type, address);
		self.inner.state.read().is_visible(&identity)
	}

	pub fn is_loaded(&self, presenter_type: impl Into<PresenterType>, address: Option<&str>) -> bool {
		let identity = self.resolve_address(presenter_type, address);
		self.inner.state.read().contains(&identity)
	}

	/// Visible identities in open order.
	pub fn visible_uis(&self) -> Vec<InstanceIdentity> {
		self.inner.state.read().visible.clone()
	}

	/// Loaded identities, sorted.
	pub fn loaded_uis(&self) -> Vec<InstanceIdentity> {
		let state = self.inner.state.read();
		let mut loaded: Vec<_> = state.instances.values().flatten().map(|presenter| presenter.identity().clone()).collect();
		drop(state);
		loaded.sort();
		loaded
	}

	/// Closes every visible instance.
	pub fn close_all_ui(&self) -> Vec<Closing> {
		let visible = self.visible_uis();
		visible.iter().map(|identity| self.close_identity(identity, false)).collect()
	}

	/// Closes every visible instance whose config layer is `layer`.
	pub fn close_all_ui_in_layer(&self, layer: i32) -> Vec<Closing> {
		let targets: Vec<_> = {
			let state = self.inner.state.read();
			state
				.visible
				.iter()
				.filter(|identity| state.find(identity).is_some_and(|presenter| presenter.layer() == layer))
				.cloned()
				.collect()
		};
		targets.iter().map(|identity| self.close_identity(identity, false)).collect()
	}

	/// Destroys and releases every loaded instance.
	///
	/// Pending transitions short-circuit. Loads still in flight are not
	/// affected and register when they finish.
	pub fn unload_all(&self) {
		let presenters = self.inner.state.write().drain();
		info!(count = presenters.len(), "service.unload_all");
		for presenter in &presenters {
			self.release(presenter);
		}
	}

	/// Subscribes to lifecycle events.
	pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
		self.inner.events.subscribe()
	}

	pub fn snapshot(&self) -> ServiceSnapshot {
		let state = self.inner.state.read();
		let mut configured: Vec<_> = state.configs.keys().cloned().collect();
		configured.sort();
		let mut loaded: Vec<_> = state
			.instances
			.values()
			.flatten()
			.map(|presenter| LoadedEntry {
				identity: presenter.identity().clone(),
				layer: presenter.layer(),
				state: presenter.state(),
			})
			.collect();
		loaded.sort_by(|a, b| a.identity.cmp(&b.identity));
		ServiceSnapshot {
			configured,
			loaded,
			visible: state.visible.clone(),
			sets: state.sets.keys().copied().collect(),
		}
	}

	fn find_loaded(&self, identity: &InstanceIdentity) -> Option<Presenter> {
		self.inner.state.read().find(identity).cloned()
	}

	fn emit(&self, event: ServiceEvent) {
		// No receivers is fine.
		let _ = self.inner.events.send(event);
	}

	async fn load_identity(&self, identity: InstanceIdentity, cancel: &CancellationToken) -> Result<Presenter> {
		loop {
			if let Some(presenter) = self.find_loaded(&identity) {
				return Ok(presenter);
			}

			let guard = match inflight::elect(&self.inner.inflight, &identity) {
				Election::Leader(guard) => guard,
				Election::Waiter(load) => {
					trace!(identity = %identity, "service.load_joined");
					match load.wait(&identity, cancel).await {
						// The leader's caller gave up; take over unless this caller did too.
						Err(err) if err.is_foreign_abort() && !cancel.is_cancelled() => continue,
						res => return res,
					}
				}
			};

			// A load may have registered between the fast path and the election.
			if let Some(presenter) = self.find_loaded(&identity) {
				return guard.complete(Ok(presenter));
			}
			let res = self.instantiate(&identity, cancel).await;
			return guard.complete(res);
		}
	}

	async fn instantiate(&self, identity: &InstanceIdentity, cancel: &CancellationToken) -> Result<Presenter> {
		let (config, parent) = {
			let mut state = self.inner.state.write();
			let config = state
				.configs
				.get(identity.presenter_type())
				.cloned()
				.ok_or_else(|| Error::MissingConfig(identity.presenter_type().clone()))?;
			let parent = state.container(config.layer);
			(config, parent)
		};

		debug!(
			identity = %identity,
			address = %config.address,
			layer = config.layer,
			sync = config.load_synchronously,
			"service.instantiating"
		);
		let res = tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(Error::Cancelled(identity.clone())),
			res = self.inner.loader.instantiate(&config, &parent, cancel) => res.map_err(|source| match source {
				LoaderError::Cancelled { .. } => Error::Cancelled(identity.clone()),
				source => Error::Loader { identity: identity.clone(), source },
			}),
		};
		match res {
			Ok(object) => Ok(self.register(&config, identity, object)),
			Err(err) => {
				debug!(identity = %identity, error = %err, "service.load_failed");
				Err(err)
			}
		}
	}

	/// Wraps `object` in a presenter and registers it.
	///
	/// If `identity` is already registered, the new presenter is destroyed,
	/// `object` is released through the loader and the registered one returned.
	fn register(&self, config: &UiConfig, identity: &InstanceIdentity, object: UiObjectRef) -> Presenter {
		let factory = self.inner.state.read().factories.get(identity.presenter_type()).cloned();
		let parts = factory.map_or_else(PresenterParts::plain, |factory| factory(identity, &object));
		let presenter = Presenter::new(identity.clone(), config.layer, object, parts);

		let mut state = self.inner.state.write();
		if let Some(existing) = state.find(identity).cloned() {
			drop(state);
			warn!(identity = %identity, "service.duplicate_load_discarded");
			presenter.destroy();
			self.inner.loader.unload(presenter.object());
			return existing;
		}
		state.insert(presenter.clone());
		drop(state);

		debug!(identity = %identity, layer = config.layer, "service.loaded");
		self.emit(ServiceEvent::Loaded(identity.clone()));
		presenter
	}

	async fn open_identity(&self, identity: InstanceIdentity, data: Option<Box<dyn Any + Send>>, cancel: &CancellationToken) -> Result<Presenter> {
		let presenter = self.load_identity(identity, cancel).await?;
		self.open_loaded(&presenter, data).await?;
		Ok(presenter)
	}

	async fn open_loaded(&self, presenter: &Presenter, data: Option<Box<dyn Any + Send>>) -> Result<()> {
		let identity = presenter.identity();
		if self.inner.state.read().is_visible(identity) {
			warn!(identity = %identity, "service.already_open");
			return Ok(());
		}
		if let Some(data) = data {
			presenter.set_data(data).map_err(|source| Error::Presenter {
				identity: identity.clone(),
				source,
			})?;
		}

		{
			let mut state = self.inner.state.write();
			if !state.find(identity).is_some_and(|loaded| loaded.ptr_eq(presenter)) {
				return Err(Error::NotLoaded(identity.clone()));
			}
			if state.is_visible(identity) {
				drop(state);
				warn!(identity = %identity, "service.already_open");
				return Ok(());
			}
			state.visible.push(identity.clone());
		}

		let opening = presenter.open();
		let service = self.clone();
		let identity = identity.clone();
		let handle = tokio::spawn(async move {
			match opening.await {
				TransitionOutcome::Completed => {
					debug!(identity = %identity, "service.opened");
					service.emit(ServiceEvent::Opened(identity));
				}
				outcome => debug!(identity = %identity, ?outcome, "service.open_interrupted"),
			}
		});
		if let Err(err) = handle.await {
			warn!(identity = %presenter.identity(), %err, "service.open_task_failed");
		}
		Ok(())
	}

	fn close_identity(&self, identity: &InstanceIdentity, destroy: bool) -> Closing {
		let presenter = {
			let mut state = self.inner.state.write();
			if state.remove_visible(identity) { state.find(identity).cloned() } else { None }
		};
		let Some(presenter) = presenter else {
			warn!(identity = %identity, "service.close_not_visible");
			return Closing::idle();
		};

		let closing = presenter.close();
		let service = self.clone();
		let handle = tokio::spawn(async move {
			let outcome = closing.await;
			let identity = presenter.identity();
			match outcome {
				TransitionOutcome::Completed => {
					debug!(identity = %identity, "service.closed");
					service.emit(ServiceEvent::Closed(identity.clone()));
				}
				outcome => debug!(identity = %identity, ?outcome, "service.close_interrupted"),
			}
			if destroy && matches!(outcome, TransitionOutcome::Completed | TransitionOutcome::Unchanged) {
				service.unload_presenter(&presenter);
			}
			outcome
		});
		Closing { handle: Some(handle) }
	}

	/// Unloads `presenter` if it is still the registered instance for its identity.
	fn unload_presenter(&self, presenter: &Presenter) {
		let identity = presenter.identity();
		let removed = {
			let mut state = self.inner.state.write();
			if state.find(identity).is_some_and(|loaded| loaded.ptr_eq(presenter)) {
				state.remove(identity)
			} else {
				None
			}
		};
		match removed {
			Some(presenter) => self.release(&presenter),
			None => debug!(identity = %identity, "service.unload_skipped"),
		}
	}

	fn release(&self, presenter: &Presenter) {
		presenter.destroy();
		self.inner.loader.unload(presenter.object());
		debug!(identity = %presenter.identity(), "service.unloaded");
		self.emit(ServiceEvent::Unloaded(presenter.identity().clone()));
	}
}

impl fmt::Debug for UiService {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.read();
		f.debug_struct("UiService")
			.field("configs", &state.configs.len())
			.field("loaded", &state.loaded_count())
			.field("visible", &state.visible)
			.finish_non_exhaustive()
	}
}

/// Handle to a close sequence started by [`UiService::close_ui`].
///
/// Dropping it does not stop the close.
#[derive(Debug)]
pub struct Closing {
	handle: Option<JoinHandle<TransitionOutcome>>,
}

impl Closing {
	fn idle() -> Self {
		Self { handle: None }
	}

	/// True when nothing was visible to close.
	pub fn is_noop(&self) -> bool {
		self.handle.is_none()
	}

	/// Waits for the close sequence, including any unload it triggers.
	///
	/// Returns `None` for a no-op close.
	pub async fn wait(self) -> Option<TransitionOutcome> {
		match self.handle?.await {
			Ok(outcome) => Some(outcome),
			Err(error) => {
				warn!(%error, "service.close_task_failed");
				None
			}
		}
	}
}
