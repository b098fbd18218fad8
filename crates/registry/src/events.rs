use stagehand_presenter::PresenterState;
use stagehand_primitives::{InstanceIdentity, PresenterType, SetId};

/// Lifecycle notifications broadcast by [`UiService`](crate::UiService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
	/// An instance was instantiated and registered.
	Loaded(InstanceIdentity),
	/// An instance finished its open transition.
	Opened(InstanceIdentity),
	/// An instance finished its close transition.
	Closed(InstanceIdentity),
	/// An instance was released through the loader.
	Unloaded(InstanceIdentity),
	/// An instance was detached without being released.
	Removed(InstanceIdentity),
}

impl ServiceEvent {
	pub fn identity(&self) -> &InstanceIdentity {
		match self {
			Self::Loaded(id) | Self::Opened(id) | Self::Closed(id) | Self::Unloaded(id) | Self::Removed(id) => id,
		}
	}
}

/// One loaded instance in a [`ServiceSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedEntry {
	pub identity: InstanceIdentity,
	pub layer: i32,
	pub state: PresenterState,
}

/// Point-in-time view of a service for debugging and inspection tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSnapshot {
	/// Configured types, sorted.
	pub configured: Vec<PresenterType>,
	/// Loaded instances, sorted by identity.
	pub loaded: Vec<LoadedEntry>,
	/// Visible identities in open order.
	pub visible: Vec<InstanceIdentity>,
	/// Registered sets in registration order.
	pub sets: Vec<SetId>,
}

impl ServiceSnapshot {
	pub fn is_empty(&self) -> bool {
		self.loaded.is_empty() && self.visible.is_empty()
	}
}
