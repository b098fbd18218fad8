use std::collections::HashMap;

use indexmap::IndexMap;
use stagehand_loader::Container;
use stagehand_presenter::Presenter;
use stagehand_primitives::{InstanceIdentity, PresenterType, SetId, UiConfig, UiSetConfig};

use super::PresenterFactory;

/// Outcome of resolving an omitted instance address.
pub(super) enum Resolved {
	/// No instance of the type is loaded; the default identity applies.
	Default(InstanceIdentity),
	/// Exactly one instance is loaded.
	Single(InstanceIdentity),
	/// Several instances are loaded; the first one is reported.
	Ambiguous { first: InstanceIdentity, matches: usize },
}

/// Registry indices, mutated only under the service's state lock.
///
/// `instances` and `visible` must stay consistent: an identity may be visible
/// only while it has a live instance entry.
#[derive(Default)]
pub(super) struct ServiceState {
	pub configs: HashMap<PresenterType, UiConfig>,
	pub sets: IndexMap<SetId, UiSetConfig>,
	pub factories: HashMap<PresenterType, PresenterFactory>,
	/// Loaded presenters per type, in load order.
	pub instances: HashMap<PresenterType, Vec<Presenter>>,
	/// Visible identities, in open order.
	pub visible: Vec<InstanceIdentity>,
	containers: HashMap<i32, Container>,
}

impl ServiceState {
	pub fn find(&self, identity: &InstanceIdentity) -> Option<&Presenter> {
		self.instances
			.get(identity.presenter_type())?
			.iter()
			.find(|presenter| presenter.identity() == identity)
	}

	pub fn contains(&self, identity: &InstanceIdentity) -> bool {
		self.find(identity).is_some()
	}

	pub fn insert(&mut self, presenter: Presenter) {
		self.instances.entry(presenter.identity().presenter_type().clone()).or_default().push(presenter);
	}

	/// Removes an instance and its visible entry.
	pub fn remove(&mut self, identity: &InstanceIdentity) -> Option<Presenter> {
		self.remove_visible(identity);
		let list = self.instances.get_mut(identity.presenter_type())?;
		let index = list.iter().position(|presenter| presenter.identity() == identity)?;
		let presenter = list.remove(index);
		if list.is_empty() {
			self.instances.remove(identity.presenter_type());
		}
		Some(presenter)
	}

	/// Drops every instance and visible entry.
	pub fn drain(&mut self) -> Vec<Presenter> {
		self.visible.clear();
		self.instances.drain().flat_map(|(_, list)| list).collect()
	}

	pub fn is_visible(&self, identity: &InstanceIdentity) -> bool {
		self.visible.contains(identity)
	}

	/// Removes `identity` from the visible list; returns whether it was there.
	pub fn remove_visible(&mut self, identity: &InstanceIdentity) -> bool {
		let before = self.visible.len();
		self.visible.retain(|visible| visible != identity);
		self.visible.len() != before
	}

	pub fn loaded_count(&self) -> usize {
		self.instances.values().map(Vec::len).sum()
	}

	pub fn resolve(&self, presenter_type: &PresenterType) -> Resolved {
		match self.instances.get(presenter_type).map(Vec::as_slice).unwrap_or_default() {
			[] => Resolved::Default(InstanceIdentity::default_of(presenter_type.clone())),
			[only] => Resolved::Single(only.identity().clone()),
			[first, rest @ ..] => Resolved::Ambiguous {
				first: first.identity().clone(),
				matches: rest.len() + 1,
			},
		}
	}

	pub fn container(&mut self, layer: i32) -> Container {
		self.containers.entry(layer).or_insert_with(|| Container::for_layer(layer)).clone()
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;
	use stagehand_loader::UiObject;
	use stagehand_presenter::PresenterParts;

	use super::*;

	fn presenter(ty: &str, address: &str) -> Presenter {
		let object = UiObject::new(ty, ty, Container::for_layer(0), Bytes::new());
		Presenter::new(InstanceIdentity::new(ty, address), 0, object, PresenterParts::plain())
	}

	#[test]
	fn remove_clears_visible_entry() {
		let mut state = ServiceState::default();
		let popup = presenter("Popup", "");
		let id = popup.identity().clone();
		state.insert(popup);
		state.visible.push(id.clone());

		assert!(state.remove(&id).is_some());
		assert!(!state.is_visible(&id));
		assert_eq!(state.loaded_count(), 0);
		assert!(state.instances.is_empty());
	}

	#[test]
	fn resolve_reports_default_single_and_ambiguous() {
		let mut state = ServiceState::default();
		let ty = PresenterType::new("Popup");
		assert!(matches!(state.resolve(&ty), Resolved::Default(id) if id.is_default()));

		state.insert(presenter("Popup", "a"));
		assert!(matches!(state.resolve(&ty), Resolved::Single(id) if id.address() == "a"));

		state.insert(presenter("Popup", "b"));
		assert!(matches!(state.resolve(&ty), Resolved::Ambiguous { first, matches: 2 } if first.address() == "a"));
	}

	#[test]
	fn containers_are_shared_per_layer() {
		let mut state = ServiceState::default();
		assert_eq!(state.container(3), state.container(3));
		assert_ne!(state.container(3), state.container(4));
	}
}
