//! Batch operations over presenter sets.

use futures::future::try_join_all;
use stagehand_presenter::Presenter;
use stagehand_primitives::{InstanceIdentity, SetId, UiSetConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Closing, UiService};
use crate::{Error, Result};

impl UiService {
	/// Registered sets in registration order.
	pub fn sets(&self) -> Vec<UiSetConfig> {
		self.inner.state.read().sets.values().cloned().collect()
	}

	pub fn set(&self, set_id: impl Into<SetId>) -> Option<UiSetConfig> {
		self.inner.state.read().sets.get(&set_id.into()).cloned()
	}

	/// Starts loading every member of a set.
	///
	/// Each member loads on its own task under a child of `cancel`; the
	/// returned handles resolve in member order.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownSet`] if no set is registered under `set_id`.
	pub fn load_ui_set(&self, set_id: impl Into<SetId>, cancel: &CancellationToken) -> Result<Vec<JoinHandle<Result<Presenter>>>> {
		let members = self.set_members(set_id.into())?;
		Ok(members
			.into_iter()
			.map(|identity| {
				let service = self.clone();
				let cancel = cancel.child_token();
				tokio::spawn(async move { service.load_identity(identity, &cancel).await })
			})
			.collect())
	}

	/// Loads and opens every member of a set concurrently.
	///
	/// Completes when every member has opened. Members already visible are
	/// left as they are.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownSet`] for an unknown set, otherwise the first
	/// member failure.
	pub async fn open_ui_set(&self, set_id: impl Into<SetId>, cancel: &CancellationToken) -> Result<Vec<Presenter>> {
		let members = self.set_members(set_id.into())?;
		try_join_all(members.into_iter().map(|identity| self.open_identity(identity, None, cancel))).await
	}

	/// Closes every visible member of a set.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownSet`] if no set is registered under `set_id`.
	pub fn close_all_ui_set(&self, set_id: impl Into<SetId>) -> Result<Vec<Closing>> {
		let members = self.set_members(set_id.into())?;
		let visible: Vec<_> = {
			let state = self.inner.state.read();
			members.into_iter().filter(|identity| state.is_visible(identity)).collect()
		};
		Ok(visible.iter().map(|identity| self.close_identity(identity, false)).collect())
	}

	/// Unloads every loaded member of a set.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownSet`] if no set is registered under `set_id`.
	pub fn unload_ui_set(&self, set_id: impl Into<SetId>) -> Result<()> {
		let set_id = set_id.into();
		let members = self.set_members(set_id)?;
		let removed: Vec<_> = {
			let mut state = self.inner.state.write();
			members.iter().filter_map(|identity| state.remove(identity)).collect()
		};
		debug!(set_id = %set_id, count = removed.len(), "service.set_unloaded");
		for presenter in &removed {
			self.release(presenter);
		}
		Ok(())
	}

	/// Returns the members of a set, pruning members whose type has no config.
	fn set_members(&self, set_id: SetId) -> Result<Vec<InstanceIdentity>> {
		let mut state = self.inner.state.write();
		let state = &mut *state;
		let set = state.sets.get_mut(&set_id).ok_or(Error::UnknownSet(set_id))?;
		let configs = &state.configs;
		set.instances.retain(|member| {
			let configured = configs.contains_key(member.presenter_type());
			if !configured {
				warn!(set_id = %set_id, identity = %member, "service.set_member_pruned");
			}
			configured
		});
		Ok(set.instances.clone())
	}
}
