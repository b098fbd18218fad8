use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use stagehand_presenter::Presenter;
use stagehand_primitives::InstanceIdentity;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

type LoadResult = Option<Arc<Result<Presenter>>>;

/// Map of loads in progress, one per identity.
pub(super) type InFlightMap = Arc<Mutex<HashMap<InstanceIdentity, Arc<InFlightLoad>>>>;

/// Tracking state for one load in progress.
pub(super) struct InFlightLoad {
	tx: watch::Sender<LoadResult>,
	rx: watch::Receiver<LoadResult>,
}

/// Role of a caller after leader election.
pub(super) enum Election {
	Leader(LoadGuard),
	Waiter(Arc<InFlightLoad>),
}

/// Joins or starts the load for `identity`.
///
/// The first caller becomes the leader and performs the instantiation; later
/// callers wait on the leader's published result.
pub(super) fn elect(map: &InFlightMap, identity: &InstanceIdentity) -> Election {
	let mut loads = map.lock();
	if let Some(load) = loads.get(identity) {
		return Election::Waiter(Arc::clone(load));
	}
	let (tx, rx) = watch::channel(None);
	let load = Arc::new(InFlightLoad { tx, rx });
	loads.insert(identity.clone(), Arc::clone(&load));
	Election::Leader(LoadGuard {
		identity: identity.clone(),
		map: Arc::clone(map),
		load,
		completed: false,
	})
}

impl InFlightLoad {
	/// Waits for the leader's result, or for `cancel`.
	pub async fn wait(&self, identity: &InstanceIdentity, cancel: &CancellationToken) -> Result<Presenter> {
		let mut rx = self.rx.clone();
		let published = async move { rx.wait_for(Option::is_some).await.ok().and_then(|res| res.clone()) };
		tokio::select! {
			res = published => match res {
				Some(res) => (*res).clone(),
				None => Err(Error::LoadAborted(identity.clone())),
			},
			_ = cancel.cancelled() => Err(Error::Cancelled(identity.clone())),
		}
	}
}

/// Guard that un-wedges the in-flight map if the leader is dropped mid-load.
pub(super) struct LoadGuard {
	identity: InstanceIdentity,
	map: InFlightMap,
	load: Arc<InFlightLoad>,
	completed: bool,
}

impl LoadGuard {
	/// Publishes the leader's result to waiters and retires the in-flight entry.
	pub fn complete(mut self, res: Result<Presenter>) -> Result<Presenter> {
		self.completed = true;
		self.load.tx.send_replace(Some(Arc::new(res.clone())));
		self.retire();
		res
	}

	fn retire(&self) {
		let mut loads = self.map.lock();
		if loads.get(&self.identity).is_some_and(|load| Arc::ptr_eq(load, &self.load)) {
			loads.remove(&self.identity);
		}
	}
}

impl Drop for LoadGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		self.load.tx.send_replace(Some(Arc::new(Err(Error::LoadAborted(self.identity.clone())))));
		self.retire();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn dropped_leader_releases_waiters() {
		let map = InFlightMap::default();
		let identity = InstanceIdentity::default_of("Popup");
		let Election::Leader(guard) = elect(&map, &identity) else {
			panic!("first caller leads");
		};
		let Election::Waiter(load) = elect(&map, &identity) else {
			panic!("second caller waits");
		};

		drop(guard);
		assert!(map.lock().is_empty());
		let res = load.wait(&identity, &CancellationToken::new()).await;
		assert!(matches!(res, Err(Error::LoadAborted(_))));
		assert!(matches!(elect(&map, &identity), Election::Leader(_)));
	}

	#[tokio::test]
	async fn waiter_honors_its_own_cancellation() {
		let map = InFlightMap::default();
		let identity = InstanceIdentity::default_of("Popup");
		let _leader = elect(&map, &identity);
		let Election::Waiter(load) = elect(&map, &identity) else {
			panic!("second caller waits");
		};
		let cancel = CancellationToken::new();
		cancel.cancel();
		assert!(matches!(load.wait(&identity, &cancel).await, Err(Error::Cancelled(_))));
	}
}
