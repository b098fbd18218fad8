use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use stagehand_primitives::UiConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{AssetLoader, Container, LoaderError, Result, UiObject, UiObjectRef};

/// Template registered with a [`PrefabLoader`].
#[derive(Debug, Clone, Default)]
pub struct Prefab {
	/// Name given to instantiated objects.
	pub name: String,
	/// Content copied into every instance.
	pub content: Bytes,
	/// Simulated instantiation latency for asynchronous loads.
	pub latency: Option<Duration>,
}

impl Prefab {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn content(mut self, content: impl Into<Bytes>) -> Self {
		self.content = content.into();
		self
	}

	#[must_use]
	pub fn latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}
}

/// In-memory registry of prefabs keyed by address.
///
/// Counts instantiations and releases so callers can assert on loader traffic.
#[derive(Debug, Default)]
pub struct PrefabLoader {
	prefabs: RwLock<HashMap<String, Prefab>>,
	instantiated: AtomicUsize,
	unloaded: AtomicUsize,
}

impl PrefabLoader {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a prefab under an address, replacing any previous one.
	pub fn register(&self, address: impl Into<String>, prefab: Prefab) {
		self.prefabs.write().insert(address.into(), prefab);
	}

	/// Builder form of [`Self::register`].
	#[must_use]
	pub fn with_prefab(self, address: impl Into<String>, prefab: Prefab) -> Self {
		self.register(address, prefab);
		self
	}

	/// Number of successful instantiations so far.
	pub fn instantiations(&self) -> usize {
		self.instantiated.load(Ordering::SeqCst)
	}

	/// Number of effective releases so far.
	pub fn unloads(&self) -> usize {
		self.unloaded.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl AssetLoader for PrefabLoader {
	async fn instantiate(&self, config: &UiConfig, parent: &Container, cancel: &CancellationToken) -> Result<UiObjectRef> {
		let prefab = self.prefabs.read().get(&config.address).cloned().ok_or_else(|| LoaderError::NotFound {
			address: config.address.clone(),
		})?;

		if !config.load_synchronously {
			let wait = async {
				match prefab.latency {
					Some(latency) => tokio::time::sleep(latency).await,
					None => tokio::task::yield_now().await,
				}
			};
			tokio::select! {
				_ = wait => {}
				_ = cancel.cancelled() => {
					return Err(LoaderError::Cancelled { address: config.address.clone() });
				}
			}
		}

		let object = UiObject::new(&prefab.name, &config.address, parent.clone(), prefab.content);
		self.instantiated.fetch_add(1, Ordering::SeqCst);
		debug!(address = %config.address, object = %object.id(), sync = config.load_synchronously, "prefab.instantiate");
		Ok(object)
	}

	fn unload(&self, object: &UiObjectRef) {
		if object.release() {
			self.unloaded.fetch_add(1, Ordering::SeqCst);
			trace!(object = %object.id(), "prefab.unload");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn loader() -> PrefabLoader {
		PrefabLoader::new().with_prefab("popup", Prefab::new("Popup").content("hello"))
	}

	#[tokio::test]
	async fn instantiates_registered_prefab() {
		let loader = loader();
		let object = loader
			.instantiate(&UiConfig::new("Popup", "popup", 2), &Container::for_layer(2), &CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(object.name(), "Popup");
		assert_eq!(object.content().as_ref(), b"hello");
		assert!(!object.is_active());
		assert_eq!(loader.instantiations(), 1);

		loader.unload(&object);
		loader.unload(&object);
		assert_eq!(loader.unloads(), 1);
	}

	#[tokio::test]
	async fn unknown_address_is_not_found() {
		let err = loader()
			.instantiate(&UiConfig::new("Hud", "hud", 0), &Container::for_layer(0), &CancellationToken::new())
			.await
			.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test(start_paused = true)]
	async fn cancellation_stops_a_slow_load() {
		let loader = PrefabLoader::new().with_prefab("slow", Prefab::new("Slow").latency(Duration::from_secs(5)));
		let cancel = CancellationToken::new();
		cancel.cancel();
		let err = loader
			.instantiate(&UiConfig::new("Slow", "slow", 0), &Container::for_layer(0), &cancel)
			.await
			.unwrap_err();
		assert!(matches!(err, LoaderError::Cancelled { .. }));
		assert_eq!(loader.instantiations(), 0);
	}

	#[tokio::test]
	async fn synchronous_load_ignores_latency() {
		let loader = PrefabLoader::new().with_prefab("slow", Prefab::new("Slow").latency(Duration::from_secs(3600)));
		let config = UiConfig::new("Slow", "slow", 0).load_synchronously(true);
		let object = loader.instantiate(&config, &Container::for_layer(0), &CancellationToken::new()).await.unwrap();
		assert_eq!(object.address(), "slow");
	}
}
