//! Presenter registry.
//!
//! [`UiService`] owns presenter configuration, the loaded-instance store, the
//! visible list and named presenter sets. It resolves or instantiates
//! presenters through an [`AssetLoader`](stagehand_loader::AssetLoader),
//! drives their open/close transitions and releases them on unload.
//!
//! ```no_run
//! # async fn demo() -> stagehand_registry::Result<()> {
//! use std::sync::Arc;
//!
//! use stagehand_loader::{Prefab, PrefabLoader};
//! use stagehand_primitives::{UiConfig, UiConfigs};
//! use stagehand_registry::UiService;
//! use tokio_util::sync::CancellationToken;
//!
//! let loader = Arc::new(PrefabLoader::new().with_prefab("popup", Prefab::new("Popup")));
//! let service = UiService::new(loader);
//! service.init(UiConfigs::new().with_config(UiConfig::new("Popup", "popup", 5)))?;
//!
//! let _popup = service.open_ui("Popup", None, &CancellationToken::new()).await?;
//! assert!(service.is_visible("Popup", None));
//! service.close_ui("Popup", None, true)?.wait().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use stagehand_loader::LoaderError;
use stagehand_presenter::PresenterError;
use stagehand_primitives::{ConfigError, InstanceIdentity, PresenterType, SetId};

mod events;
mod service;

pub use events::{LoadedEntry, ServiceEvent, ServiceSnapshot};
pub use service::{Closing, PresenterFactory, UiService};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Service failures.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// No config is registered for the type.
	#[error("no config registered for presenter type {0}")]
	MissingConfig(PresenterType),
	/// No instance is loaded under the identity.
	#[error("{0} is not loaded")]
	NotLoaded(InstanceIdentity),
	/// No set is registered under the id.
	#[error("{0} is not registered")]
	UnknownSet(SetId),
	/// The load was cancelled before the instance was registered.
	#[error("load of {0} was cancelled")]
	Cancelled(InstanceIdentity),
	/// The leading load was dropped before publishing a result.
	#[error("load of {0} was aborted before completing")]
	LoadAborted(InstanceIdentity),
	/// An address-less request matched several instances where a guess is unsafe.
	#[error("address of {presenter_type} is ambiguous across {matches} loaded instances")]
	AmbiguousAddress { presenter_type: PresenterType, matches: usize },
	/// The asset loader failed.
	#[error("loading {identity} failed: {source}")]
	Loader {
		identity: InstanceIdentity,
		#[source]
		source: LoaderError,
	},
	/// Configuration was rejected.
	#[error(transparent)]
	Config(Arc<ConfigError>),
	/// The presenter rejected a request.
	#[error("presenter {identity}: {source}")]
	Presenter {
		identity: InstanceIdentity,
		#[source]
		source: PresenterError,
	},
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	NotFound,
	InvalidConfiguration,
	Cancelled,
	AmbiguousAddress,
	LoaderFailure,
	Presenter,
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::MissingConfig(_) | Self::NotLoaded(_) | Self::UnknownSet(_) => ErrorKind::NotFound,
			Self::Loader { source, .. } if source.is_not_found() => ErrorKind::NotFound,
			Self::Loader { .. } => ErrorKind::LoaderFailure,
			Self::Cancelled(_) | Self::LoadAborted(_) => ErrorKind::Cancelled,
			Self::AmbiguousAddress { .. } => ErrorKind::AmbiguousAddress,
			Self::Config(_) => ErrorKind::InvalidConfiguration,
			Self::Presenter { .. } => ErrorKind::Presenter,
		}
	}

	/// True when a waiting load should retry because another caller's load went away.
	pub(crate) fn is_foreign_abort(&self) -> bool {
		matches!(self, Self::Cancelled(_) | Self::LoadAborted(_))
	}
}

impl From<ConfigError> for Error {
	fn from(error: ConfigError) -> Self {
		Self::Config(Arc::new(error))
	}
}
