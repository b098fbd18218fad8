//! Presenter lifecycle state machine.
//!
//! A [`Presenter`] wraps one instantiated [`UiObject`](stagehand_loader::UiObject)
//! and drives it through open and close transitions. Behavior is split in two:
//!
//! - [`PresenterBehavior`]: the presenter's own hooks (one per presenter).
//! - [`Feature`]: add-on hook units, any number per presenter, run in
//!   attachment order. A feature that also exposes a [`TransitionProvider`]
//!   gates completion of open/close on its own [`Transition`] signals.
//!
//! The resource is activated before any open transition starts and is
//! deactivated only after every close transition has settled.

mod behavior;
mod feature;
pub mod features;
mod presenter;
mod transition;

pub use behavior::{DataPresenter, PlainPresenter, PresenterBehavior, PresenterParts, downcast_data};
pub use feature::{Feature, PresenterContext, TransitionProvider};
pub use presenter::{Presenter, PresenterState, TransitionOutcome, WeakPresenter};
pub use transition::Transition;

/// Presenter failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PresenterError {
	/// The presenter does not take data.
	#[error("presenter does not accept data")]
	DataNotAccepted,
	/// The presenter takes data of another type.
	#[error("presenter expected data of type {expected}")]
	DataType { expected: &'static str },
	/// The presenter was already destroyed.
	#[error("presenter {0} was destroyed")]
	Destroyed(String),
}
