use stagehand_loader::UiObjectRef;
use stagehand_primitives::InstanceIdentity;

use crate::presenter::WeakPresenter;
use crate::transition::Transition;

/// Context handed to presenter and feature initialization hooks.
///
/// Holds only a weak back-reference to the presenter; the presenter owns its
/// features, never the other way round.
#[derive(Debug, Clone)]
pub struct PresenterContext {
	pub(crate) identity: InstanceIdentity,
	pub(crate) object: UiObjectRef,
	pub(crate) presenter: WeakPresenter,
}

impl PresenterContext {
	pub fn identity(&self) -> &InstanceIdentity {
		&self.identity
	}

	/// The resource driven by the presenter.
	pub fn object(&self) -> &UiObjectRef {
		&self.object
	}

	/// Weak handle to the owning presenter.
	pub fn presenter(&self) -> &WeakPresenter {
		&self.presenter
	}
}

/// Add-on lifecycle hooks attached to a presenter.
///
/// Hooks run in attachment order, synchronously, while the presenter is
/// mid-transition. They must not call back into [`Presenter::open`] or
/// [`Presenter::close`](crate::Presenter::close).
///
/// [`Presenter::open`]: crate::Presenter::open
pub trait Feature: Send + 'static {
	/// Name used in logs.
	fn name(&self) -> &'static str {
		std::any::type_name::<Self>()
	}

	/// Called once after the presenter is created.
	fn on_initialized(&mut self, _ctx: &PresenterContext) {}

	/// Called before the resource is activated.
	fn on_opening(&mut self) {}

	/// Called after the resource is activated.
	fn on_opened(&mut self) {}

	/// Called before the close transition starts; the resource is still visible.
	fn on_closing(&mut self) {}

	/// Called after the resource was deactivated.
	fn on_closed(&mut self) {}

	/// Transition capability, if this feature gates open/close completion.
	fn transitions(&self) -> Option<&dyn TransitionProvider> {
		None
	}
}

/// Gates open/close completion on asynchronous work.
///
/// The presenter reads the transitions right after the `on_opened` (resp.
/// `on_closing`) hooks and waits for all of them. When a new phase begins the
/// feature must resolve the transition of the phase it interrupts.
pub trait TransitionProvider {
	fn open_transition(&self) -> Transition {
		Transition::completed()
	}

	fn close_transition(&self) -> Transition {
		Transition::completed()
	}
}
