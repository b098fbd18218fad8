use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use super::resolve_after;
use crate::{Feature, PresenterContext, Transition, TransitionProvider, WeakPresenter};

/// One animation clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationClip {
	pub name: String,
	pub length: Duration,
}

impl AnimationClip {
	pub fn new(name: impl Into<String>, length: Duration) -> Self {
		Self { name: name.into(), length }
	}
}

/// Plays clips on the presenter's resource.
pub trait Animator: Send + Sync + 'static {
	fn play(&self, clip: &AnimationClip);

	/// Stops a clip before it finished.
	fn stop(&self, clip: &AnimationClip);
}

struct Playing {
	clip: AnimationClip,
	timer: Option<JoinHandle<()>>,
}

/// Plays an intro clip on open and an outro clip on close.
///
/// Each transition completes after its clip's length. A clip still playing
/// when the opposite transition starts is stopped and its transition resolved.
pub struct AnimationFeature {
	animator: Arc<dyn Animator>,
	intro: Option<AnimationClip>,
	outro: Option<AnimationClip>,
	presenter: WeakPresenter,
	open: Transition,
	close: Transition,
	playing: Option<Playing>,
}

impl AnimationFeature {
	pub fn new(animator: Arc<dyn Animator>) -> Self {
		Self {
			animator,
			intro: None,
			outro: None,
			presenter: WeakPresenter::default(),
			open: Transition::completed(),
			close: Transition::completed(),
			playing: None,
		}
	}

	#[must_use]
	pub fn intro(mut self, clip: AnimationClip) -> Self {
		self.intro = Some(clip);
		self
	}

	#[must_use]
	pub fn outro(mut self, clip: AnimationClip) -> Self {
		self.outro = Some(clip);
		self
	}

	fn stop_playing(&mut self) {
		if let Some(playing) = self.playing.take()
			&& let Some(timer) = playing.timer
			&& !timer.is_finished()
		{
			timer.abort();
			self.animator.stop(&playing.clip);
		}
	}

	fn play(&mut self, clip: Option<AnimationClip>, transition: &Transition) {
		let Some(clip) = clip else {
			transition.complete();
			return;
		};
		if let Some(presenter) = self.presenter.upgrade()
			&& !presenter.object().is_active()
		{
			warn!(identity = %presenter.identity(), clip = %clip.name, "animation.play_on_hidden_object");
		}
		self.animator.play(&clip);
		let timer = resolve_after(transition, clip.length);
		self.playing = Some(Playing { clip, timer });
	}
}

impl Feature for AnimationFeature {
	fn name(&self) -> &'static str {
		"animation"
	}

	fn on_initialized(&mut self, ctx: &PresenterContext) {
		self.presenter = ctx.presenter().clone();
	}

	fn on_opening(&mut self) {
		self.stop_playing();
		self.close.complete();
		self.open = Transition::pending();
	}

	fn on_opened(&mut self) {
		let open = self.open.clone();
		self.play(self.intro.clone(), &open);
	}

	fn on_closing(&mut self) {
		self.stop_playing();
		self.open.complete();
		self.close = Transition::pending();
		let close = self.close.clone();
		self.play(self.outro.clone(), &close);
	}

	fn on_closed(&mut self) {
		self.playing = None;
	}

	fn transitions(&self) -> Option<&dyn TransitionProvider> {
		Some(self)
	}
}

impl TransitionProvider for AnimationFeature {
	fn open_transition(&self) -> Transition {
		self.open.clone()
	}

	fn close_transition(&self) -> Transition {
		self.close.clone()
	}
}

impl Drop for AnimationFeature {
	fn drop(&mut self) {
		if let Some(timer) = self.playing.take().and_then(|playing| playing.timer) {
			timer.abort();
		}
	}
}
