// crates.io
use tracing::{instrument::Instrumented, span::EnteredSpan};
// self
use crate::{_prelude::*, obs::CommandKind};

/// A span builder used by service commands.
#[derive(Clone, Debug)]
pub struct CommandSpan {
	span: tracing::Span,
}
impl CommandSpan {
	/// Creates a new span tagged with the provided command kind + stage.
	pub fn new(kind: CommandKind, stage: &'static str) -> Self {
		let span = tracing::info_span!("hub_authorization.command", command = kind.as_str(), stage);

		Self { span }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> EnteredSpan {
		self.span.entered()
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn command_span_enters_without_subscriber() {
		let _guard = CommandSpan::new(CommandKind::SignIn, "test").entered();
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = CommandSpan::new(CommandKind::RefreshToken, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
