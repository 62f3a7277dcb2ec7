// self
use crate::obs::{CommandKind, CommandOutcome};

/// Records a command outcome via the global metrics recorder (when enabled).
pub fn record_command_outcome(kind: CommandKind, outcome: CommandOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"hub_authorization_command_total",
			"command" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_command_outcome_noop_without_recorder() {
		record_command_outcome(CommandKind::SignUp, CommandOutcome::Failure);
	}
}
