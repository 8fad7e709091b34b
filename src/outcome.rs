//! Terminal result of a dispatched export (§6).

use crate::analyzer::Strategy;

#[derive(Debug, Clone)]
pub enum Outcome {
    Success { output_path: String, strategy: Strategy },
    Failed { reason: String, stderr_tail: String },
    Cancelled,
    TimedOut { mode: Strategy },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The "Failed: <category>: <summary>" / "Cancelled" user-visible string (§7).
    pub fn user_message(&self) -> String {
        match self {
            Outcome::Success { output_path, .. } => format!("Export complete: {output_path}"),
            Outcome::Failed { reason, .. } => format!("Failed: {reason}"),
            Outcome::Cancelled => "Cancelled".to_string(),
            Outcome::TimedOut { mode } => format!("Timed out during {mode:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_reports_output_path() {
        let outcome = Outcome::Success {
            output_path: "out.mp4".into(),
            strategy: Strategy::DirectCopy,
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.user_message(), "Export complete: out.mp4");
    }

    #[test]
    fn cancelled_message_is_exact() {
        assert_eq!(Outcome::Cancelled.user_message(), "Cancelled");
    }
}
