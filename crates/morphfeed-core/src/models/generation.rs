//! Ephemeral record of one generation call.
//!
//! Runs are never persisted; they travel in run reports and log lines so a
//! fan-out's branches can be reconstructed from the correlation id alone.

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;
use crate::ids::CorrelationId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Success { url: String },
    Failure { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRun {
    /// Correlation id of the user action this branch belongs to.
    pub run_id: CorrelationId,
    /// 0-based index of the last attempt made.
    pub attempt: u32,
    pub recipe_id: String,
    pub outcome: RunOutcome,
}

impl GenerationRun {
    pub fn succeeded(
        run_id: CorrelationId,
        recipe_id: impl Into<String>,
        attempts: u32,
        url: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            attempt: attempts.saturating_sub(1),
            recipe_id: recipe_id.into(),
            outcome: RunOutcome::Success { url: url.into() },
        }
    }

    pub fn failed(
        run_id: CorrelationId,
        recipe_id: impl Into<String>,
        attempts: u32,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            attempt: attempts.saturating_sub(1),
            recipe_id: recipe_id.into(),
            outcome: RunOutcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        self.attempt + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_attempt_is_zero_based() {
        let run = GenerationRun::succeeded(CorrelationId::new(Uuid::nil()), "serene", 1, "u");
        assert_eq!(run.attempt, 0);
        assert_eq!(run.attempts(), 1);
        assert!(run.is_success());

        let run = GenerationRun::failed(
            CorrelationId::new(Uuid::nil()),
            "serene",
            4,
            FailureKind::Server,
            "HTTP 503",
        );
        assert_eq!(run.attempt, 3);
        assert!(!run.is_success());
    }

    #[test]
    fn test_outcome_serialization() {
        let run = GenerationRun::failed(
            CorrelationId::new(Uuid::nil()),
            "anime",
            1,
            FailureKind::Auth,
            "denied",
        );
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["outcome"]["outcome"], "failure");
        assert_eq!(json["outcome"]["kind"], "auth");
    }
}
