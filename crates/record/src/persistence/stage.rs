//! Per-call progress of a write operation

use std::fmt;
use std::time::Instant;

/// Stages of insert, update and delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Validating,
    BeforeHook,
    Executing,
    AfterHook,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::BeforeHook => "before-hook",
            Stage::Executing => "executing",
            Stage::AfterHook => "after-hook",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one operation through its stages and traces each transition.
///
/// Stages only move forward; `Failed` is reachable from any non-terminal
/// stage.
#[derive(Debug)]
pub(crate) struct OperationTrace {
    operation: &'static str,
    table: String,
    stage: Stage,
    started: Instant,
}

impl OperationTrace {
    pub(crate) fn new(operation: &'static str, table: &str) -> Self {
        tracing::trace!("{} {}: {}", operation, table, Stage::Validating);
        Self {
            operation,
            table: table.to_string(),
            stage: Stage::Validating,
            started: Instant::now(),
        }
    }

    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to a later stage; returns false when the move is not allowed
    pub(crate) fn advance(&mut self, next: Stage) -> bool {
        if self.stage.is_terminal() || next <= self.stage || next == Stage::Failed {
            return false;
        }
        tracing::trace!("{} {}: {} -> {}", self.operation, self.table, self.stage, next);
        self.stage = next;
        true
    }

    pub(crate) fn done(&mut self) {
        if self.advance(Stage::Done) {
            tracing::debug!(
                "{} {} completed in {:.3}s",
                self.operation,
                self.table,
                self.started.elapsed().as_secs_f64()
            );
        }
    }

    /// The operation stopped before `Done`, declined or with an error
    pub(crate) fn fail(&mut self, reason: &str) {
        if self.stage.is_terminal() {
            return;
        }
        tracing::trace!("{} {}: {} -> failed ({})", self.operation, self.table, self.stage, reason);
        self.stage = Stage::Failed;
    }
}
