//! Pipeline state machine
//!
//! Legal edges:
//! - `Idle → Retrieving → Filtering → BuildingContext → Generating → Done`
//! - `Filtering → Done` when no chunk clears the threshold
//! - any non-terminal state `→ Failed`

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pipeline execution states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    /// Query accepted, nothing issued yet
    Idle,
    /// Waiting on the retriever
    Retrieving,
    /// Applying the confidence threshold
    Filtering,
    /// Rendering the context block
    BuildingContext,
    /// Waiting on the generator
    Generating,
    /// Result produced (terminal)
    Done,
    /// An external call failed (terminal)
    Failed,
}

impl PipelineState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// Whether `self → next` is a legal edge
    pub fn can_advance_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Retrieving)
            | (Retrieving, Filtering)
            | (Filtering, BuildingContext)
            | (Filtering, Done)
            | (BuildingContext, Generating)
            | (Generating, Done) => true,
            _ => false,
        }
    }
}

/// Visited states of one pipeline execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    history: Vec<PipelineState>,
}

impl PipelineRun {
    /// Start a run in `Idle`
    pub fn new() -> Self {
        Self {
            history: vec![PipelineState::Idle],
        }
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    /// Every state entered so far, in order, starting with `Idle`
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to `next`, refusing illegal or repeated transitions
    pub fn advance(&mut self, next: PipelineState) -> Result<()> {
        let current = self.state();
        if !current.can_advance_to(next) {
            return Err(Error::internal(format!(
                "Illegal pipeline transition {:?} -> {:?}",
                current, next
            )));
        }
        tracing::debug!("Pipeline {:?} -> {:?}", current, next);
        self.history.push(next);
        Ok(())
    }

    /// Mark the run failed unless it already ended
    pub fn fail(&mut self) {
        if !self.state().is_terminal() {
            self.history.push(PipelineState::Failed);
        }
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
