//! Request pipeline stages and the transitions allowed between them.

use crate::{DispatchError, Result};
use serde::Serialize;
use std::fmt;

/// Stage of a single inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Received,
    ModelCalled,
    Extracted,
    Validated,
    Executed,
    Rendered,
    Responded,
    Error,
}

impl PipelineStage {
    /// Whether `next` may follow `self`.
    ///
    /// `Error` is reachable only from the model, extraction and validation
    /// stages. Once a handler has run, the request always ends in
    /// `Responded`, whatever the handler reported.
    pub fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;

        matches!(
            (self, next),
            (Received, ModelCalled)
                | (ModelCalled, Extracted)
                | (ModelCalled, Error)
                | (Extracted, Validated)
                | (Extracted, Responded)
                | (Extracted, Error)
                | (Validated, Executed)
                | (Validated, Error)
                | (Executed, Rendered)
                | (Executed, Responded)
                | (Rendered, Responded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Responded | PipelineStage::Error)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "RECEIVED",
            PipelineStage::ModelCalled => "MODEL_CALLED",
            PipelineStage::Extracted => "EXTRACTED",
            PipelineStage::Validated => "VALIDATED",
            PipelineStage::Executed => "EXECUTED",
            PipelineStage::Rendered => "RENDERED",
            PipelineStage::Responded => "RESPONDED",
            PipelineStage::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Ordered record of the stages one request went through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineTrace {
    stages: Vec<PipelineStage>,
}

impl Default for PipelineTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineTrace {
    /// A trace starting at `Received`
    pub fn new() -> Self {
        Self {
            stages: vec![PipelineStage::Received],
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(PipelineStage::Received)
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn contains(&self, stage: PipelineStage) -> bool {
        self.stages.contains(&stage)
    }

    /// Move to `next`, rejecting transitions the pipeline does not allow.
    pub fn advance(&mut self, next: PipelineStage) -> Result<()> {
        let current = self.current();
        if !current.can_advance_to(next) {
            return Err(DispatchError::InvalidStateTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %current, to = %next, "Pipeline stage");
        self.stages.push(next);
        Ok(())
    }
}
