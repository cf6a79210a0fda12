//! Intent-to-action dispatch
//!
//! This crate bridges a free-text language model to typed, validated domain
//! actions. A request travels through a fixed pipeline:
//!
//! ```text
//! RECEIVED -> MODEL_CALLED -> EXTRACTED -> VALIDATED -> EXECUTED -> (RENDERED) -> RESPONDED
//! ```
//!
//! with an `ERROR` state reachable from the model, extraction and validation
//! stages. Domain failures (an unknown order, a calendar backend refusing a
//! write) are not errors here: they travel forward as `{success:false}`
//! results.
//!
//! ```rust,ignore
//! use dispatch::bootstrap::build_dispatcher;
//! use dispatch::config::DispatchConfig;
//! use dispatch::executor::QueryRequest;
//!
//! let config = DispatchConfig::load()?;
//! let dispatcher = build_dispatcher(&config)?;
//! let reply = dispatcher.handle(QueryRequest::new("查订单 123 状态")).await?;
//! ```

pub mod action;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod domain;
pub mod executor;
pub mod interpreter;
pub mod logging;
pub mod prompt;

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// External collaborator a call was made to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collaborator {
    /// The language model answering the intent prompt
    Model,
    /// The language model producing the conversational summary
    Renderer,
    /// The calendar backend
    Calendar,
    /// The order store
    OrderStore,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::Model => write!(f, "model"),
            Collaborator::Renderer => write!(f, "renderer"),
            Collaborator::Calendar => write!(f, "calendar"),
            Collaborator::OrderStore => write!(f, "order store"),
        }
    }
}

/// A collaborator was unreachable, too slow, or answered with garbage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The call did not finish before its deadline
    #[error("{collaborator} timed out after {after:?}")]
    Timeout {
        collaborator: Collaborator,
        after: Duration,
    },

    /// The collaborator could not be reached or refused service
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: Collaborator,
        message: String,
    },

    /// The collaborator answered, but not in a shape we understand
    #[error("{collaborator} returned an invalid response: {message}")]
    InvalidResponse {
        collaborator: Collaborator,
        message: String,
    },

    /// The collaborator reported an error
    #[error("{collaborator} error: {message}")]
    Failed {
        collaborator: Collaborator,
        message: String,
    },
}

impl ProviderError {
    /// Collaborator the failure came from
    pub fn collaborator(&self) -> Collaborator {
        match self {
            ProviderError::Timeout { collaborator, .. }
            | ProviderError::Unavailable { collaborator, .. }
            | ProviderError::InvalidResponse { collaborator, .. }
            | ProviderError::Failed { collaborator, .. } => *collaborator,
        }
    }

    /// Whether the failure is an elapsed deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }

    /// Classify a model-provider error.
    pub fn from_llm(collaborator: Collaborator, err: llm::LlmError) -> Self {
        use llm::LlmError;

        match err {
            LlmError::Timeout(after) => ProviderError::Timeout {
                collaborator,
                after,
            },
            LlmError::HttpError(e) if e.is_connect() => ProviderError::Unavailable {
                collaborator,
                message: e.to_string(),
            },
            LlmError::ServiceUnavailable(message) | LlmError::RateLimitExceeded(message) => {
                ProviderError::Unavailable {
                    collaborator,
                    message,
                }
            }
            LlmError::InvalidResponse(message) | LlmError::SerializationError(message) => {
                ProviderError::InvalidResponse {
                    collaborator,
                    message,
                }
            }
            other => ProviderError::Failed {
                collaborator,
                message: other.to_string(),
            },
        }
    }
}

/// The model reply could not be turned into structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// No brace-delimited object anywhere in the reply
    #[error("No JSON object found in model reply")]
    NoJsonFound,

    /// A candidate object was found but did not parse
    #[error("Malformed JSON in model reply: {0}")]
    MalformedJson(String),
}

/// A known action was called without honouring its contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required argument is absent or blank
    #[error("Missing required argument '{name}' for action '{action}'")]
    MissingArgument { name: String, action: String },
}

/// Order store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No order with this id
    #[error("Order not found")]
    NotFound(String),

    /// The order changed between read and write
    #[error("Version conflict on order {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    /// The backing store could not be used
    #[error("Order store unavailable: {0}")]
    Unavailable(String),
}

/// Mechanical failures that abort the pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Model or calendar collaborator failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Model reply could not be parsed
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The call named an action outside the registry
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// The call did not satisfy its action contract
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The inbound request itself was unusable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Pipeline stages were visited out of order
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    /// Stable machine-readable identifier for the error
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Provider(ProviderError::Timeout { .. }) => "provider_timeout",
            DispatchError::Provider(_) => "provider_error",
            DispatchError::Extraction(ExtractionError::NoJsonFound) => "no_json_found",
            DispatchError::Extraction(ExtractionError::MalformedJson(_)) => "malformed_json",
            DispatchError::UnsupportedAction(_) => "unsupported_action",
            DispatchError::Validation(ValidationError::MissingArgument { .. }) => {
                "missing_argument"
            }
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::InvalidStateTransition { .. } => "invalid_state_transition",
            DispatchError::Config(_) => "config_error",
        }
    }
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

pub use action::{ActionName, ActionResult, Domain, StructuredCall};
pub use executor::{Dispatcher, QueryReply, QueryRequest};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DispatchError::from(ExtractionError::NoJsonFound).kind(),
            "no_json_found"
        );
        assert_eq!(
            DispatchError::UnsupportedAction("fly".into()).kind(),
            "unsupported_action"
        );
        let timeout = ProviderError::Timeout {
            collaborator: Collaborator::Model,
            after: Duration::from_secs(3),
        };
        assert_eq!(DispatchError::from(timeout).kind(), "provider_timeout");
    }

    #[test]
    fn test_missing_argument_message() {
        let err = ValidationError::MissingArgument {
            name: "summary".into(),
            action: "create_event".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required argument 'summary' for action 'create_event'"
        );
    }

    #[test]
    fn test_llm_error_classification() {
        let err = ProviderError::from_llm(
            Collaborator::Model,
            llm::LlmError::Timeout(Duration::from_secs(5)),
        );
        assert!(err.is_timeout());
        assert_eq!(err.collaborator(), Collaborator::Model);

        let err = ProviderError::from_llm(
            Collaborator::Renderer,
            llm::LlmError::ServiceUnavailable("down".into()),
        );
        assert!(matches!(err, ProviderError::Unavailable { .. }));

        let err = ProviderError::from_llm(
            Collaborator::Model,
            llm::LlmError::AuthenticationError("bad key".into()),
        );
        assert!(matches!(err, ProviderError::Failed { .. }));
    }

    #[test]
    fn test_store_not_found_reads_as_domain_message() {
        assert_eq!(StoreError::NotFound("999".into()).to_string(), "Order not found");
    }
}
