//! Action registry: resolves action names and invokes domain handlers
//!
//! One handler serves each enabled [`Domain`]. Resolution rejects names that
//! are unknown or belong to a disabled domain; dispatch accepts only a
//! [`ValidatedCall`] and never lets a handler failure escape as an error.

use super::{ActionContract, ActionName, ActionResult, Domain, ValidatedCall};
use crate::executor::guard::call_with_timeout;
use crate::executor::retry::{retry_with_backoff, RetryConfig};
use crate::{DispatchError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Executes the actions of one domain.
///
/// Implementations report expected failures (unknown order, provider
/// refusal) as [`ActionResult::Failure`]; there is no error channel.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, call: &ValidatedCall) -> ActionResult;
}

/// Deadline and retry policy applied around every handler call
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPolicy {
    /// Deadline for one handler invocation
    pub action_timeout: Duration,
    /// Retries granted to idempotent reads that time out
    pub read_retries: u32,
    /// Backoff before the retry, in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(15),
            read_retries: 1,
            retry_backoff_ms: 200,
        }
    }
}

/// Enum-indexed table of domain handlers
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: BTreeMap<Domain, Arc<dyn ActionHandler>>,
    policy: ExecutionPolicy,
}

impl ActionRegistry {
    /// Create an empty registry with the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the execution policy
    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable `domain`, served by `handler`
    pub fn with_domain(mut self, domain: Domain, handler: Arc<dyn ActionHandler>) -> Self {
        self.register(domain, handler);
        self
    }

    /// Enable `domain`, replacing any previous handler
    pub fn register(&mut self, domain: Domain, handler: Arc<dyn ActionHandler>) {
        tracing::debug!(%domain, "Registered domain handler");
        self.handlers.insert(domain, handler);
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    pub fn is_enabled(&self, domain: Domain) -> bool {
        self.handlers.contains_key(&domain)
    }

    /// Enabled domains in declaration order
    pub fn enabled_domains(&self) -> Vec<Domain> {
        self.handlers.keys().copied().collect()
    }

    /// Contracts of every enabled action
    pub fn contracts(&self) -> Vec<&'static ActionContract> {
        ActionName::ALL
            .iter()
            .filter(|action| self.is_enabled(action.domain()))
            .map(|action| action.contract())
            .collect()
    }

    /// Resolve a wire name to an enabled action
    pub fn resolve(&self, name: &str) -> Result<ActionName> {
        match name.parse::<ActionName>() {
            Ok(action) if self.is_enabled(action.domain()) => Ok(action),
            _ => Err(DispatchError::UnsupportedAction(name.to_string())),
        }
    }

    /// Invoke the handler for `call` under the execution policy.
    ///
    /// A timed-out idempotent read is retried up to `read_retries` times;
    /// every other action runs exactly once.
    pub async fn dispatch(&self, call: &ValidatedCall) -> ActionResult {
        let action = call.action();
        let domain = action.domain();

        let handler = match self.handlers.get(&domain) {
            Some(handler) => Arc::clone(handler),
            None => return ActionResult::failure(format!("Domain {} is disabled", domain)),
        };

        let retry = if action.is_idempotent_read() {
            RetryConfig::new(self.policy.read_retries)
                .with_initial_backoff(self.policy.retry_backoff_ms)
        } else {
            RetryConfig::none()
        };
        let timeout = self.policy.action_timeout;
        let collaborator = domain.collaborator();

        let outcome = retry_with_backoff(&retry, action.as_str(), || {
            let handler = Arc::clone(&handler);
            async move {
                call_with_timeout(collaborator, timeout, async {
                    Ok(handler.handle(call).await)
                })
                .await
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(action = %action, error = %err, "Action did not complete");
                ActionResult::failure(err.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("domains", &self.enabled_domains())
            .field("policy", &self.policy)
            .finish()
    }
}
