//! Deadlines for calls to external collaborators

use crate::{Collaborator, ProviderError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;

/// Run `operation` under a deadline.
///
/// An elapsed deadline becomes [`ProviderError::Timeout`] naming the
/// collaborator; errors from the operation itself pass through unchanged.
///
/// ```rust,ignore
/// let text = call_with_timeout(Collaborator::Model, Duration::from_secs(30), async {
///     llm::complete(model, history, false, None)
///         .await
///         .map_err(|e| ProviderError::from_llm(Collaborator::Model, e))
/// })
/// .await?;
/// ```
pub async fn call_with_timeout<F, T>(
    collaborator: Collaborator,
    after: Duration,
    operation: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio_timeout(after, operation).await {
        Ok(result) => result,
        Err(_elapsed) => {
            tracing::warn!(%collaborator, timeout_ms = after.as_millis() as u64, "Call timed out");
            Err(ProviderError::Timeout {
                collaborator,
                after,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = call_with_timeout(Collaborator::Model, Duration::from_secs(1), async {
            Ok::<_, ProviderError>(42)
        })
        .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_is_provider_timeout() {
        let result = call_with_timeout(Collaborator::Calendar, Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ProviderError>(())
        })
        .await;

        assert_eq!(
            result,
            Err(ProviderError::Timeout {
                collaborator: Collaborator::Calendar,
                after: Duration::from_millis(50),
            })
        );
    }

    #[tokio::test]
    async fn test_operation_error_passes_through() {
        let err = ProviderError::Failed {
            collaborator: Collaborator::Model,
            message: "boom".into(),
        };
        let result =
            call_with_timeout(Collaborator::Model, Duration::from_secs(1), async {
                Err::<(), _>(err.clone())
            })
            .await;
        assert_eq!(result, Err(err));
    }
}
