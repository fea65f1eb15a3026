//! Primary-then-secondary provider selection and best-effort sub-requests.

use std::{future::Future, sync::Arc};

use tracing::warn;

use crate::{error::WeatherError, provider::WeatherProvider};

/// Run `attempt` against the primary provider when one is configured, and
/// against the secondary provider if that fails.
///
/// There is exactly one hop. A [`WeatherError::NotFound`] raised by the
/// last attempt is returned as-is; any other failure becomes
/// [`WeatherError::ProviderUnavailable`].
pub async fn primary_then_fallback<T, F, Fut>(
    operation: &'static str,
    primary: Option<&Arc<dyn WeatherProvider>>,
    secondary: &Arc<dyn WeatherProvider>,
    attempt: F,
) -> Result<T, WeatherError>
where
    F: Fn(Arc<dyn WeatherProvider>) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    if let Some(primary) = primary {
        match attempt(Arc::clone(primary)).await {
            Ok(value) => return Ok(value),
            Err(err) => warn!(
                provider = %primary.id(),
                fallback = %secondary.id(),
                operation,
                error = %format!("{err:#}"),
                "primary provider failed, falling back"
            ),
        }
    }

    attempt(Arc::clone(secondary))
        .await
        .map_err(|err| match err.downcast::<WeatherError>() {
            Ok(WeatherError::NotFound(query)) => WeatherError::NotFound(query),
            Ok(other) => WeatherError::ProviderUnavailable { operation, source: other.into() },
            Err(source) => WeatherError::ProviderUnavailable { operation, source },
        })
}

/// Await an optional sub-request, logging and discarding its failure.
pub async fn best_effort<T, Fut>(what: &'static str, fut: Fut) -> Option<T>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(what, error = %format!("{err:#}"), "optional data unavailable");
            None
        }
    }
}
