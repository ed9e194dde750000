use std::future::Future;

use metrics::counter;
use tracing::warn;

use super::types::RenderError;

/// Retries a render attempt once, and only when the failure matches the
/// transient predicate. No backoff, no loop.
#[derive(Debug, Clone, Copy)]
pub struct CrashRetryPolicy {
    is_transient: fn(&RenderError) -> bool,
}

impl Default for CrashRetryPolicy {
    fn default() -> Self {
        Self::new(RenderError::is_target_closed)
    }
}

impl CrashRetryPolicy {
    pub fn new(is_transient: fn(&RenderError) -> bool) -> Self {
        Self { is_transient }
    }

    /// Run `attempt(1)`; on a transient failure run `attempt(2)` and return
    /// whatever it yields.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T, RenderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RenderError>>,
    {
        match attempt(1).await {
            Err(err) if (self.is_transient)(&err) => {
                warn!(
                    target = "application::render::retry",
                    op = "retry::run",
                    error = %err,
                    "render target closed unexpectedly; retrying once on a fresh page"
                );
                counter!("pressroom_render_retry_total").increment(1);
                attempt(2).await
            }
            outcome => outcome,
        }
    }
}
