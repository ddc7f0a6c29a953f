//! Description of an outbound operation whose response should be awaited.

use crate::error::InteractionError;
use crate::filters::{self, MessageFilter};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::time::Duration;

/// Default time to wait for the first reply.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(15);

/// Default silence after which a multi-message reply is considered complete.
pub const DEFAULT_CONSECUTIVE_WAIT: Duration = Duration::from_secs(2);

pub(crate) type ActionFn<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, InteractionError>> + Send>;

/// An action to invoke plus the criteria for recognizing and bounding its response.
pub struct AwaitableAction<T> {
    func: ActionFn<T>,
    filters: MessageFilter,
    max_wait: Duration,
    num_expected: Option<usize>,
    consecutive_wait: Option<Duration>,
}

impl<T: Send + 'static> AwaitableAction<T> {
    /// Wrap an async closure.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, InteractionError>> + Send + 'static,
    {
        Self::from_boxed(Box::new(move || func().boxed()))
    }

    /// Wrap a synchronous, possibly blocking closure. It runs on the blocking pool.
    pub fn blocking<F>(func: F) -> Self
    where
        F: FnOnce() -> Result<T, InteractionError> + Send + 'static,
    {
        Self::from_boxed(Box::new(move || {
            async move { tokio::task::spawn_blocking(func).await? }.boxed()
        }))
    }

    fn from_boxed(func: ActionFn<T>) -> Self {
        Self {
            func,
            filters: filters::all(),
            max_wait: DEFAULT_MAX_WAIT,
            num_expected: None,
            consecutive_wait: Some(DEFAULT_CONSECUTIVE_WAIT),
        }
    }
}

impl<T> AwaitableAction<T> {
    pub fn with_filters(mut self, filters: MessageFilter) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_num_expected(mut self, num_expected: Option<usize>) -> Self {
        self.num_expected = num_expected;
        self
    }

    /// Set the quiet period; `None` or zero returns as soon as the first reply arrives.
    pub fn with_consecutive_wait(mut self, consecutive_wait: Option<Duration>) -> Self {
        self.consecutive_wait = consecutive_wait;
        self
    }

    pub fn filters(&self) -> &MessageFilter {
        &self.filters
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn num_expected(&self) -> Option<usize> {
        self.num_expected
    }

    pub fn consecutive_wait(&self) -> Option<Duration> {
        self.consecutive_wait.filter(|d| !d.is_zero())
    }

    pub(crate) fn into_func(self) -> ActionFn<T> {
        self.func
    }
}

impl<T> std::fmt::Debug for AwaitableAction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwaitableAction")
            .field("filters", &self.filters)
            .field("max_wait", &self.max_wait)
            .field("num_expected", &self.num_expected)
            .field("consecutive_wait", &self.consecutive_wait)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let action = AwaitableAction::new(|| async { Ok(()) });
        assert_eq!(action.max_wait(), Duration::from_secs(15));
        assert_eq!(action.consecutive_wait(), Some(Duration::from_secs(2)));
        assert_eq!(action.num_expected(), None);
    }

    #[test]
    fn test_zero_consecutive_wait_is_unset() {
        let action = AwaitableAction::new(|| async { Ok(()) })
            .with_consecutive_wait(Some(Duration::ZERO))
            .with_num_expected(Some(2))
            .with_max_wait(Duration::from_secs(3));
        assert_eq!(action.consecutive_wait(), None);
        assert_eq!(action.num_expected(), Some(2));
        assert_eq!(action.max_wait(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_blocking_action_runs_off_the_runtime() {
        let action = AwaitableAction::blocking(|| {
            std::thread::sleep(Duration::from_millis(10));
            Ok(21 * 2)
        });
        let result = (action.into_func())().await.unwrap();
        assert_eq!(result, 42);
    }
}
