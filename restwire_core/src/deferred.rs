//! Cold calls: nothing is sent until a subscriber asks, and every subscriber
//! gets its own dispatch.

use crate::error::{ApiError, ArgumentError};
use futures::future::BoxFuture;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Job<T> = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Outcome delivered to a subscriber.
#[derive(Debug)]
pub enum Notification<T> {
    Completed(T),
    Failed(ApiError),
    Cancelled,
}

impl<T> Notification<T> {
    fn from_result(r: Result<T, ApiError>) -> Self {
        match r {
            Ok(v) => Notification::Completed(v),
            Err(ApiError::Cancelled) => Notification::Cancelled,
            Err(e) => Notification::Failed(e),
        }
    }
}

pub struct Deferred<T> {
    job: Job<T>,
    /// Parent of every per-subscription token.
    token: CancellationToken,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            job: Arc::clone(&self.job),
            token: self.token.clone(),
        }
    }
}

impl<T: Send + 'static> Deferred<T> {
    /// `job` receives a fresh child of `parent` (or of a private token) on
    /// every run.
    pub fn new<F>(parent: Option<CancellationToken>, job: F) -> Self
    where
        F: Fn(CancellationToken) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync + 'static,
    {
        Self {
            job: Arc::new(job),
            token: parent.unwrap_or_default(),
        }
    }

    /// A computation that fails the same way on every run.
    pub fn rejected(err: ArgumentError) -> Self {
        Self::failing(move || ApiError::Argument(err.clone()))
    }

    /// Every run fails with a fresh error from `make`.
    pub fn failing<F>(make: F) -> Self
    where
        F: Fn() -> ApiError + Send + Sync + 'static,
    {
        Self::new(None, move |_| {
            let err = make();
            Box::pin(async move { Err(err) })
        })
    }

    /// Perform one dispatch and wait for it.
    pub async fn run(&self) -> Result<T, ApiError> {
        (self.job)(self.token.child_token()).await
    }

    /// Start a dispatch in the background; `observer` is called exactly once.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: FnOnce(Notification<T>) + Send + 'static,
    {
        self.spawn(None, observer)
    }

    /// Like [`subscribe`](Self::subscribe), also stopping when `token` fires.
    pub fn subscribe_with<F>(&self, token: &CancellationToken, observer: F) -> Subscription
    where
        F: FnOnce(Notification<T>) + Send + 'static,
    {
        self.spawn(Some(token.clone()), observer)
    }

    fn spawn<F>(&self, extra: Option<CancellationToken>, observer: F) -> Subscription
    where
        F: FnOnce(Notification<T>) + Send + 'static,
    {
        let token = self.token.child_token();
        let fut = (self.job)(token.clone());
        let watch = token.clone();
        let handle = tokio::spawn(async move {
            let extra = extra.unwrap_or_default();
            let n = tokio::select! {
                biased;
                _ = watch.cancelled() => Notification::Cancelled,
                _ = extra.cancelled() => {
                    watch.cancel();
                    Notification::Cancelled
                }
                r = fut => Notification::from_result(r),
            };
            observer(n);
        });
        Subscription { token, handle }
    }
}

impl<T: Send + 'static> IntoFuture for Deferred<T> {
    type Output = Result<T, ApiError>;
    type IntoFuture = BoxFuture<'static, Result<T, ApiError>>;

    fn into_future(self) -> Self::IntoFuture {
        (self.job)(self.token.child_token())
    }
}

/// Handle on one background dispatch. Dropping it does not cancel.
pub struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the observer has been called.
    pub async fn finished(self) {
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Deferred<usize>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        let d = Deferred::new(None, move |token: CancellationToken| {
            let n = r.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                if n == 2 {
                    token.cancelled().await;
                    return Err(ApiError::Cancelled);
                }
                Ok(n)
            })
        });
        (d, runs)
    }

    #[tokio::test]
    async fn nothing_runs_until_subscribed() {
        let (d, runs) = counting();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(d.run().await.unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscriptions_are_independent() {
        let (d, runs) = counting();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = seen.clone();
        let first = d.subscribe(move |n| s1.lock().unwrap().push(format!("{n:?}")));
        first.finished().await;

        let s2 = seen.clone();
        let second = d.subscribe(move |n| s2.lock().unwrap().push(format!("{n:?}")));
        second.cancel();
        second.finished().await;

        let third = d.clone().await.unwrap();
        assert_eq!(third, 3);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Completed(1)".to_string(), "Cancelled".to_string()]
        );
    }

    #[tokio::test]
    async fn external_token_cancels_subscription() {
        let parent = CancellationToken::new();
        let d: Deferred<()> = Deferred::new(Some(parent.clone()), |token: CancellationToken| {
            Box::pin(async move {
                token.cancelled().await;
                Err(ApiError::Cancelled)
            })
        });
        let stop = CancellationToken::new();
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        let sub = d.subscribe_with(&stop, move |n| {
            *s.lock().unwrap() = Some(matches!(n, Notification::Cancelled));
        });
        stop.cancel();
        sub.finished().await;
        assert_eq!(*seen.lock().unwrap(), Some(true));
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn rejected_fails_every_run() {
        let d: Deferred<u8> = Deferred::rejected(ArgumentError::StreamConsumed("file".into()));
        assert!(matches!(d.run().await, Err(ApiError::Argument(_))));
        assert!(matches!(d.run().await, Err(ApiError::Argument(_))));
    }
}
