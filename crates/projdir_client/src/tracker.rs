//! Debounced, one-shot view tracking for a mounted project page.
//!
//! # Responsibility
//! - Schedule one increment per mount after `TrackerConfig::delay`.
//! - Cancel the pending increment when the tracker is unmounted or dropped.
//! - Keep an optimistic displayed count for the page.
//!
//! # Invariants
//! - The incrementer is called at most once per tracker.
//! - Unmounting before the delay elapses means the incrementer is never called.
//! - Once the delay has elapsed the request runs to completion even if the
//!   tracker is unmounted while it is in flight.
//! - The displayed count is not corrected to the server value; callers may
//!   reconcile through `DisplayedViews::set` in the result callback.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{TrackerError, ViewCount, ViewIncrementer};

/// Quiet period before a visit is counted.
pub const DEFAULT_VIEW_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub delay: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_VIEW_DELAY,
        }
    }
}

/// Shared handle to the count a page displays.
#[derive(Debug, Clone, Default)]
pub struct DisplayedViews(Arc<AtomicI64>);

impl DisplayedViews {
    pub fn new(initial: i64) -> Self {
        Self(Arc::new(AtomicI64::new(initial)))
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, views: i64) {
        self.0.store(views, Ordering::SeqCst);
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// View tracker bound to one mounted project page.
pub struct ViewTracker {
    project_id: Uuid,
    config: TrackerConfig,
    incrementer: Arc<dyn ViewIncrementer>,
    displayed: DisplayedViews,
    fired: Arc<AtomicBool>,
    pending: Option<JoinHandle<()>>,
}

impl ViewTracker {
    pub fn new(
        project_id: Uuid,
        initial_views: i64,
        incrementer: Arc<dyn ViewIncrementer>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            project_id,
            config,
            incrementer,
            displayed: DisplayedViews::new(initial_views),
            fired: Arc::new(AtomicBool::new(false)),
            pending: None,
        }
    }

    /// Schedules the increment. `on_result` receives the server outcome.
    ///
    /// Returns `Ok(false)` without scheduling when this tracker already has a
    /// pending or fired increment.
    ///
    /// # Errors
    /// `NoRuntime` when called outside a Tokio runtime.
    pub fn start<F>(&mut self, on_result: F) -> Result<bool, TrackerError>
    where
        F: FnOnce(Result<ViewCount, TrackerError>) + Send + 'static,
    {
        if self.pending.is_some() || self.fired.load(Ordering::SeqCst) {
            debug!(
                "event=view_track module=tracker status=skip project_id={}",
                self.project_id
            );
            return Ok(false);
        }
        let runtime = Handle::try_current().map_err(|_| {
            warn!(
                "event=view_track module=tracker status=error project_id={} error_code=no_runtime",
                self.project_id
            );
            TrackerError::NoRuntime
        })?;

        let project_id = self.project_id;
        let delay = self.config.delay;
        let incrementer = Arc::clone(&self.incrementer);
        let displayed = self.displayed.clone();
        let fired = Arc::clone(&self.fired);

        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            displayed.bump();

            // Detached from `pending`: unmount only cancels the delay.
            tokio::spawn(async move {
                let result = incrementer.increment(project_id).await;
                match &result {
                    Ok(count) => info!(
                        "event=view_track module=tracker status=ok project_id={} views={}",
                        project_id, count.views
                    ),
                    Err(err) => warn!(
                        "event=view_track module=tracker status=error project_id={} error={}",
                        project_id, err
                    ),
                }
                on_result(result);
            });
        }));
        Ok(true)
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    pub fn displayed(&self) -> DisplayedViews {
        self.displayed.clone()
    }

    pub fn displayed_views(&self) -> i64 {
        self.displayed.get()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Tears the tracker down, cancelling an increment still in its delay.
    pub fn unmount(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if !self.fired.load(Ordering::SeqCst) {
            debug!(
                "event=view_track module=tracker status=cancelled project_id={}",
                self.project_id
            );
        }
        pending.abort();
    }
}

impl Drop for ViewTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::{TrackerConfig, ViewTracker};
    use crate::{IncrementMode, TrackerError, ViewCount, ViewIncrementer};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::sleep;
    use uuid::Uuid;

    struct FakeIncrementer {
        calls: AtomicUsize,
        views: Option<i64>,
    }

    impl FakeIncrementer {
        fn returning(views: i64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                views: Some(views),
            })
        }

        fn missing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                views: None,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ViewIncrementer for FakeIncrementer {
        async fn increment(&self, project_id: Uuid) -> Result<ViewCount, TrackerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.views {
                Some(views) => Ok(ViewCount {
                    views,
                    mode: IncrementMode::Atomic,
                }),
                None => Err(TrackerError::NotFound(project_id)),
            }
        }
    }

    fn tracker(fake: &Arc<FakeIncrementer>, initial: i64) -> ViewTracker {
        ViewTracker::new(
            Uuid::new_v4(),
            initial,
            Arc::clone(fake) as Arc<dyn ViewIncrementer>,
            TrackerConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay_and_bumps_displayed_count() {
        let fake = FakeIncrementer::returning(42);
        let mut tracker = tracker(&fake, 41);
        let (tx, rx) = oneshot::channel();

        assert!(tracker
            .start(move |result| {
                let _ = tx.send(result);
            })
            .unwrap());

        sleep(Duration::from_millis(1_999)).await;
        assert_eq!(fake.calls(), 0);
        assert_eq!(tracker.displayed_views(), 41);
        assert!(!tracker.has_fired());

        let count = rx.await.unwrap().unwrap();
        assert_eq!(count.views, 42);
        assert_eq!(fake.calls(), 1);
        assert_eq!(tracker.displayed_views(), 42);
        assert!(tracker.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_before_delay_never_calls_incrementer() {
        let fake = FakeIncrementer::returning(1);
        let mut tracker = tracker(&fake, 0);
        let displayed = tracker.displayed();
        tracker
            .start(|_| panic!("cancelled tracker reported a result"))
            .unwrap();

        sleep(Duration::from_secs(1)).await;
        tracker.unmount();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(fake.calls(), 0);
        assert_eq!(displayed.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_tracker_cancels_pending_increment() {
        let fake = FakeIncrementer::returning(1);
        {
            let mut tracker = tracker(&fake, 0);
            tracker.start(|_| {}).unwrap();
        }

        sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_ignored() {
        let fake = FakeIncrementer::returning(7);
        let mut tracker = tracker(&fake, 6);
        let (tx, rx) = oneshot::channel();

        assert!(tracker
            .start(move |result| {
                let _ = tx.send(result);
            })
            .unwrap());
        assert!(!tracker
            .start(|_| panic!("second start must not fire"))
            .unwrap());

        rx.await.unwrap().unwrap();
        assert!(!tracker
            .start(|_| panic!("fired tracker must not fire again"))
            .unwrap());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.calls(), 1);
        assert_eq!(tracker.displayed_views(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_after_delay_still_delivers_result() {
        let fake = FakeIncrementer::returning(3);
        let mut tracker = tracker(&fake, 2);
        let (tx, rx) = oneshot::channel();
        tracker
            .start(move |result| {
                let _ = tx.send(result);
            })
            .unwrap();

        sleep(Duration::from_millis(2_001)).await;
        tracker.unmount();

        assert_eq!(rx.await.unwrap().unwrap().views, 3);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_increment_keeps_optimistic_count_and_reports_error() {
        let fake = FakeIncrementer::missing();
        let mut tracker = tracker(&fake, 10);
        let displayed = tracker.displayed();
        let (tx, rx) = oneshot::channel();
        tracker
            .start(move |result| {
                let _ = tx.send(result);
            })
            .unwrap();

        let result = rx.await.unwrap();
        assert!(matches!(result, Err(TrackerError::NotFound(_))));
        assert_eq!(displayed.get(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_can_reconcile_displayed_count() {
        let fake = FakeIncrementer::returning(100);
        let mut tracker = tracker(&fake, 5);
        let displayed = tracker.displayed();
        let (tx, rx) = oneshot::channel();
        tracker
            .start(move |result| {
                if let Ok(count) = result {
                    displayed.set(count.views);
                }
                let _ = tx.send(());
            })
            .unwrap();

        rx.await.unwrap();
        assert_eq!(tracker.displayed_views(), 100);
    }

    #[test]
    fn start_outside_runtime_reports_error_without_scheduling() {
        let fake = FakeIncrementer::returning(1);
        let mut tracker = tracker(&fake, 0);

        let err = tracker.start(|_| {}).unwrap_err();

        assert!(matches!(err, TrackerError::NoRuntime));
        assert!(!tracker.has_fired());
        assert_eq!(fake.calls(), 0);
        assert_eq!(tracker.displayed_views(), 0);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        assert!(tracker.start(|_| {}).unwrap());
    }
}
