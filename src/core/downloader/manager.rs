use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::{MinepkgError, MinepkgResult};

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 12;

/// Outcome of a single failed attempt. Transient failures are retried until
/// the attempt budget runs out; fatal ones abort the batch immediately.
#[derive(Debug)]
pub enum AttemptError {
    Transient(MinepkgError),
    Fatal(MinepkgError),
}

impl AttemptError {
    pub fn into_inner(self) -> MinepkgError {
        match self {
            AttemptError::Transient(err) | AttemptError::Fatal(err) => err,
        }
    }
}

/// Anything the queue can fetch.
#[async_trait]
pub trait Downloadable: Send + Sync {
    /// Short human readable name for logs and retry warnings.
    fn label(&self) -> String;

    async fn download(&self, cancel: &CancellationToken) -> Result<(), AttemptError>;
}

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Percentage of completed items, 0–100.
    Progress(u8),
    /// An attempt failed and will be retried.
    Retrying {
        label: String,
        attempt: u32,
        error: String,
    },
}

pub type ProgressCallback = Arc<dyn Fn(DownloadEvent) + Send + Sync>;

/// Bounded-concurrency fetch queue with per-item retry.
#[derive(Clone)]
pub struct DownloadManager {
    concurrency: usize,
    max_attempts: u32,
    /// Sleep before retry `n` is `backoff_unit * n²`.
    backoff_unit: Duration,
    cancel: CancellationToken,
    on_event: Option<ProgressCallback>,
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl DownloadManager {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
            cancel,
            on_event: None,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }

    // ── Batch ───────────────────────────────────────────

    /// Run every item to completion. The first item that exhausts its
    /// attempts (or fails fatally) aborts the batch; items already written
    /// stay on disk.
    pub async fn run(&self, items: Vec<Box<dyn Downloadable>>) -> MinepkgResult<()> {
        let total = items.len();
        if total == 0 {
            self.emit(DownloadEvent::Progress(100));
            return Ok(());
        }

        info!(
            "Starting download batch: {} items, concurrency={}",
            total, self.concurrency
        );

        let completed = AtomicUsize::new(0);
        // Built eagerly so the batch future stays Send for tokio::spawn.
        let futures: Vec<_> = items
            .into_iter()
            .map(|item| self.run_counted(item, &completed, total))
            .collect();
        let mut results = stream::iter(futures).buffer_unordered(self.concurrency);

        while let Some(result) = results.next().await {
            if let Err(err) = result {
                warn!("Download batch aborted: {}", err);
                return Err(err);
            }
        }

        debug!("Download batch finished ({} items)", total);
        Ok(())
    }

    async fn run_counted(
        &self,
        item: Box<dyn Downloadable>,
        completed: &AtomicUsize,
        total: usize,
    ) -> MinepkgResult<()> {
        self.run_item(item.as_ref()).await?;
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(DownloadEvent::Progress((done * 100 / total) as u8));
        Ok(())
    }

    /// Retry loop for a single item.
    async fn run_item(&self, item: &dyn Downloadable) -> MinepkgResult<()> {
        let mut attempts = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(MinepkgError::Cancelled);
            }

            let err = match item.download(&self.cancel).await {
                Ok(()) => return Ok(()),
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Transient(err)) => err,
            };

            attempts += 1;
            if attempts >= self.max_attempts {
                warn!(
                    "{} failed after {} attempts: {}",
                    item.label(),
                    attempts,
                    err
                );
                return Err(err);
            }

            self.emit(DownloadEvent::Retrying {
                label: item.label(),
                attempt: attempts,
                error: err.to_string(),
            });
            debug!("Retrying {} (attempt {}): {}", item.label(), attempts, err);

            let backoff = self.backoff_unit * attempts * attempts;
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(MinepkgError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Flaky {
        calls: Arc<AtomicUsize>,
        fail_times: usize,
        fatal: bool,
    }

    #[async_trait]
    impl Downloadable for Flaky {
        fn label(&self) -> String {
            "flaky".into()
        }

        async fn download(&self, _cancel: &CancellationToken) -> Result<(), AttemptError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_times {
                return Ok(());
            }
            let err = MinepkgError::Other("boom".into());
            if self.fatal {
                Err(AttemptError::Fatal(err))
            } else {
                Err(AttemptError::Transient(err))
            }
        }
    }

    fn manager(max_attempts: u32) -> DownloadManager {
        DownloadManager::default()
            .with_max_attempts(max_attempts)
            .with_backoff_unit(Duration::ZERO)
    }

    #[tokio::test]
    async fn always_failing_item_uses_whole_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let item = Flaky {
            calls: calls.clone(),
            fail_times: usize::MAX,
            fatal: false,
        };

        let result = manager(5).run(vec![Box::new(item)]).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let item = Flaky {
            calls: calls.clone(),
            fail_times: usize::MAX,
            fatal: true,
        };

        assert!(manager(12).run(vec![Box::new(item)]).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_reported_and_progress_reaches_100() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let manager = manager(12).with_progress(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        let items: Vec<Box<dyn Downloadable>> = (0..4)
            .map(|_| {
                Box::new(Flaky {
                    calls: Arc::new(AtomicUsize::new(0)),
                    fail_times: 2,
                    fatal: false,
                }) as Box<dyn Downloadable>
            })
            .collect();

        manager.run(items).await.unwrap();

        let events = events.lock().unwrap();
        let retries = events
            .iter()
            .filter(|e| matches!(e, DownloadEvent::Retrying { .. }))
            .count();
        assert_eq!(retries, 8);
        assert!(matches!(events.last(), Some(DownloadEvent::Progress(100))));
    }

    struct Slow {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Downloadable for Slow {
        fn label(&self) -> String {
            "slow".into()
        }

        async fn download(&self, _cancel: &CancellationToken) -> Result<(), AttemptError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn in_flight_items_never_exceed_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<Box<dyn Downloadable>> = (0..12)
            .map(|_| {
                Box::new(Slow {
                    in_flight: in_flight.clone(),
                    peak: peak.clone(),
                }) as Box<dyn Downloadable>
            })
            .collect();

        manager(1).with_concurrency(3).run(items).await.unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {}", peak);
        assert!(peak >= 2);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn batch_can_run_on_a_spawned_task() {
        let calls = Arc::new(AtomicUsize::new(0));
        let item = Flaky {
            calls: calls.clone(),
            fail_times: 0,
            fatal: false,
        };
        let manager = manager(1);

        tokio::spawn(async move { manager.run(vec![Box::new(item)]).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_batch_stops() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = Arc::new(AtomicUsize::new(0));
        let item = Flaky {
            calls: calls.clone(),
            fail_times: 0,
            fatal: false,
        };

        let result = DownloadManager::new(token).run(vec![Box::new(item)]).await;
        assert!(matches!(result, Err(MinepkgError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
