use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::window::virtualizer::{IngestProgress, Virtualizer};
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct WindowShared<T> {
    core: Mutex<Virtualizer<T>>,
    ingest: Mutex<Option<CancellationToken>>,
    progress_tx: watch::Sender<IngestProgress>,
    batch_delay: Duration,
}

impl<T> WindowShared<T> {
    // Callers hold the core lock so the cancelled snapshot cannot race a batch.
    fn cancel_ingest(&self, core: &Virtualizer<T>) {
        let Some(token) = self.ingest.lock().take() else {
            return;
        };
        token.cancel();

        let mut progress = core.progress();
        progress.cancelled = progress.is_processing;
        self.progress_tx.send_replace(progress);
    }
}

pub struct DataWindow<T> {
    shared: Arc<WindowShared<T>>,
}

impl<T: Send + 'static> DataWindow<T> {
    // A zero `batch_delay` yields between batches instead of sleeping.
    pub fn new(batch_size: usize, overscan: usize, batch_delay: Duration) -> Self {
        let core = Virtualizer::new(batch_size, overscan);
        let (progress_tx, _) = watch::channel(core.progress());

        Self {
            shared: Arc::new(WindowShared {
                core: Mutex::new(core),
                ingest: Mutex::new(None),
                progress_tx,
                batch_delay,
            }),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.window_batch_size, config.window_overscan, Duration::ZERO)
    }

    pub fn set_source(&self, source: Vec<T>) -> Result<(), SyncError> {
        let runtime = if source.is_empty() {
            None
        } else {
            Some(Handle::try_current()?)
        };

        let mut core = self.shared.core.lock();
        self.shared.cancel_ingest(&core);
        core.set_source(source);
        let progress = core.progress();
        self.shared.progress_tx.send_replace(progress);

        let Some(runtime) = runtime else {
            debug!(total = progress.total, "window source needs no ingestion");
            return Ok(());
        };

        let token = CancellationToken::new();
        *self.shared.ingest.lock() = Some(token.clone());
        runtime.spawn(run_ingest(Arc::clone(&self.shared), token));
        Ok(())
    }

    pub fn update_visible_range(&self, start: usize, end: usize) {
        self.shared.core.lock().update_visible_range(start, end);
    }

    pub fn visible_range(&self) -> Range<usize> {
        self.shared.core.lock().visible_range()
    }

    pub fn processed_count(&self) -> usize {
        self.shared.core.lock().processed_count()
    }

    pub fn total_count(&self) -> usize {
        self.shared.core.lock().total_count()
    }

    pub fn is_processing(&self) -> bool {
        self.shared.core.lock().is_processing()
    }

    pub fn progress(&self) -> IngestProgress {
        *self.shared.progress_tx.borrow()
    }

    pub fn watch_progress(&self) -> watch::Receiver<IngestProgress> {
        self.shared.progress_tx.subscribe()
    }

    /// Resolves once the current source is fully ingested or its ingestion was cancelled.
    pub async fn until_processed(&self) -> IngestProgress {
        let mut progress = self.shared.progress_tx.subscribe();
        let settled = progress.wait_for(IngestProgress::is_settled).await;
        match settled {
            Ok(current) => *current,
            Err(_) => self.progress(),
        }
    }

    pub fn cancel(&self) {
        let core = self.shared.core.lock();
        self.shared.cancel_ingest(&core);
    }
}

impl<T: Clone + Send + 'static> DataWindow<T> {
    pub fn visible_data(&self) -> Vec<T> {
        self.shared.core.lock().visible_data().to_vec()
    }
}

impl<T> Drop for DataWindow<T> {
    fn drop(&mut self) {
        let core = self.shared.core.lock();
        self.shared.cancel_ingest(&core);
    }
}

async fn run_ingest<T: Send + 'static>(shared: Arc<WindowShared<T>>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = next_slot(shared.batch_delay) => {}
        }

        let progress = {
            let mut core = shared.core.lock();
            if token.is_cancelled() {
                break;
            }
            if let Some(batch) = core.ingest_next_batch() {
                trace!(start = batch.start, end = batch.end, "ingested window batch");
            }
            let progress = core.progress();
            shared.progress_tx.send_replace(progress);
            progress
        };

        if !progress.is_processing {
            debug!(total = progress.total, "window ingestion complete");
            break;
        }
    }
}

async fn next_slot(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ingests_whole_source_in_batches() {
        let window = DataWindow::new(1_000, 5, Duration::ZERO);
        let source: Vec<u64> = (0..10_000).collect();
        window.set_source(source.clone()).expect("inside runtime");

        assert_eq!(window.processed_count(), 0);
        assert_eq!(window.total_count(), 10_000);
        assert!(window.is_processing());

        window.until_processed().await;
        assert_eq!(window.processed_count(), 10_000);
        assert!(!window.is_processing());

        window.update_visible_range(100, 120);
        assert_eq!(window.visible_range(), 95..125);
        assert_eq!(window.visible_data(), source[95..125].to_vec());
    }

    #[tokio::test]
    async fn progress_is_published_per_batch() {
        let window = DataWindow::new(10, 0, Duration::ZERO);
        let mut progress = window.watch_progress();
        window.set_source((0..35).collect::<Vec<u32>>()).expect("inside runtime");

        let mut observed = Vec::new();
        loop {
            progress.changed().await.expect("window alive");
            let current = *progress.borrow_and_update();
            observed.push(current.processed);
            if !current.is_processing {
                break;
            }
        }

        assert_eq!(observed.last(), Some(&35));
        assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn replacing_source_restarts_ingestion() {
        let window = DataWindow::new(100, 0, Duration::ZERO);
        window.set_source((0..100_000).collect::<Vec<u32>>()).expect("inside runtime");
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        window.set_source(vec![7, 8, 9]).expect("inside runtime");
        assert_eq!(window.processed_count(), 0);

        window.until_processed().await;
        window.update_visible_range(0, 3);
        assert_eq!(window.total_count(), 3);
        assert_eq!(window.visible_data(), vec![7, 8, 9]);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(window.processed_count(), 3);
    }

    #[tokio::test]
    async fn empty_source_schedules_nothing() {
        let window: DataWindow<u32> = DataWindow::new(100, 0, Duration::ZERO);
        window.set_source(Vec::new()).expect("empty source needs no runtime");

        assert!(!window.is_processing());
        assert!(window.shared.ingest.lock().is_none());
        window.until_processed().await;
        assert!(window.visible_data().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_pending_batches() {
        let window = DataWindow::new(10, 0, Duration::from_millis(50));
        window.set_source((0..100).collect::<Vec<u32>>()).expect("inside runtime");

        tokio::time::sleep(Duration::from_millis(120)).await;
        window.cancel();
        let frozen = window.processed_count();
        assert!(frozen < 100);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(window.processed_count(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_settles_pending_waiters() {
        let window = DataWindow::new(10, 0, Duration::from_millis(50));
        window
            .set_source((0..100).collect::<Vec<u32>>())
            .expect("inside runtime");

        let (settled, _) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(60), window.until_processed()),
            async {
                tokio::time::sleep(Duration::from_millis(120)).await;
                window.cancel();
            }
        );
        let settled = settled.expect("waiter resolves after cancel");
        assert!(settled.cancelled);
        assert!(settled.is_processing);
        assert_eq!(settled.processed, 20);

        let late = tokio::time::timeout(Duration::from_secs(60), window.until_processed())
            .await
            .expect("later waiters resolve too");
        assert!(late.cancelled);
    }

    #[tokio::test]
    async fn new_source_clears_cancelled_flag() {
        let window = DataWindow::new(10, 0, Duration::ZERO);
        window
            .set_source((0..100).collect::<Vec<u32>>())
            .expect("inside runtime");
        window.cancel();
        assert!(window.progress().cancelled);

        window.set_source(vec![1, 2, 3]).expect("inside runtime");
        assert!(!window.progress().cancelled);
        let done = window.until_processed().await;
        assert!(!done.cancelled);
        assert_eq!(done.processed, 3);
    }

    #[test]
    fn non_empty_source_requires_runtime() {
        let window = DataWindow::new(10, 0, Duration::ZERO);
        let result = window.set_source(vec![1_u32, 2, 3]);
        assert!(matches!(result, Err(SyncError::Runtime(_))));
        assert_eq!(window.total_count(), 0);

        window.set_source(Vec::new()).expect("empty source needs no runtime");
        assert!(!window.is_processing());
    }
}
