use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use crate::core::Sample;
use crate::source::sample_source::{SampleSource, SourceStatus};

/// Depth of the sample channel between acquisition and processing
const SAMPLE_CHANNEL_DEPTH: usize = 256;

/// Counters kept by the acquisition task
#[derive(Default)]
pub struct FeedStats {
    pub samples_received: AtomicU64,
    pub gap_samples: AtomicU64,
    pub errors: AtomicU64,
}

/// Drives a sample source on a background task and forwards its samples.
///
/// Acquisition and processing run as two independent flows: the background
/// task polls the source at the source's own pace and pushes samples into a
/// bounded channel, while the consumer drains the channel strictly in order.
/// The consumer side owns the accumulator exclusively, which is what keeps
/// its state updates serialized.
pub struct SampleFeed {
    status: Arc<Mutex<SourceStatus>>,
    stats: Arc<FeedStats>,
    stop_signal: Arc<AtomicBool>,
}

impl Default for SampleFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleFeed {
    pub fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(SourceStatus::Disconnected)),
            stats: Arc::new(FeedStats::default()),
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get current feed status
    pub async fn status(&self) -> SourceStatus {
        *self.status.lock().await
    }

    /// Get acquisition counters
    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Connect the source and start pumping samples.
    ///
    /// Returns the receiving end of the sample channel. The background task
    /// ends when the source is exhausted, the receiver is dropped, or `stop`
    /// is called; the source is disconnected on the way out.
    pub async fn start(
        &mut self,
        mut source: Box<dyn SampleSource>,
    ) -> Result<mpsc::Receiver<Sample>, String> {
        *self.status.lock().await = SourceStatus::Connecting;
        self.stop_signal.store(false, Ordering::SeqCst);
        self.stats.samples_received.store(0, Ordering::SeqCst);
        self.stats.gap_samples.store(0, Ordering::SeqCst);
        self.stats.errors.store(0, Ordering::SeqCst);

        if let Err(e) = source.connect().await {
            *self.status.lock().await = SourceStatus::Error;
            return Err(format!("Failed to connect: {}", e));
        }
        *self.status.lock().await = SourceStatus::Connected;
        info!(source = source.name(), "sample feed connected");

        let (tx, rx) = mpsc::channel::<Sample>(SAMPLE_CHANNEL_DEPTH);
        let status = self.status.clone();
        let stats = self.stats.clone();
        let stop_signal = self.stop_signal.clone();

        tokio::spawn(async move {
            loop {
                if stop_signal.load(Ordering::SeqCst) {
                    break;
                }

                match source.next_sample().await {
                    Ok(Some(sample)) => {
                        stats.samples_received.fetch_add(1, Ordering::SeqCst);
                        if !sample.has_maf() {
                            stats.gap_samples.fetch_add(1, Ordering::SeqCst);
                        }
                        if tx.send(sample).await.is_err() {
                            // Consumer went away.
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        stats.errors.fetch_add(1, Ordering::SeqCst);
                        error!("sample source error: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }

            let _ = source.disconnect().await;
            *status.lock().await = SourceStatus::Disconnected;
        });

        Ok(rx)
    }

    /// Ask the acquisition task to stop after its current poll
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }
}
