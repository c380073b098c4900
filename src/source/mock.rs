use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use crate::core::Sample;
use crate::source::sample_source::{SampleSource, SourceResult, SourceStatus};

/// Poll cadence of the simulated feed
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Every Nth generated reading drops out, like a momentary sensor glitch
const DROPOUT_PERIOD: u32 = 20;

/// Simulated sample source for running without a vehicle.
///
/// Produces a deterministic idle-then-accelerate cycle at roughly 1 Hz,
/// including periodic MAF dropouts so downstream gap handling stays
/// exercised. Injected samples take priority over generated ones, which
/// keeps tests hermetic.
pub struct MockSampleSource {
    name: String,
    status: SourceStatus,
    queue: VecDeque<Sample>,
    counter: u32,
    paced: bool,
}

impl MockSampleSource {
    /// Create a new simulated source
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: SourceStatus::Disconnected,
            queue: VecDeque::new(),
            counter: 0,
            paced: true,
        }
    }

    /// Disable the 1 Hz pacing (for tests)
    pub fn set_paced(&mut self, paced: bool) {
        self.paced = paced;
    }

    /// Queue a sample to be returned ahead of generated ones
    pub fn inject_sample(&mut self, sample: Sample) {
        self.queue.push_back(sample);
    }

    /// Queue multiple samples
    pub fn inject_samples(&mut self, samples: Vec<Sample>) {
        for sample in samples {
            self.queue.push_back(sample);
        }
    }

    /// Next point on the simulated drive cycle
    fn generate_sample(&mut self) -> Sample {
        self.counter += 1;

        if self.counter % DROPOUT_PERIOD == 0 {
            return Sample::new(Some(0.0), None);
        }

        let phase = (self.counter % 60) as f64 / 60.0;
        let (speed, maf) = if phase < 0.5 {
            // Idling: airflow creeps up, vehicle stationary.
            (0.0, 6.0 + 4.0 * (phase * 2.0))
        } else {
            // Pulling away: airflow tracks the simulated speed.
            (90.0 * ((phase - 0.5) * 2.0), 10.0 + 25.0 * ((phase - 0.5) * 2.0))
        };

        Sample::new(Some(speed), Some(maf))
    }
}

#[async_trait]
impl SampleSource for MockSampleSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> SourceStatus {
        self.status
    }

    async fn connect(&mut self) -> SourceResult<()> {
        self.status = SourceStatus::Connected;
        self.counter = 0;
        Ok(())
    }

    async fn disconnect(&mut self) -> SourceResult<()> {
        self.status = SourceStatus::Disconnected;
        self.queue.clear();
        Ok(())
    }

    async fn next_sample(&mut self) -> SourceResult<Option<Sample>> {
        if self.status != SourceStatus::Connected {
            return Err("Not connected".into());
        }

        if let Some(sample) = self.queue.pop_front() {
            return Ok(Some(sample));
        }

        if self.paced {
            tokio::time::sleep(SAMPLE_INTERVAL).await;
        }
        Ok(Some(self.generate_sample()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_connect() {
        let mut source = MockSampleSource::new("mock0");
        assert_eq!(source.status(), SourceStatus::Disconnected);

        source.connect().await.unwrap();
        assert_eq!(source.status(), SourceStatus::Connected);

        source.disconnect().await.unwrap();
        assert_eq!(source.status(), SourceStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_mock_source_requires_connection() {
        let mut source = MockSampleSource::new("mock0");
        assert!(source.next_sample().await.is_err());
    }

    #[tokio::test]
    async fn test_injected_samples_come_first() {
        let mut source = MockSampleSource::new("mock0");
        source.set_paced(false);
        source.connect().await.unwrap();

        source.inject_samples(vec![
            Sample::new(Some(10.0), Some(5.0)),
            Sample::new(None, None),
        ]);

        let first = source.next_sample().await.unwrap().unwrap();
        assert_eq!(first.maf, Some(5.0));
        let second = source.next_sample().await.unwrap().unwrap();
        assert_eq!(second.maf, None);
    }

    #[tokio::test]
    async fn test_generated_cycle_includes_dropouts() {
        let mut source = MockSampleSource::new("mock0");
        source.set_paced(false);
        source.connect().await.unwrap();

        let mut gaps = 0;
        for _ in 0..DROPOUT_PERIOD {
            let sample = source.next_sample().await.unwrap().unwrap();
            if sample.maf.is_none() {
                gaps += 1;
            }
        }
        assert_eq!(gaps, 1);
    }
}
