use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::core::Sample;
use crate::source::sample_source::{SampleSource, SourceResult, SourceStatus};

/// Replays a recorded sample log as if it were a live feed.
///
/// When pacing is enabled, the gap between consecutive record timestamps is
/// slept off (divided by the speed factor) before each sample is handed out,
/// so the feed mimics the recorded cadence. Unpaced replay hands samples out
/// as fast as the consumer asks. The samples themselves are untouched either
/// way, so accumulation results do not depend on pacing.
pub struct ReplaySource {
    name: String,
    samples: Vec<Sample>,
    position: usize,
    status: SourceStatus,
    speed: Option<f64>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl ReplaySource {
    pub fn new(name: &str, samples: Vec<Sample>) -> Self {
        Self {
            name: name.to_string(),
            samples,
            position: 0,
            status: SourceStatus::Disconnected,
            speed: None,
            last_timestamp: None,
        }
    }

    /// Enable paced replay at the given speed factor (1.0 = recorded cadence)
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = Some(speed.clamp(0.1, 10.0));
    }

    /// Index of the next sample to hand out
    pub fn position(&self) -> usize {
        self.position
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> SourceStatus {
        self.status
    }

    async fn connect(&mut self) -> SourceResult<()> {
        self.position = 0;
        self.last_timestamp = None;
        self.status = SourceStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> SourceResult<()> {
        self.status = SourceStatus::Disconnected;
        Ok(())
    }

    async fn next_sample(&mut self) -> SourceResult<Option<Sample>> {
        if self.status != SourceStatus::Connected {
            return Err("Not connected".into());
        }

        let Some(sample) = self.samples.get(self.position).cloned() else {
            return Ok(None);
        };
        self.position += 1;

        if let (Some(speed), Some(last)) = (self.speed, self.last_timestamp) {
            let gap_ms = (sample.timestamp - last).num_milliseconds();
            if gap_ms > 0 {
                tokio::time::sleep(Duration::from_millis((gap_ms as f64 / speed) as u64)).await;
            }
        }
        self.last_timestamp = Some(sample.timestamp);

        Ok(Some(sample))
    }
}
