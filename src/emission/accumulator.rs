use chrono::{DateTime, Utc};

use crate::core::constants::{EmissionConstants, M_CO2, V_MOLAR};
use crate::core::{EmissionRecord, Sample};

/// Fallback elapsed time used when no real baseline is available (seconds)
const FALLBACK_ELAPSED_S: f64 = 1.0;

/// Outcome of the elapsed-time computation for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Elapsed {
    /// First sample the accumulator ever sees; no baseline exists yet
    Fresh,
    /// Elapsed seconds since the last valid sample
    Valid(f64),
    /// The sample carries no usable MAF reading
    Skipped,
}

/// Streaming emission accumulator.
///
/// Converts an irregular, occasionally-gappy sequence of timestamped MAF
/// samples into per-sample emitted mass, monotonically increasing running
/// totals, and a concentration-buildup rate for a sealed reference volume.
/// State is owned by the instance, so independent accumulation runs can
/// coexist (one per replay, one per test case).
///
/// Processing is strictly sequential: each update depends on the previous
/// state, and feeding the same observation twice double-counts it. Callers
/// that split acquisition and consumption across tasks must keep the
/// accumulator on a single consumer.
pub struct Accumulator {
    constants: EmissionConstants,
    confined_volume_l: f64,
    previous_timestamp: Option<DateTime<Utc>>,
    cumulative_co2_g: f64,
    cumulative_distance_km: f64,
    samples_processed: u64,
}

impl Accumulator {
    /// Create a fresh accumulator for the given sealed reference volume
    /// (liters)
    pub fn new(confined_volume_l: f64) -> Self {
        Self {
            constants: EmissionConstants::new(),
            confined_volume_l,
            previous_timestamp: None,
            cumulative_co2_g: 0.0,
            cumulative_distance_km: 0.0,
            samples_processed: 0,
        }
    }

    /// Total emitted mass since creation (grams)
    pub fn cumulative_co2_g(&self) -> f64 {
        self.cumulative_co2_g
    }

    /// Total distance covered since creation (km)
    pub fn cumulative_distance_km(&self) -> f64 {
        self.cumulative_distance_km
    }

    /// Timestamp of the last valid sample, if any
    pub fn previous_timestamp(&self) -> Option<DateTime<Utc>> {
        self.previous_timestamp
    }

    /// Classify one sample's elapsed time against the current baseline.
    ///
    /// A sample without a MAF reading never advances the baseline, so the
    /// next valid sample measures true elapsed time from the last valid one.
    /// When earlier samples were all skipped the baseline is still unset and
    /// the fixed fallback applies. Out-of-order input yields a negative
    /// difference, which is clamped to zero so the running totals cannot
    /// shrink.
    fn classify(&self, sample: &Sample) -> Elapsed {
        if !sample.has_maf() {
            return Elapsed::Skipped;
        }
        if self.samples_processed == 0 {
            return Elapsed::Fresh;
        }
        match self.previous_timestamp {
            Some(prev) => Elapsed::Valid(elapsed_seconds(prev, sample.timestamp).max(0.0)),
            None => Elapsed::Valid(FALLBACK_ELAPSED_S),
        }
    }

    /// Concentration-buildup rate for the configured sealed volume (ppm/sec):
    /// mass flow to molar flow, molar flow to volumetric flow at standard
    /// molar volume, scaled to parts-per-million of the volume.
    fn concentration_rate(&self, maf: f64) -> f64 {
        let mol_per_sec = maf * self.constants.k / M_CO2;
        let liters_per_sec = mol_per_sec * V_MOLAR;
        (liters_per_sec / self.confined_volume_l) * 1_000_000.0
    }

    /// Process one sample, mutating the running state, and produce the
    /// computed output row.
    ///
    /// Never fails: the first sample and samples with unusable air-flow data
    /// contribute zero mass at a fallback elapsed time of one second, so a
    /// momentary sensor dropout cannot halt the pipeline.
    pub fn process(&mut self, sample: &Sample) -> EmissionRecord {
        let elapsed = self.classify(sample);

        let (delta_t, co2_g, ppm_per_sec) = match (elapsed, sample.maf) {
            (Elapsed::Valid(dt), Some(maf)) => {
                (dt, maf * self.constants.k * dt, self.concentration_rate(maf))
            }
            _ => (FALLBACK_ELAPSED_S, 0.0, 0.0),
        };

        if !matches!(elapsed, Elapsed::Skipped) {
            // Advance the baseline, never moving it backward.
            self.previous_timestamp = Some(match self.previous_timestamp {
                Some(prev) if prev > sample.timestamp => prev,
                _ => sample.timestamp,
            });
        }

        self.cumulative_co2_g += co2_g;
        if let Some(speed) = sample.speed {
            self.cumulative_distance_km += (speed * delta_t / 3600.0).max(0.0);
        }
        self.samples_processed += 1;

        EmissionRecord {
            timestamp: sample.timestamp,
            speed: sample.speed,
            maf: sample.maf,
            co2_g: round_to(co2_g, 4),
            cumulative_co2_g: round_to(self.cumulative_co2_g, 2),
            ppm_per_sec: round_to(ppm_per_sec, 2),
        }
    }
}

fn elapsed_seconds(prev: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - prev).num_milliseconds() as f64 / 1000.0
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const VOLUME_L: f64 = 55.0;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 9, 12, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    fn sample(offset_secs: i64, speed: Option<f64>, maf: Option<f64>) -> Sample {
        Sample {
            timestamp: ts(offset_secs),
            speed,
            maf,
        }
    }

    fn k() -> f64 {
        EmissionConstants::new().k
    }

    #[test]
    fn test_first_sample_contributes_nothing() {
        let mut acc = Accumulator::new(VOLUME_L);
        let record = acc.process(&sample(0, Some(42.0), Some(17.3)));

        assert_eq!(record.co2_g, 0.0);
        assert_eq!(record.ppm_per_sec, 0.0);
        assert_eq!(acc.cumulative_co2_g(), 0.0);
        // A valid first sample still becomes the baseline.
        assert_eq!(acc.previous_timestamp(), Some(ts(0)));
    }

    #[test]
    fn test_valid_streak_sums_exactly() {
        let mut acc = Accumulator::new(VOLUME_L);
        acc.process(&sample(0, None, Some(4.0)));
        acc.process(&sample(1, None, Some(5.0)));
        acc.process(&sample(3, None, Some(6.0)));

        // First sample contributes zero; the rest contribute maf * K * dt.
        let expected = 5.0 * k() * 1.0 + 6.0 * k() * 2.0;
        assert!((acc.cumulative_co2_g() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gap_sample_leaves_state_untouched() {
        let mut acc = Accumulator::new(VOLUME_L);
        acc.process(&sample(0, None, Some(5.0)));
        let before = acc.cumulative_co2_g();

        let record = acc.process(&sample(5, Some(30.0), None));
        assert_eq!(record.co2_g, 0.0);
        assert_eq!(record.ppm_per_sec, 0.0);
        assert_eq!(acc.cumulative_co2_g(), before);
        // Baseline stays at the last valid sample, not the gap.
        assert_eq!(acc.previous_timestamp(), Some(ts(0)));

        // The next valid sample measures elapsed time from the last valid one.
        acc.process(&sample(7, None, Some(5.0)));
        let expected = 5.0 * k() * 7.0;
        assert!((acc.cumulative_co2_g() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_leading_gap_then_valid_samples() {
        // (t0, maf absent), (t0+1, 5.0), (t0+2, 5.0): the first valid sample
        // falls back to a one-second interval because the gap never set a
        // baseline, the second measures a real one.
        let mut acc = Accumulator::new(VOLUME_L);

        let r1 = acc.process(&sample(0, None, None));
        assert_eq!(r1.co2_g, 0.0);
        assert_eq!(acc.previous_timestamp(), None);

        let r2 = acc.process(&sample(1, None, Some(5.0)));
        let per_step = 5.0 * k() * 1.0;
        assert_eq!(r2.co2_g, round_to(per_step, 4));

        let r3 = acc.process(&sample(2, None, Some(5.0)));
        assert_eq!(r3.co2_g, round_to(per_step, 4));
        assert_eq!(r3.cumulative_co2_g, round_to(2.0 * per_step, 2));
    }

    #[test]
    fn test_out_of_order_sample_cannot_shrink_totals() {
        let mut acc = Accumulator::new(VOLUME_L);
        acc.process(&sample(0, None, Some(5.0)));
        acc.process(&sample(10, Some(50.0), Some(5.0)));
        let co2 = acc.cumulative_co2_g();
        let dist = acc.cumulative_distance_km();

        // Timestamp moves backward: elapsed clamps to zero, baseline holds.
        acc.process(&sample(4, Some(50.0), Some(8.0)));
        assert_eq!(acc.cumulative_co2_g(), co2);
        assert_eq!(acc.cumulative_distance_km(), dist);
        assert_eq!(acc.previous_timestamp(), Some(ts(10)));
    }

    #[test]
    fn test_totals_never_decrease() {
        let inputs = [
            sample(0, Some(10.0), Some(3.0)),
            sample(2, None, None),
            sample(1, Some(-20.0), Some(4.0)),
            sample(3, Some(15.0), None),
            sample(9, Some(60.0), Some(12.5)),
        ];

        let mut acc = Accumulator::new(VOLUME_L);
        let mut last_co2 = 0.0;
        let mut last_dist = 0.0;
        for input in &inputs {
            acc.process(input);
            assert!(acc.cumulative_co2_g() >= last_co2);
            assert!(acc.cumulative_distance_km() >= last_dist);
            last_co2 = acc.cumulative_co2_g();
            last_dist = acc.cumulative_distance_km();
        }
    }

    #[test]
    fn test_concentration_rate_value() {
        let mut acc = Accumulator::new(VOLUME_L);
        acc.process(&sample(0, None, Some(5.0)));
        let record = acc.process(&sample(1, None, Some(5.0)));

        let expected = ((5.0 * k() / M_CO2) * V_MOLAR / VOLUME_L) * 1_000_000.0;
        assert_eq!(record.ppm_per_sec, round_to(expected, 2));
    }

    #[test]
    fn test_distance_accumulates_only_with_speed() {
        let mut acc = Accumulator::new(VOLUME_L);
        acc.process(&sample(0, None, Some(5.0)));
        acc.process(&sample(10, None, Some(5.0)));
        assert_eq!(acc.cumulative_distance_km(), 0.0);

        acc.process(&sample(20, Some(36.0), Some(5.0)));
        // 36 km/h for 10 s is 0.1 km.
        assert!((acc.cumulative_distance_km() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let inputs = [
            sample(0, Some(0.0), None),
            sample(1, Some(12.0), Some(6.5)),
            sample(2, Some(25.0), Some(9.25)),
            sample(4, None, Some(11.0)),
            sample(5, Some(40.0), None),
            sample(6, Some(44.0), Some(14.0)),
        ];

        let run = |inputs: &[Sample]| {
            let mut acc = Accumulator::new(VOLUME_L);
            inputs.iter().map(|s| acc.process(s)).collect::<Vec<_>>()
        };

        assert_eq!(run(&inputs), run(&inputs));
    }

    #[test]
    fn test_rounding_in_output_only() {
        let mut acc = Accumulator::new(VOLUME_L);
        acc.process(&sample(0, None, Some(0.00004)));
        let record = acc.process(&sample(1, None, Some(0.00004)));

        // The row rounds to 4 places, the internal total stays exact.
        assert_eq!(record.co2_g, 0.0);
        assert!(acc.cumulative_co2_g() > 0.0);
    }
}
