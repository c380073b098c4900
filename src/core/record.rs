use serde::Serialize;
use chrono::{DateTime, Utc};

/// Timestamp rendering used in persisted logs (second resolution)
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One fully computed output row: a single sample's contribution plus the
/// running totals at that point.
///
/// Field names serialize to the persisted log's header columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionRecord {
    /// Timestamp of the sample this row was computed from
    #[serde(with = "log_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Vehicle speed, if present on the sample
    #[serde(rename = "SPEED(km/h)")]
    pub speed: Option<f64>,

    /// Mass air-flow, if present on the sample
    #[serde(rename = "MAF(g/s)")]
    pub maf: Option<f64>,

    /// Emitted mass over the elapsed interval, rounded to 4 decimal places
    #[serde(rename = "CO2(g)")]
    pub co2_g: f64,

    /// Running total since the accumulator was created, rounded to 2 places
    #[serde(rename = "CO2_cumulative(g)")]
    pub cumulative_co2_g: f64,

    /// Concentration-buildup rate for the configured sealed volume,
    /// rounded to 2 places
    #[serde(rename = "PPM/sec")]
    pub ppm_per_sec: f64,
}

impl EmissionRecord {
    /// One-line console rendering of this record
    pub fn console_line(&self) -> String {
        let speed = self
            .speed
            .map_or_else(|| "-".to_string(), |v| format!("{:.0}", v));
        let maf = self
            .maf
            .map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
        format!(
            "{} | SPEED: {} km/h | MAF: {} g/s | CO2: {:.4} g | total: {:.2} g | PPM/s: {:.2}",
            self.timestamp.format(LOG_TIMESTAMP_FORMAT),
            speed,
            maf,
            self.co2_g,
            self.cumulative_co2_g,
            self.ppm_per_sec
        )
    }
}

mod log_timestamp {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.format(super::LOG_TIMESTAMP_FORMAT).to_string())
    }
}
