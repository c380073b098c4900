use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// One MAF sensor observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Timestamp in UTC
    pub timestamp: DateTime<Utc>,

    /// Vehicle speed in km/h, if the sensor reported one
    pub speed: Option<f64>,

    /// Mass air-flow in g/s, if the reading was parseable
    pub maf: Option<f64>,
}

impl Sample {
    /// Create a sample stamped with the current time
    pub fn new(speed: Option<f64>, maf: Option<f64>) -> Self {
        Self {
            timestamp: Utc::now(),
            speed,
            maf,
        }
    }

    /// Whether this sample carries a usable air-flow reading
    pub fn has_maf(&self) -> bool {
        self.maf.is_some()
    }
}

/// Extract the first numeric run from a raw sensor field.
///
/// Readings often arrive with unit suffixes ("23.4 g/s") or as placeholder
/// text ("N/A"); a field without a numeric run is treated as absent.
pub fn extract_numeric(raw: &str) -> Option<f64> {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let re = NUMERIC.get_or_init(|| Regex::new(r"[-+]?[0-9]*\.?[0-9]+").unwrap());
    re.find(raw).and_then(|m| m.as_str().parse::<f64>().ok())
}
