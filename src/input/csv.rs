use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::core::sample::extract_numeric;
use crate::core::Sample;
use crate::input::LogFormatError;

/// Timestamp formats accepted in recorded logs, in match order
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Load samples from a recorded emission log.
///
/// Requires `timestamp` and `MAF(g/s)` columns; `SPEED(km/h)` is optional.
/// Header names are matched case-insensitively with a few aliases. Rows come
/// back in file order: a row with an unreadable timestamp is dropped, a row
/// with an unreadable MAF becomes a gap sample (it still advances the replay
/// cursor, it just contributes nothing downstream).
pub fn load_csv(path: &Path) -> Result<Vec<Sample>> {
    let rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open log {}", path.display()))?;
    parse_reader(rdr)
}

fn parse_reader<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<Sample>> {
    let headers = rdr.headers()?;
    let time_idx = find_column(headers, &["timestamp", "time", "t", "ts"])?;
    let maf_idx = find_column(headers, &["maf(g/s)", "maf"])?;
    let speed_idx = find_column(headers, &["speed(km/h)", "speed"]).ok();

    let mut samples: Vec<Sample> = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read CSV row")?;

        let timestamp = match record.get(time_idx).and_then(parse_timestamp) {
            Some(ts) => ts,
            None => {
                warn!(row, "dropping row with unreadable timestamp");
                continue;
            }
        };

        let maf = record.get(maf_idx).and_then(extract_numeric);
        let speed = speed_idx
            .and_then(|idx| record.get(idx))
            .and_then(extract_numeric);

        // Replay input must already be sorted; flag violations rather than
        // reordering.
        if let Some(prev) = samples.last() {
            if timestamp < prev.timestamp {
                warn!(row, "timestamp moves backward in replay log");
            }
        }

        samples.push(Sample {
            timestamp,
            speed,
            maf,
        });
    }

    Ok(samples)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize, LogFormatError> {
    for (idx, header) in headers.iter().enumerate() {
        let header = header.trim().to_lowercase();
        if names.iter().any(|&name| header == name) {
            return Ok(idx);
        }
    }

    Err(LogFormatError::MissingColumn(names.join("/")))
}
