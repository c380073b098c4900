use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::core::EmissionRecord;

/// Append-mode CSV sink for emission records.
///
/// The header row is written only when the file is newly created; reruns
/// against an existing log keep appending below it. Every row is flushed as
/// soon as it is written, so an interrupted run loses at most the row in
/// flight.
pub struct RecordWriter {
    writer: csv::Writer<File>,
}

impl RecordWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let new_file = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output log {}", path.display()))?;

        let writer = csv::WriterBuilder::new()
            .has_headers(new_file)
            .from_writer(file);

        Ok(Self { writer })
    }

    pub fn append(&mut self, record: &EmissionRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn record() -> EmissionRecord {
        EmissionRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 6, 9, 12, 0, 0).unwrap(),
            speed: Some(32.0),
            maf: Some(5.1),
            co2_g: 1.0535,
            cumulative_co2_g: 2.11,
            ppm_per_sec: 9769.04,
        }
    }

    #[test]
    fn test_serialized_row_shape() {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(Vec::new());
        writer.serialize(record()).unwrap();
        let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let mut lines = data.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,SPEED(km/h),MAF(g/s),CO2(g),CO2_cumulative(g),PPM/sec")
        );
        assert_eq!(
            lines.next(),
            Some("2025-06-09 12:00:00,32.0,5.1,1.0535,2.11,9769.04")
        );
    }

    #[test]
    fn test_absent_fields_serialize_empty() {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .serialize(EmissionRecord {
                speed: None,
                maf: None,
                co2_g: 0.0,
                cumulative_co2_g: 0.0,
                ppm_per_sec: 0.0,
                ..record()
            })
            .unwrap();
        let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(data.trim_end(), "2025-06-09 12:00:00,,,0.0,0.0,0.0");
    }
}
