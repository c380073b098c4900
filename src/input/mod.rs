pub mod csv;

pub use csv::load_csv;

use thiserror::Error;

/// Problems with the shape of a recorded log file
#[derive(Debug, Error)]
pub enum LogFormatError {
    #[error("missing required column ({0})")]
    MissingColumn(String),
}
