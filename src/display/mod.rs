pub mod quantizer;

pub use quantizer::{quantize, DisplayCode};
