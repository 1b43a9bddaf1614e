#![forbid(unsafe_code)]

mod correlator;
pub mod stack_text;

pub use correlator::{Correlation, correlate};
