pub mod config;
pub mod prometheus;

pub use config::{ConfigLoader, ScoutConfig};
