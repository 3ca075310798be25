use std::path::PathBuf;

use serde::Deserialize;

pub mod setup;

#[derive(Debug, Deserialize)]
pub struct PerfConfig {
    pub perf: RunConfig,
    #[serde(default)]
    pub log: log4rs::config::RawConfig,
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// Seed for every random value.
    pub seed: u64,
    /// Random values measured per varint type.
    pub samples: u32,
    /// Leaf records in the round-trip record.
    pub leaves: u32,
    /// Random floats per leaf.
    pub floats: u32,
    /// File written and read back by the round trip.
    pub output: PathBuf,
    /// Whether to delete `output` afterwards.
    #[serde(default)]
    pub clean_up: bool,
}
