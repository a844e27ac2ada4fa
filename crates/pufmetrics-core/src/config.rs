//! Run configuration, loadable from JSON.
//!
//! Every field has a default matching the reference SRAM PUF setup (128-bit
//! responses read as 16 one-byte chunks at 9600 baud, 1 s read timeout), so
//! an empty `{}` file is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::acquisition::{DEFAULT_CHUNK_COUNT, ReconnectPolicy};
use crate::codec::DEFAULT_RESPONSE_BITS;
use crate::error::{PufError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub metrics: MetricsConfig,
    pub acquisition: AcquisitionConfig,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| PufError::Config(format!("failed to parse config JSON: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Response width in bits; must be a positive multiple of 4.
    pub width_bits: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            width_bits: DEFAULT_RESPONSE_BITS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// `PUF[NN]: HH` lines per response.
    pub chunk_count: usize,
    /// Line speed the firmware transmits at.
    pub baud_rate: u32,
    /// Serial read timeout; bounds how long a silent board delays shutdown.
    pub read_timeout_ms: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            chunk_count: DEFAULT_CHUNK_COUNT,
            baud_rate: 9600,
            read_timeout_ms: 1000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}
