//! # pufmetrics-core
//!
//! Quality metrics for SRAM physically unclonable functions.
//!
//! A PUF response is the power-up content of a small SRAM window, read out
//! as hex. Responses are collected into a table with one column per
//! (board, reset type) and evaluated for four figures of merit:
//! uniformity, uniqueness, diffusion and robustness.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pufmetrics_core::{MetricsEngine, ResponseTable};
//!
//! let table = ResponseTable::from_csv_path("data_sram_puf.csv".as_ref()).unwrap();
//! let report = MetricsEngine::default().evaluate(&table).unwrap();
//! println!("{report}");
//! ```
//!
//! ## Architecture
//!
//! Serial line → [`ResponseAssembler`] → [`TableAppender`] → CSV table
//!
//! CSV table → [`ResponseTable`] → [`HexCodec`] → Hamming distances →
//! [`MetricsEngine`] → [`MetricsReport`]
//!
//! Column `2b−1` (1-based) of the table holds the power-on responses of
//! board `b` and column `2b` its soft-reset responses.

pub mod acquisition;
pub mod codec;
pub mod config;
pub mod distance;
pub mod error;
pub mod metrics;
pub mod report;
pub mod table;

pub use acquisition::{
    Acquisition, AcquisitionSummary, ChunkLine, Connector, DeviceConnector, ReconnectPolicy,
    ResponseAssembler, TableAppender, parse_chunk_line,
};
pub use codec::{BitString, DEFAULT_RESPONSE_BITS, HexCodec, ResponseWidth};
pub use config::{AcquisitionConfig, Config, MetricsConfig};
pub use distance::{aligned_distances, consecutive_distances, hamming};
pub use error::{EvaluationError, PufError, Result};
pub use metrics::{DistancePool, Metric, MetricKind, MetricsEngine};
pub use report::{ColumnUniformity, MetricOutcome, MetricsReport};
pub use table::{BoardId, ColumnKey, ColumnLayout, ResetType, ResponseTable};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
