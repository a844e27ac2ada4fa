//! Labeled metric results for printing and JSON export.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::{Metric, MetricKind};

/// Result of one metric: a value, or no eligible observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Value(Metric),
    NoData,
}

impl MetricOutcome {
    pub fn value(&self) -> Option<&Metric> {
        match self {
            Self::Value(m) => Some(m),
            Self::NoData => None,
        }
    }
}

/// Share of set bits within one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnUniformity {
    /// Column label, e.g. `b2 soft-reset`.
    pub column: String,
    pub responses: usize,
    /// `None` when the column holds no responses.
    pub mean_percent: Option<f64>,
}

/// Everything one evaluation run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub width_bits: usize,
    pub columns: usize,
    pub boards: usize,
    pub responses: usize,
    pub uniformity: MetricOutcome,
    pub uniqueness: MetricOutcome,
    pub diffusion: MetricOutcome,
    pub robustness: MetricOutcome,
    pub column_uniformity: Vec<ColumnUniformity>,
}

impl MetricsReport {
    pub fn outcome(&self, kind: MetricKind) -> &MetricOutcome {
        match kind {
            MetricKind::Uniformity => &self.uniformity,
            MetricKind::Uniqueness => &self.uniqueness,
            MetricKind::Diffusion => &self.diffusion,
            MetricKind::Robustness => &self.robustness,
        }
    }
}

fn label(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Uniformity => "Uniformity (Average % of '1's)",
        MetricKind::Uniqueness => "Uniqueness (Inter-device HD)",
        MetricKind::Diffusion => "Diffusion",
        MetricKind::Robustness => "Robustness (Intra-device HD)",
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PUF Metrics Results:")?;
        writeln!(
            f,
            "  {} response(s), {} column(s), {} board(s), {}-bit responses",
            self.responses, self.columns, self.boards, self.width_bits
        )?;
        for kind in MetricKind::ALL {
            match self.outcome(kind) {
                MetricOutcome::Value(m) => writeln!(
                    f,
                    "{}: Mean = {:.2}%, Std = {:.2}% (n={}, ideal {:.0}%)",
                    label(kind),
                    m.mean_percent,
                    m.std_dev_percent,
                    m.samples,
                    kind.ideal_percent()
                )?,
                MetricOutcome::NoData => writeln!(f, "{}: no data", label(kind))?,
            }
        }
        Ok(())
    }
}
