//! PUF quality metrics over a [`ResponseTable`].
//!
//! Every metric reduces to a pool of per-observation bit counts (set bits for
//! uniformity, differing bits for the three distance metrics) summarised as a
//! mean and population standard deviation, in bits and as a percentage of the
//! response width.
//!
//! | Metric     | Pool                                                    | Ideal |
//! |------------|---------------------------------------------------------|-------|
//! | Uniformity | set bits of every response                              | 50%   |
//! | Robustness | consecutive rows within each column                     | 0%    |
//! | Uniqueness | row-aligned, every ordered pair of distinct columns     | 50%   |
//! | Diffusion  | row-aligned, power-on vs soft-reset column of a board   | 50%   |
//!
//! Uniqueness counts both (A, B) and (B, A), so each distance appears twice.
//! This does not move the mean or standard deviation but doubles the sample
//! count; it is kept so results stay comparable with earlier reports.

use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::codec::{BitString, HexCodec, ResponseWidth};
use crate::config::MetricsConfig;
use crate::distance::{aligned_distances, consecutive_distances};
use crate::error::{EvaluationError, PufError, Result};
use crate::report::{ColumnUniformity, MetricOutcome, MetricsReport};
use crate::table::ResponseTable;

/// The four figures of merit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Uniformity,
    Uniqueness,
    Diffusion,
    Robustness,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        Self::Uniformity,
        Self::Uniqueness,
        Self::Diffusion,
        Self::Robustness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uniformity => "uniformity",
            Self::Uniqueness => "uniqueness",
            Self::Diffusion => "diffusion",
            Self::Robustness => "robustness",
        }
    }

    /// Target value in percent.
    pub fn ideal_percent(self) -> f64 {
        match self {
            Self::Robustness => 0.0,
            _ => 50.0,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean and population standard deviation of a pool of bit counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Number of observations in the pool.
    pub samples: usize,
    pub mean_bits: f64,
    pub std_dev_bits: f64,
    /// Mean as a percentage of the response width.
    pub mean_percent: f64,
    pub std_dev_percent: f64,
}

/// Accumulates bit counts for one metric.
///
/// Observations may be pushed incrementally; the summary only depends on the
/// multiset of values pushed.
#[derive(Debug, Clone)]
pub struct DistancePool {
    kind: MetricKind,
    width: ResponseWidth,
    values: Vec<f64>,
}

impl DistancePool {
    pub fn new(kind: MetricKind, width: ResponseWidth) -> Self {
        Self {
            kind,
            width,
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, bits: usize) {
        self.values.push(bits as f64);
    }

    pub fn extend(&mut self, bits: impl IntoIterator<Item = usize>) {
        self.values.extend(bits.into_iter().map(|b| b as f64));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Summarise the pool; an empty pool is "no data", never a zero result.
    pub fn finish(&self) -> Result<Metric> {
        if self.values.is_empty() {
            return Err(PufError::EmptyInput { metric: self.kind });
        }
        let mean_bits = self.values.iter().mean();
        let std_dev_bits = self.values.iter().population_std_dev();
        let scale = 100.0 / self.width.bits() as f64;
        log::debug!(
            "{}: {} observation(s), mean {:.3} bits",
            self.kind,
            self.values.len(),
            mean_bits
        );
        Ok(Metric {
            samples: self.values.len(),
            mean_bits,
            std_dev_bits,
            mean_percent: mean_bits * scale,
            std_dev_percent: std_dev_bits * scale,
        })
    }
}

/// Computes PUF metrics for responses of one fixed width.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEngine {
    codec: HexCodec,
}

impl MetricsEngine {
    pub fn new(width: ResponseWidth) -> Self {
        Self {
            codec: HexCodec::new(width),
        }
    }

    pub fn from_config(config: &MetricsConfig) -> Result<Self> {
        Ok(Self::new(ResponseWidth::new(config.width_bits)?))
    }

    pub fn width(&self) -> ResponseWidth {
        self.codec.width()
    }

    fn decode_column(&self, cells: &[String]) -> Result<Vec<BitString>> {
        cells.iter().map(|cell| self.codec.decode(cell)).collect()
    }

    fn decode_all(&self, table: &ResponseTable) -> Result<Vec<Vec<BitString>>> {
        table
            .columns()
            .map(|(_, cells)| self.decode_column(cells))
            .collect()
    }

    fn pool(&self, kind: MetricKind) -> DistancePool {
        DistancePool::new(kind, self.width())
    }

    /// Mean percentage of set bits over every response in the table.
    pub fn uniformity(&self, table: &ResponseTable) -> Result<Metric> {
        self.uniformity_pass(table)?.0.finish()
    }

    /// Uniformity broken down per column.
    pub fn column_uniformity(&self, table: &ResponseTable) -> Result<Vec<ColumnUniformity>> {
        Ok(self.uniformity_pass(table)?.1)
    }

    fn uniformity_pass(
        &self,
        table: &ResponseTable,
    ) -> Result<(DistancePool, Vec<ColumnUniformity>)> {
        let mut pool = self.pool(MetricKind::Uniformity);
        let mut per_column = Vec::with_capacity(table.column_count());
        for (key, cells) in table.columns() {
            let mut column_pool = self.pool(MetricKind::Uniformity);
            for bits in self.decode_column(cells)? {
                column_pool.push(bits.count_ones());
            }
            pool.extend(column_pool.values.iter().map(|&v| v as usize));
            per_column.push(ColumnUniformity {
                column: key.to_string(),
                responses: column_pool.len(),
                mean_percent: column_pool.finish().ok().map(|m| m.mean_percent),
            });
        }
        Ok((pool, per_column))
    }

    /// Intra-device distance between consecutive reads of each column.
    pub fn robustness(&self, table: &ResponseTable) -> Result<Metric> {
        let mut pool = self.pool(MetricKind::Robustness);
        for (_, cells) in table.columns() {
            let rows = self.decode_column(cells)?;
            pool.extend(consecutive_distances(&rows)?);
        }
        pool.finish()
    }

    /// Inter-device distance over every ordered pair of distinct columns.
    ///
    /// Undefined for tables covering fewer than two boards.
    pub fn uniqueness(&self, table: &ResponseTable) -> Result<Metric> {
        let kind = MetricKind::Uniqueness;
        let decoded = self.decode_all(table)?;
        if table.layout().boards().len() < 2 {
            return Err(PufError::EmptyInput { metric: kind });
        }
        let mut pool = self.pool(kind);
        for (i, a) in decoded.iter().enumerate() {
            for (j, b) in decoded.iter().enumerate() {
                if i != j {
                    pool.extend(aligned_distances(a, b)?);
                }
            }
        }
        pool.finish()
    }

    /// Distance between each board's power-on and soft-reset responses.
    pub fn diffusion(&self, table: &ResponseTable) -> Result<Metric> {
        let mut pool = self.pool(MetricKind::Diffusion);
        for (power_on, soft_reset) in table.layout().reset_pairs() {
            let a = self.decode_column(table.cells(power_on))?;
            let b = self.decode_column(table.cells(soft_reset))?;
            pool.extend(aligned_distances(&a, &b)?);
        }
        pool.finish()
    }

    /// Run all four metrics.
    ///
    /// A metric without eligible observations is reported as no data; any
    /// other failure aborts the evaluation and names the metric.
    pub fn evaluate(
        &self,
        table: &ResponseTable,
    ) -> std::result::Result<MetricsReport, EvaluationError> {
        let (uniformity_pool, column_uniformity) =
            self.uniformity_pass(table).map_err(|source| EvaluationError {
                metric: MetricKind::Uniformity,
                source,
            })?;

        Ok(MetricsReport {
            width_bits: self.width().bits(),
            columns: table.column_count(),
            boards: table.layout().boards().len(),
            responses: table.response_count(),
            uniformity: outcome(MetricKind::Uniformity, uniformity_pool.finish())?,
            uniqueness: outcome(MetricKind::Uniqueness, self.uniqueness(table))?,
            diffusion: outcome(MetricKind::Diffusion, self.diffusion(table))?,
            robustness: outcome(MetricKind::Robustness, self.robustness(table))?,
            column_uniformity,
        })
    }
}

fn outcome(
    metric: MetricKind,
    result: Result<Metric>,
) -> std::result::Result<MetricOutcome, EvaluationError> {
    match result {
        Ok(m) => Ok(MetricOutcome::Value(m)),
        Err(e) if e.is_empty_input() => Ok(MetricOutcome::NoData),
        Err(source) => Err(EvaluationError { metric, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnKey, ResetType};

    const ONES: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF";
    const ZEROS: &str = "00000000000000000000000000000000";

    fn key(board: u32, reset: ResetType) -> ColumnKey {
        ColumnKey::new(board, reset).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn single_board(p: &[&str], s: &[&str]) -> ResponseTable {
        ResponseTable::from_keyed([
            (key(1, ResetType::PowerOn), p.to_vec()),
            (key(1, ResetType::SoftReset), s.to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn uniformity_extremes() {
        let engine = MetricsEngine::default();
        let zeros = ResponseTable::from_keyed([(key(1, ResetType::PowerOn), vec![ZEROS, "0"])])
            .unwrap();
        let ones = ResponseTable::from_keyed([(key(1, ResetType::PowerOn), vec![ONES, ONES])])
            .unwrap();
        assert!(close(engine.uniformity(&zeros).unwrap().mean_percent, 0.0));
        assert!(close(engine.uniformity(&ones).unwrap().mean_percent, 100.0));
    }

    #[test]
    fn uniformity_averages_every_cell() {
        let engine = MetricsEngine::default();
        // 128, 0 and 64 set bits → 50%.
        let table = single_board(&[ONES, ZEROS], &["FFFFFFFFFFFFFFFF0000000000000000"]);
        let m = engine.uniformity(&table).unwrap();
        assert_eq!(m.samples, 3);
        assert!(close(m.mean_percent, 50.0));

        let per_column = engine.column_uniformity(&table).unwrap();
        assert_eq!(per_column.len(), 2);
        assert_eq!(per_column[0].column, "b1 power-on");
        assert_eq!(per_column[0].mean_percent, Some(50.0));
        assert_eq!(per_column[1].responses, 1);
    }

    #[test]
    fn robustness_identical_rows_is_zero() {
        let engine = MetricsEngine::default();
        let rows = ["1234ABCD1234ABCD1234ABCD1234ABCD"; 5];
        let table = ResponseTable::from_keyed([(key(1, ResetType::PowerOn), rows.to_vec())])
            .unwrap();
        let m = engine.robustness(&table).unwrap();
        assert_eq!(m.samples, 4);
        assert!(close(m.mean_percent, 0.0));
        assert!(close(m.std_dev_percent, 0.0));
    }

    #[test]
    fn robustness_pools_consecutive_pairs() {
        let engine = MetricsEngine::default();
        // Distances 128 and 0 in column one, 1 in column two.
        let table = single_board(&[ONES, ZEROS, ZEROS], &["0", "1"]);
        let m = engine.robustness(&table).unwrap();
        assert_eq!(m.samples, 3);
        assert!(close(m.mean_bits, 129.0 / 3.0));
        let mean: f64 = 129.0 / 3.0;
        let var = ((128.0 - mean).powi(2) + (0.0 - mean).powi(2) + (1.0 - mean).powi(2)) / 3.0;
        assert!((m.std_dev_bits - var.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn robustness_single_rows_is_no_data() {
        let engine = MetricsEngine::default();
        let table = single_board(&[ONES], &[ZEROS]);
        let err = engine.robustness(&table).unwrap_err();
        assert!(matches!(
            err,
            PufError::EmptyInput {
                metric: MetricKind::Robustness
            }
        ));
    }

    #[test]
    fn uniqueness_complements_is_full_distance() {
        let engine = MetricsEngine::default();
        let table = ResponseTable::from_keyed([
            (
                key(1, ResetType::PowerOn),
                vec![ONES, ZEROS, "F0F0F0F0F0F0F0F0F0F0F0F0F0F0F0F0"],
            ),
            (
                key(2, ResetType::PowerOn),
                vec![ZEROS, ONES, "0F0F0F0F0F0F0F0F0F0F0F0F0F0F0F0F"],
            ),
        ])
        .unwrap();
        let m = engine.uniqueness(&table).unwrap();
        assert!(close(m.mean_percent, 100.0));
        assert!(close(m.std_dev_percent, 0.0));
        // Both orderings are pooled.
        assert_eq!(m.samples, 6);
    }

    #[test]
    fn uniqueness_counts_both_orderings_across_all_columns() {
        let engine = MetricsEngine::default();
        let table = ResponseTable::from_csv_reader(
            format!("{ONES},{ZEROS},{ONES}\n{ONES},{ZEROS},{ZEROS}\n").as_bytes(),
        )
        .unwrap();
        let m = engine.uniqueness(&table).unwrap();
        // 3 columns → 6 ordered pairs × 2 rows.
        assert_eq!(m.samples, 12);
        // Unordered: (0,1)=[128,128] (0,2)=[0,128] (1,2)=[128,0] → 4×128 of 6.
        assert!(close(m.mean_bits, 128.0 * 4.0 / 6.0));
    }

    #[test]
    fn uniqueness_needs_two_boards() {
        let engine = MetricsEngine::default();
        let table = single_board(&[ONES], &[ZEROS]);
        assert!(engine.uniqueness(&table).unwrap_err().is_empty_input());
    }

    #[test]
    fn diffusion_identical_resets_is_zero() {
        let engine = MetricsEngine::default();
        let table = single_board(&[ONES, "ABCDEF"], &[ONES, "ABCDEF"]);
        let m = engine.diffusion(&table).unwrap();
        assert_eq!(m.samples, 2);
        assert!(close(m.mean_percent, 0.0));
    }

    #[test]
    fn diffusion_skips_trailing_unpaired_column() {
        let engine = MetricsEngine::default();
        let table =
            ResponseTable::from_csv_reader(format!("{ONES},{ZEROS},{ONES}\n").as_bytes()).unwrap();
        let m = engine.diffusion(&table).unwrap();
        assert_eq!(m.samples, 1);
        assert!(close(m.mean_percent, 100.0));
    }

    #[test]
    fn diffusion_without_pairs_is_no_data() {
        let engine = MetricsEngine::default();
        let table = ResponseTable::from_keyed([
            (key(1, ResetType::PowerOn), vec![ONES]),
            (key(2, ResetType::PowerOn), vec![ONES]),
        ])
        .unwrap();
        assert!(engine.diffusion(&table).unwrap_err().is_empty_input());
    }

    #[test]
    fn malformed_cell_aborts_metric() {
        let engine = MetricsEngine::default();
        let table = single_board(&[ONES, "XYZ"], &[ZEROS, ZEROS]);
        for result in [
            engine.uniformity(&table),
            engine.robustness(&table),
            engine.uniqueness(&table),
            engine.diffusion(&table),
        ] {
            assert!(matches!(result, Err(PufError::Format { .. })));
        }
    }

    #[test]
    fn evaluate_single_board_example() {
        let engine = MetricsEngine::default();
        let table = single_board(&[ONES], &[ZEROS]);
        let report = engine.evaluate(&table).unwrap();

        let uniformity = report.uniformity.value().unwrap();
        assert!(close(uniformity.mean_percent, 50.0));
        let diffusion = report.diffusion.value().unwrap();
        assert!(close(diffusion.mean_percent, 100.0));
        assert_eq!(report.robustness, MetricOutcome::NoData);
        assert_eq!(report.uniqueness, MetricOutcome::NoData);
        assert_eq!(report.boards, 1);
        assert_eq!(report.responses, 2);
    }

    #[test]
    fn evaluate_names_failing_metric() {
        let engine = MetricsEngine::default();
        let table = single_board(&["G"], &[ZEROS]);
        let err = engine.evaluate(&table).unwrap_err();
        assert_eq!(err.metric, MetricKind::Uniformity);
        assert!(matches!(err.source, PufError::Format { .. }));
    }

    #[test]
    fn engine_width_from_config() {
        let engine = MetricsEngine::from_config(&MetricsConfig { width_bits: 8 }).unwrap();
        let table = single_board(&["FF", "0F"], &["00", "0F"]);
        let m = engine.uniformity(&table).unwrap();
        assert!(close(m.mean_percent, (8.0 + 4.0 + 0.0 + 4.0) / 4.0 / 8.0 * 100.0));
        assert!(MetricsEngine::from_config(&MetricsConfig { width_bits: 6 }).is_err());
    }

    #[test]
    fn pool_is_order_independent() {
        let width = ResponseWidth::DEFAULT;
        let mut forward = DistancePool::new(MetricKind::Robustness, width);
        let mut backward = DistancePool::new(MetricKind::Robustness, width);
        let values = [3usize, 9, 0, 12, 7];
        forward.extend(values);
        for v in values.iter().rev() {
            backward.push(*v);
        }
        let a = forward.finish().unwrap();
        let b = backward.finish().unwrap();
        assert_eq!(a.samples, b.samples);
        assert!(close(a.mean_bits, b.mean_bits));
        assert!(close(a.std_dev_bits, b.std_dev_bits));
    }
}
