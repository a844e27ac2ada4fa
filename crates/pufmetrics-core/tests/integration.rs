//! Integration tests for pufmetrics-core.
//!
//! These tests cover the full pipeline:
//! firmware lines → capture → CSV table → metrics report.

use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pufmetrics_core::{
    Acquisition, AcquisitionConfig, ColumnKey, Connector, MetricOutcome, MetricsEngine,
    PufError, ReconnectPolicy, ResetType, ResponseTable, TableAppender,
};

const ONES: [u8; 16] = [0xFF; 16];
const ZEROS: [u8; 16] = [0x00; 16];

/// Serves each queued firmware dump once, then raises the stop flag.
struct ReplayConnector {
    dumps: VecDeque<String>,
    stop: Arc<AtomicBool>,
}

impl Connector for ReplayConnector {
    type Link = Cursor<Vec<u8>>;

    fn connect(&mut self) -> io::Result<Self::Link> {
        match self.dumps.pop_front() {
            Some(dump) => Ok(Cursor::new(dump.into_bytes())),
            None => {
                self.stop.store(true, Ordering::SeqCst);
                Err(io::Error::new(io::ErrorKind::NotFound, "board unplugged"))
            }
        }
    }

    fn describe(&self) -> String {
        "replay".to_string()
    }
}

fn firmware_dump(bytes: &[u8]) -> String {
    let mut out = String::from("SRAM PUF demo\r\n");
    for (i, b) in bytes.iter().enumerate() {
        out.push_str(&format!("PUF[{i:02}]: {b:02X}\r\n"));
    }
    out
}

fn config() -> AcquisitionConfig {
    AcquisitionConfig {
        reconnect: ReconnectPolicy {
            initial_delay_ms: 0,
            ..ReconnectPolicy::default()
        },
        ..AcquisitionConfig::default()
    }
}

fn capture(path: &Path, board: u32, reset: ResetType, responses: &[[u8; 16]]) -> u64 {
    let stop = Arc::new(AtomicBool::new(false));
    let connector = ReplayConnector {
        dumps: responses.iter().map(|r| firmware_dump(r)).collect(),
        stop: stop.clone(),
    };
    let key = ColumnKey::new(board, reset).unwrap();
    let appender = TableAppender::open(path, key).unwrap();
    let mut acquisition = Acquisition::new(connector, appender, &config());
    acquisition.run(&stop).unwrap().responses
}

#[test]
fn captured_table_evaluates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data_sram_puf.csv");

    assert_eq!(capture(&path, 1, ResetType::PowerOn, &[ONES, ONES]), 2);
    assert_eq!(capture(&path, 1, ResetType::SoftReset, &[ZEROS, ZEROS]), 2);
    assert_eq!(capture(&path, 2, ResetType::PowerOn, &[ZEROS, ZEROS]), 2);
    assert_eq!(capture(&path, 2, ResetType::SoftReset, &[ONES, ONES]), 2);

    let table = ResponseTable::from_csv_path(&path).unwrap();
    assert_eq!(table.column_count(), 4);
    assert_eq!(table.response_count(), 8);

    let report = MetricsEngine::default().evaluate(&table).unwrap();
    assert_eq!(report.boards, 2);

    let uniformity = report.uniformity.value().unwrap();
    assert!((uniformity.mean_percent - 50.0).abs() < 1e-9);
    assert!((uniformity.std_dev_percent - 50.0).abs() < 1e-9);

    let robustness = report.robustness.value().unwrap();
    assert_eq!(robustness.samples, 4);
    assert!(robustness.mean_percent.abs() < 1e-9);

    let diffusion = report.diffusion.value().unwrap();
    assert_eq!(diffusion.samples, 4);
    assert!((diffusion.mean_percent - 100.0).abs() < 1e-9);

    // 12 ordered column pairs × 2 rows; 8 of the 12 pairs are complements.
    let uniqueness = report.uniqueness.value().unwrap();
    assert_eq!(uniqueness.samples, 24);
    assert!((uniqueness.mean_percent - 200.0 / 3.0).abs() < 1e-9);
    assert!((uniqueness.std_dev_percent - (2.0f64 / 9.0).sqrt() * 100.0).abs() < 1e-9);

    let labels: Vec<&str> = report
        .column_uniformity
        .iter()
        .map(|c| c.column.as_str())
        .collect();
    assert_eq!(
        labels,
        ["b1 power-on", "b1 soft-reset", "b2 power-on", "b2 soft-reset"]
    );
}

#[test]
fn single_board_table_has_no_uniqueness() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one_board.csv");
    std::fs::write(
        &path,
        "00000000000000000000000000000000,FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF\n",
    )
    .unwrap();

    let table = ResponseTable::from_csv_path(&path).unwrap();
    let report = MetricsEngine::default().evaluate(&table).unwrap();
    assert_eq!(report.uniqueness, MetricOutcome::NoData);
    assert_eq!(report.robustness, MetricOutcome::NoData);
    assert!((report.diffusion.value().unwrap().mean_percent - 100.0).abs() < 1e-9);

    let text = report.to_string();
    assert!(text.contains("Uniqueness (Inter-device HD): no data"));
    assert!(text.contains("Diffusion: Mean = 100.00%"));
}

#[test]
fn dense_table_rows_stay_aligned() {
    let ones = "F".repeat(32);
    let zeros = "0".repeat(32);
    let dir = tempfile::tempdir().unwrap();

    let aligned = dir.path().join("aligned.csv");
    std::fs::write(
        &aligned,
        format!("{ones},{ones}\n{zeros},{ones}\n{zeros},{zeros}\n"),
    )
    .unwrap();
    let table = ResponseTable::from_csv_path(&aligned).unwrap();
    let diffusion = MetricsEngine::default().diffusion(&table).unwrap();
    assert_eq!(diffusion.samples, 3);
    assert!((diffusion.mean_percent - 100.0 / 3.0).abs() < 1e-9);

    // A hole in row 2 must not pull row 3 up against row 2 of the other column.
    let holed = dir.path().join("holed.csv");
    std::fs::write(
        &holed,
        format!("{ones},{ones}\n,{ones}\n{zeros},{zeros}\n"),
    )
    .unwrap();
    let err = ResponseTable::from_csv_path(&holed).unwrap_err();
    assert!(matches!(err, PufError::Format { .. }));
}

#[test]
fn corrupted_cell_names_the_metric() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.csv");
    std::fs::write(&path, "DEADBEEF,NOTHEX\n").unwrap();

    let table = ResponseTable::from_csv_path(&path).unwrap();
    let err = MetricsEngine::default().evaluate(&table).unwrap_err();
    assert!(matches!(err.source, PufError::Format { .. }));
    assert!(err.to_string().starts_with("uniformity failed"));
}

#[test]
fn report_exports_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("table.csv");
    std::fs::write(&csv_path, "0F,F0\n0F,F0\n").unwrap();

    let table = ResponseTable::from_csv_path(&csv_path).unwrap();
    let engine = MetricsEngine::new(pufmetrics_core::ResponseWidth::new(8).unwrap());
    let report = engine.evaluate(&table).unwrap();

    let json_path = dir.path().join("report.json");
    std::fs::write(&json_path, serde_json::to_string_pretty(&report).unwrap()).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(value["width_bits"], 8);
    assert_eq!(value["diffusion"]["status"], "value");
    assert_eq!(value["diffusion"]["mean_percent"], 100.0);
    assert_eq!(value["uniqueness"]["status"], "no_data");
}
