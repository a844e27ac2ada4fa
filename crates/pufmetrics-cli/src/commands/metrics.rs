//! `pufmetrics metrics` — score a response table.

use std::path::Path;

use pufmetrics_core::{MetricsEngine, ResponseTable};

pub fn run(table_path: &str, width: Option<usize>, output: Option<&str>, config: Option<&str>) {
    let mut config = super::load_config(config);
    if let Some(bits) = width {
        config.metrics.width_bits = bits;
    }

    let engine = match MetricsEngine::from_config(&config.metrics) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let table = match ResponseTable::from_csv_path(Path::new(table_path)) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error reading {table_path}: {e}");
            std::process::exit(1);
        }
    };
    if table.response_count() == 0 {
        eprintln!("Warning: {table_path} holds no responses");
    }

    let report = match engine.evaluate(&table) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("{report}");
    println!("Per-column uniformity:");
    for column in &report.column_uniformity {
        match column.mean_percent {
            Some(p) => println!(
                "  {:<16} {:>6.2}%  ({} response(s))",
                column.column, p, column.responses
            ),
            None => println!("  {:<16} {:>7}  (0 responses)", column.column, "-"),
        }
    }

    if let Some(path) = output {
        let json = match serde_json::to_string_pretty(&report) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("Error writing {path}: {e}");
            std::process::exit(1);
        }
        println!();
        println!("Report written to {path}");
    }
}
