//! `pufmetrics record` — capture responses from a serial line.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pufmetrics_core::{
    Acquisition, ColumnKey, DeviceConnector, PufError, ResetType, TableAppender,
};

/// Run the record command.
pub fn run(
    port: &str,
    board: u32,
    reset: &str,
    output: &str,
    retry_delay: Option<&str>,
    max_retries: Option<u32>,
    config: Option<&str>,
) {
    let mut config = super::load_config(config).acquisition;
    if let Some(delay) = retry_delay {
        match super::parse_duration(delay) {
            Some(d) => config.reconnect.initial_delay_ms = d.as_millis() as u64,
            None => {
                eprintln!("Invalid duration: {delay}");
                std::process::exit(1);
            }
        }
    }
    if max_retries.is_some() {
        config.reconnect.max_attempts = max_retries;
    }

    let key = match reset
        .parse::<ResetType>()
        .and_then(|reset| ColumnKey::new(board, reset))
    {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let appender = match TableAppender::open(Path::new(output), key) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error opening {output}: {e}");
            std::process::exit(1);
        }
    };

    // First Ctrl+C finishes the capture; a second one exits immediately.
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if s.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    println!("Recording PUF responses");
    println!(
        "  Port:      {port} ({} baud, {}ms read timeout)",
        config.baud_rate, config.read_timeout_ms
    );
    println!("  Column:    {} ({key})", key.column_number());
    println!("  Chunks:    {} per response", config.chunk_count);
    match config.reconnect.max_attempts {
        Some(n) => println!(
            "  Reconnect: every {}ms, up to {n} attempt(s)",
            config.reconnect.initial_delay_ms
        ),
        None => println!(
            "  Reconnect: every {}ms, until Ctrl+C",
            config.reconnect.initial_delay_ms
        ),
    }
    println!("  Output:    {output}");
    println!();

    let connector = DeviceConnector::new(port, &config);
    let mut acquisition = Acquisition::new(connector, appender, &config);
    let result = acquisition.run(&stop);
    let summary = acquisition.summary();

    println!();
    println!(
        "Captured {} response(s), {} chunk(s) discarded, {} reconnect(s)",
        summary.responses, summary.discarded_chunks, summary.reconnects
    );

    match result {
        Ok(_) => println!("Responses appended to {output}"),
        Err(e @ PufError::ReconnectExhausted { .. }) => {
            eprintln!("Recording stopped: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error writing {output}: {e}");
            std::process::exit(1);
        }
    }
}
