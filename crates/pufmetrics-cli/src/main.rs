//! CLI for pufmetrics — capture SRAM PUF responses and score them.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pufmetrics")]
#[command(about = "pufmetrics — quality metrics for SRAM PUF responses")]
#[command(version = pufmetrics_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute uniformity, uniqueness, diffusion and robustness of a response table
    Metrics {
        /// Header-less CSV table, one column per board and reset type
        table: String,

        /// Response width in bits (multiple of 4). Overrides the config file.
        #[arg(long)]
        width: Option<usize>,

        /// Write the full report as JSON
        #[arg(long)]
        output: Option<String>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<String>,
    },

    /// Capture responses from a board's serial line into the response table.
    /// Runs until Ctrl+C, reconnecting whenever the link drops.
    Record {
        /// Serial port, e.g. /dev/ttyACM0 or COM3
        #[arg(long)]
        port: String,

        /// Board number (1-based)
        #[arg(long)]
        board: u32,

        /// Reset type of the captured responses: p (power-on) or s (soft reset)
        #[arg(long)]
        reset: String,

        /// Table to append to
        #[arg(long, default_value = "data_sram_puf.csv")]
        output: String,

        /// Delay before reconnecting, e.g. "5s", "500ms"
        #[arg(long)]
        retry_delay: Option<String>,

        /// Give up after this many consecutive failed reconnects (default: never)
        #[arg(long)]
        max_retries: Option<u32>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<String>,
    },

    /// Show which table columns belong to which board and reset type
    Layout {
        /// Number of boards
        #[arg(long, default_value = "1")]
        boards: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    match cli.command {
        Commands::Metrics {
            table,
            width,
            output,
            config,
        } => commands::metrics::run(&table, width, output.as_deref(), config.as_deref()),
        Commands::Record {
            port,
            board,
            reset,
            output,
            retry_delay,
            max_retries,
            config,
        } => commands::record::run(
            &port,
            board,
            &reset,
            &output,
            retry_delay.as_deref(),
            max_retries,
            config.as_deref(),
        ),
        Commands::Layout { boards } => commands::layout::run(boards),
    }
}
