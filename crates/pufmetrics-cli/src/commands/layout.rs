//! `pufmetrics layout` — print the column mapping.

use pufmetrics_core::ColumnLayout;

pub fn run(boards: u32) {
    if boards == 0 {
        eprintln!("Error: --boards must be at least 1");
        std::process::exit(1);
    }

    let layout = ColumnLayout::for_boards(boards);
    println!("{:>6}  {:>5}  {:<8}  {}", "column", "index", "board", "reset");
    for key in layout.keys() {
        println!(
            "{:>6}  {:>5}  {:<8}  {} ({})",
            key.column_number(),
            key.column_index(),
            key.board.to_string(),
            key.reset,
            key.reset.code()
        );
    }
}
