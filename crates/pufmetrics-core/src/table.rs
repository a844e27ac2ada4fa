//! Response tables and the (board, reset type) ↔ column mapping.
//!
//! A table holds one column per (board id, reset type) combination. On disk
//! it is a header-less CSV where, for board `b`, power-on responses live in
//! column number `2b − 1` and soft-reset responses in column `2b` (1-based).
//!
//! Two shapes are accepted. A capture log, as written by the acquisition
//! appender, has exactly one non-blank cell per row; each column is then the
//! sequence of its non-blank cells. Any other file is a dense table where
//! row `k` is one observation across all columns. Blank cells there may only
//! trail the end of a shorter column.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PufError, Result};

// ---------------------------------------------------------------------------
// Column keys
// ---------------------------------------------------------------------------

/// How the device was reset before the SRAM window was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetType {
    PowerOn,
    SoftReset,
}

impl ResetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PowerOn => "power-on",
            Self::SoftReset => "soft-reset",
        }
    }

    /// Single-letter code used on the command line (`p` / `s`).
    pub fn code(self) -> char {
        match self {
            Self::PowerOn => 'p',
            Self::SoftReset => 's',
        }
    }
}

impl fmt::Display for ResetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetType {
    type Err = PufError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "power-on" | "poweron" | "power_on" => Ok(Self::PowerOn),
            "s" | "soft-reset" | "softreset" | "soft_reset" => Ok(Self::SoftReset),
            other => Err(PufError::Layout(format!(
                "reset type must be 'p' or 's', got '{other}'"
            ))),
        }
    }
}

/// 1-based board identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BoardId(u32);

impl BoardId {
    pub fn new(id: u32) -> Result<Self> {
        if id == 0 {
            return Err(PufError::Layout("board ids start at 1".to_string()));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for BoardId {
    type Error = PufError;

    fn try_from(id: u32) -> Result<Self> {
        Self::new(id)
    }
}

impl From<BoardId> for u32 {
    fn from(id: BoardId) -> u32 {
        id.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Identifies one column: a board under one reset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    pub board: BoardId,
    pub reset: ResetType,
}

impl ColumnKey {
    pub fn new(board: u32, reset: ResetType) -> Result<Self> {
        Ok(Self {
            board: BoardId::new(board)?,
            reset,
        })
    }

    /// 0-based CSV column index: `2b − 2` for power-on, `2b − 1` for soft reset.
    pub fn column_index(&self) -> usize {
        let base = (self.board.get() as usize - 1) * 2;
        match self.reset {
            ResetType::PowerOn => base,
            ResetType::SoftReset => base + 1,
        }
    }

    /// 1-based column number: `2b − 1` for power-on, `2b` for soft reset.
    pub fn column_number(&self) -> usize {
        self.column_index() + 1
    }

    /// Inverse of [`column_index`](Self::column_index).
    pub fn from_index(index: usize) -> Self {
        let reset = if index % 2 == 0 {
            ResetType::PowerOn
        } else {
            ResetType::SoftReset
        };
        Self {
            board: BoardId(index as u32 / 2 + 1),
            reset,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.board, self.reset)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Validated mapping from column position to [`ColumnKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    keys: Vec<ColumnKey>,
}

impl ColumnLayout {
    /// Conventional layout: column `i` belongs to board `i/2 + 1`,
    /// even positions power-on, odd positions soft reset.
    pub fn positional(columns: usize) -> Self {
        Self {
            keys: (0..columns).map(ColumnKey::from_index).collect(),
        }
    }

    /// Positional layout covering `boards` boards with both reset types.
    pub fn for_boards(boards: u32) -> Self {
        Self::positional(boards as usize * 2)
    }

    /// Explicit layout; position `i` of the table holds `keys[i]`.
    pub fn from_keys(keys: Vec<ColumnKey>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(*key) {
                return Err(PufError::Layout(format!("duplicate column '{key}'")));
            }
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[ColumnKey] {
        &self.keys
    }

    pub fn position_of(&self, key: ColumnKey) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }

    /// Distinct boards, ascending.
    pub fn boards(&self) -> Vec<BoardId> {
        let mut boards: Vec<BoardId> = self.keys.iter().map(|k| k.board).collect();
        boards.sort_unstable();
        boards.dedup();
        boards
    }

    /// `(power-on, soft-reset)` position pairs for every board that has both.
    pub fn reset_pairs(&self) -> Vec<(usize, usize)> {
        self.boards()
            .into_iter()
            .filter_map(|board| {
                let p = self.position_of(ColumnKey {
                    board,
                    reset: ResetType::PowerOn,
                })?;
                let s = self.position_of(ColumnKey {
                    board,
                    reset: ResetType::SoftReset,
                })?;
                Some((p, s))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Immutable table of hex responses, one column per [`ColumnKey`].
#[derive(Debug, Clone)]
pub struct ResponseTable {
    layout: ColumnLayout,
    columns: Vec<Vec<String>>,
}

impl ResponseTable {
    pub fn new(layout: ColumnLayout, columns: Vec<Vec<String>>) -> Result<Self> {
        if layout.len() != columns.len() {
            return Err(PufError::Layout(format!(
                "layout has {} column(s) but {} were supplied",
                layout.len(),
                columns.len()
            )));
        }
        Ok(Self { layout, columns })
    }

    /// Build from `(key, cells)` pairs, validating the keys.
    pub fn from_keyed<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ColumnKey, Vec<S>)>,
        S: Into<String>,
    {
        let (keys, cells): (Vec<ColumnKey>, Vec<Vec<String>>) = columns
            .into_iter()
            .map(|(key, cells)| (key, cells.into_iter().map(Into::into).collect::<Vec<String>>()))
            .unzip();
        Self::new(ColumnLayout::from_keys(keys)?, cells)
    }

    /// Parse a header-less CSV with the positional layout.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        for record in csv.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let capture_log = rows
            .iter()
            .all(|row| row.iter().filter(|cell| cell.is_some()).count() == 1);
        let columns = if capture_log {
            squeeze_columns(rows, width)
        } else {
            dense_columns(rows, width)?
        };

        log::debug!(
            "loaded {} response table: {} column(s), {} response(s)",
            if capture_log { "capture-log" } else { "dense" },
            columns.len(),
            columns.iter().map(Vec::len).sum::<usize>()
        );
        Self::new(ColumnLayout::positional(columns.len()), columns)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Total number of responses across all columns.
    pub fn response_count(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn cells(&self, position: usize) -> &[String] {
        self.columns.get(position).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Columns in table order with their keys.
    pub fn columns(&self) -> impl Iterator<Item = (ColumnKey, &[String])> + '_ {
        self.layout
            .keys()
            .iter()
            .copied()
            .zip(self.columns.iter().map(Vec::as_slice))
    }
}

/// One filled cell per row: each column keeps its cells in order.
fn squeeze_columns(rows: Vec<Vec<Option<String>>>, width: usize) -> Vec<Vec<String>> {
    let mut columns = vec![Vec::new(); width];
    for row in rows {
        for (i, cell) in row.into_iter().enumerate() {
            if let Some(cell) = cell {
                columns[i].push(cell);
            }
        }
    }
    columns
}

/// Row positions are kept; a blank followed by a later value in the same
/// column is a hole and rejected.
fn dense_columns(rows: Vec<Vec<Option<String>>>, width: usize) -> Result<Vec<Vec<String>>> {
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); width];
    let mut ended: Vec<Option<usize>> = vec![None; width];
    for (r, row) in rows.into_iter().enumerate() {
        for c in 0..width {
            match row.get(c).cloned().flatten() {
                Some(cell) => {
                    if let Some(blank_row) = ended[c] {
                        return Err(PufError::format(
                            "",
                            format!(
                                "blank cell at row {}, column {} of a dense table",
                                blank_row + 1,
                                c + 1
                            ),
                        ));
                    }
                    columns[c].push(cell);
                }
                None => {
                    ended[c].get_or_insert(r);
                }
            }
        }
    }
    Ok(columns)
}
