//! Resumable FEN backfill over a row store.
//!
//! Each `run_batch` call handles at most `batch_size` rows starting at the
//! persisted cursor, writes the derived columns back in bulk and advances the
//! cursor. The host re-invokes it (e.g. from a timer) until the store is
//! drained. Invocations must not overlap: the cursor is read and written
//! without any compare-and-swap.

use super::engine::{RulesEngine, ShakmatyEngine};
use super::error::{ChessError, ChessResult, ErrorAccumulator};
use super::fen;
use super::log;
use super::splitter::parse_game_record;
use super::store::{CursorStore, Grid, HeaderIndex, RowStore, ensure_column};
use super::trajectory::TrajectoryBuilder;
use super::types::{
    Cell, DERIVED_COLUMN_COUNT, DERIVED_HEADERS, DerivedColumn, PGN_HEADER, component_cells,
};

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_CURSOR_KEY: &str = "pgn_fens.backfill.cursor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillConfig {
    pub batch_size: usize,
    pub cursor_key: String,
    pub header_row: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cursor_key: DEFAULT_CURSOR_KEY.to_string(),
            header_row: 1,
        }
    }
}

impl BackfillConfig {
    pub fn validate(&self) -> ChessResult<()> {
        if self.batch_size == 0 {
            return Err(ChessError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.header_row == 0 {
            return Err(ChessError::InvalidConfig(
                "header_row is 1-based".to_string(),
            ));
        }
        if self.cursor_key.trim().is_empty() {
            return Err(ChessError::InvalidConfig(
                "cursor_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn first_data_row(&self) -> usize {
        self.header_row + 1
    }
}

/// What happened to one row of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The FEN cell was already populated and was left as is.
    Kept,
    Computed(String),
    /// The record parsed but has no moves.
    NoMoves,
    /// No source record in this row.
    NoSource,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub start_row: usize,
    /// Last row processed, `None` when there was nothing to do.
    pub end_row: Option<usize>,
    pub computed: usize,
    pub kept: usize,
    pub empty: usize,
    pub failed: usize,
    pub next_cursor: usize,
    pub drained: bool,
    pub errors: Option<String>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.computed + self.kept + self.empty + self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillStatus {
    pub cursor: usize,
    pub last_row: usize,
    pub remaining: usize,
}

struct ColumnLayout {
    source: usize,
    derived: [usize; DERIVED_COLUMN_COUNT],
}

pub struct BackfillController<'a, S, C, E = ShakmatyEngine> {
    store: &'a mut S,
    cursor: &'a mut C,
    builder: TrajectoryBuilder<E>,
    config: BackfillConfig,
}

impl<'a, S, C, E> BackfillController<'a, S, C, E>
where
    S: RowStore,
    C: CursorStore,
    E: RulesEngine,
{
    pub fn new(
        store: &'a mut S,
        cursor: &'a mut C,
        builder: TrajectoryBuilder<E>,
        config: BackfillConfig,
    ) -> ChessResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cursor,
            builder,
            config,
        })
    }

    pub fn status(&self) -> ChessResult<BackfillStatus> {
        let cursor = self.load_cursor()?;
        let last_row = self.store.last_row();
        Ok(BackfillStatus {
            cursor,
            last_row,
            remaining: (last_row + 1).saturating_sub(cursor),
        })
    }

    /// Points the cursor back at the first data row.
    pub fn reset_cursor(&mut self) -> ChessResult<()> {
        let first = self.config.first_data_row();
        self.cursor
            .set(&self.config.cursor_key, &first.to_string())?;
        log::info(format!("backfill cursor reset to row {first}"));
        Ok(())
    }

    pub fn run_batch(&mut self) -> ChessResult<BatchReport> {
        let start = self.load_cursor()?;
        let last_row = self.store.last_row();

        if start > last_row {
            log::debug(format!(
                "backfill drained: cursor={start} last_row={last_row}"
            ));
            return Ok(BatchReport {
                start_row: start,
                next_cursor: start,
                drained: true,
                ..BatchReport::default()
            });
        }

        let layout = self.resolve_layout()?;
        let end = last_row.min(start + self.config.batch_size - 1);
        let num_rows = end - start + 1;

        let sources = self.store.get_range(start, layout.source, num_rows, 1)?;
        let existing = self.store.get_range(
            start,
            layout.derived[DerivedColumn::Fen.index()],
            num_rows,
            1,
        )?;

        let mut report = BatchReport {
            start_row: start,
            end_row: Some(end),
            next_cursor: end + 1,
            drained: end >= last_row,
            ..BatchReport::default()
        };
        let mut errors = ErrorAccumulator::default();
        let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(num_rows);

        for (offset, (source, current)) in sources.iter().zip(existing.iter()).enumerate() {
            let row = start + offset;
            let source = source.first().cloned().unwrap_or_default();
            let current = current.first().cloned().unwrap_or_default();

            let outcome = self.process_row(&source, &current)?;
            let fen_cell = match &outcome {
                RowOutcome::Kept => {
                    report.kept += 1;
                    current
                }
                RowOutcome::Computed(fen) => {
                    report.computed += 1;
                    Cell::text(fen.as_str())
                }
                RowOutcome::NoMoves | RowOutcome::NoSource => {
                    report.empty += 1;
                    Cell::Empty
                }
                RowOutcome::Failed(msg) => {
                    report.failed += 1;
                    log::warn(format!("backfill row {row}: {msg}"));
                    errors.push(&format!("row {row}: {msg}"));
                    Cell::Empty
                }
            };

            let components = fen::decode(&fen_cell.as_text());
            let mut values = Vec::with_capacity(DERIVED_COLUMN_COUNT);
            values.push(fen_cell);
            values.extend(component_cells(&components));
            rows.push(values);
        }

        self.write_derived(&layout, start, rows)?;
        self.cursor
            .set(&self.config.cursor_key, &report.next_cursor.to_string())?;

        report.errors = errors.take();
        log::info(format!(
            "backfill rows {start}..={end}: computed={} kept={} empty={} failed={}",
            report.computed, report.kept, report.empty, report.failed
        ));
        Ok(report)
    }

    /// Runs batches until the store is drained or `max_batches` ran.
    pub fn run_until_drained(&mut self, max_batches: usize) -> ChessResult<Vec<BatchReport>> {
        let mut reports = Vec::new();
        for _ in 0..max_batches {
            let report = self.run_batch()?;
            let drained = report.drained;
            reports.push(report);
            if drained {
                break;
            }
        }
        Ok(reports)
    }

    fn process_row(&self, source: &Cell, current: &Cell) -> ChessResult<RowOutcome> {
        if !current.is_blank() {
            return Ok(RowOutcome::Kept);
        }
        if source.is_blank() {
            return Ok(RowOutcome::NoSource);
        }

        let record = parse_game_record(source.as_text().into_owned());
        match self.builder.final_position(&record) {
            Ok(Some(fen)) => Ok(RowOutcome::Computed(fen)),
            Ok(None) => Ok(RowOutcome::NoMoves),
            Err(ChessError::InvalidRecord(msg)) => Ok(RowOutcome::Failed(msg)),
            Err(other) => Err(other),
        }
    }

    fn load_cursor(&self) -> ChessResult<usize> {
        let first = self.config.first_data_row();
        match self.cursor.get(&self.config.cursor_key)? {
            None => Ok(first),
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map(|row| row.max(first))
                .map_err(|_| {
                    ChessError::InvalidConfig(format!(
                        "cursor '{}' holds non-numeric value '{raw}'",
                        self.config.cursor_key
                    ))
                }),
        }
    }

    fn resolve_layout(&mut self) -> ChessResult<ColumnLayout> {
        let header_row = self.config.header_row;
        let mut headers = HeaderIndex::read(&*self.store, header_row)?;
        let source = headers.require(PGN_HEADER)?;

        let mut derived = [0usize; DERIVED_COLUMN_COUNT];
        for (slot, name) in derived.iter_mut().zip(DERIVED_HEADERS) {
            *slot = ensure_column(&mut *self.store, &mut headers, header_row, name)?;
        }

        Ok(ColumnLayout { source, derived })
    }

    /// One `set_range` per run of adjacent derived columns.
    fn write_derived(&mut self, layout: &ColumnLayout, start: usize, rows: Grid) -> ChessResult<()> {
        let num_rows = rows.len();
        let mut order: Vec<(usize, usize)> = layout
            .derived
            .iter()
            .enumerate()
            .map(|(idx, col)| (*col, idx))
            .collect();
        order.sort_unstable();

        for run in contiguous_runs(&order) {
            let first_col = run[0].0;
            let block: Grid = rows
                .iter()
                .map(|values| run.iter().map(|(_, idx)| values[*idx].clone()).collect())
                .collect();
            self.store
                .set_range(start, first_col, num_rows, run.len(), block)?;
        }
        Ok(())
    }
}

fn contiguous_runs(sorted: &[(usize, usize)]) -> Vec<&[(usize, usize)]> {
    let mut runs = Vec::new();
    let mut begin = 0;
    for i in 1..=sorted.len() {
        if i == sorted.len() || sorted[i].0 != sorted[i - 1].0 + 1 {
            if begin < i {
                runs.push(&sorted[begin..i]);
            }
            begin = i;
        }
    }
    runs
}
