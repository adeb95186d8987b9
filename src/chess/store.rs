//! Row-store and cursor-store capabilities.
//!
//! Rows and columns are 1-based, row 1 normally holds headers. The in-memory
//! implementations back the tests and small embedded hosts; `FileCursorStore`
//! persists the backfill cursor as a JSON object on disk.

use super::error::{ChessError, ChessResult};
use super::types::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

pub type Grid = Vec<Vec<Cell>>;

pub trait RowStore {
    /// Reads a `num_rows` x `num_cols` block. Cells beyond the stored extent read as empty.
    fn get_range(
        &self,
        row_start: usize,
        col_start: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> ChessResult<Grid>;

    fn set_range(
        &mut self,
        row_start: usize,
        col_start: usize,
        num_rows: usize,
        num_cols: usize,
        values: Grid,
    ) -> ChessResult<()>;

    fn last_row(&self) -> usize;

    fn last_column(&self) -> usize;

    /// Appends an empty column and returns its 1-based index.
    fn insert_column(&mut self) -> ChessResult<usize>;
}

pub trait CursorStore {
    fn get(&self, key: &str) -> ChessResult<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> ChessResult<()>;
}

/// Resolves a sheet by name or position.
pub trait SheetSource {
    type Sheet: RowStore;

    fn sheet(&self, selector: &SheetSelector) -> Option<(&str, &Self::Sheet)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Name(String),
    /// 0-based position in the workbook.
    Index(usize),
}

impl From<&str> for SheetSelector {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Header-name lookup for one sheet.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
    width: usize,
}

impl HeaderIndex {
    pub fn read<S: RowStore + ?Sized>(store: &S, header_row: usize) -> ChessResult<Self> {
        let width = store.last_column();
        if width == 0 {
            return Ok(Self::default());
        }

        let row = store
            .get_range(header_row, 1, 1, width)?
            .into_iter()
            .next()
            .unwrap_or_default();
        let mut columns = HashMap::new();
        for (idx, cell) in row.iter().enumerate() {
            let name = cell.as_text().trim().to_string();
            if !name.is_empty() {
                // First occurrence wins for duplicated headers.
                columns.entry(name).or_insert(idx + 1);
            }
        }

        Ok(Self { columns, width })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn require(&self, name: &str) -> ChessResult<usize> {
        self.column(name)
            .ok_or_else(|| ChessError::InvalidConfig(format!("missing required column '{name}'")))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn insert(&mut self, name: &str, column: usize) {
        self.columns.insert(name.to_string(), column);
        self.width = self.width.max(column);
    }
}

/// Returns the column of `name`, appending a new headed column when absent.
pub fn ensure_column<S: RowStore + ?Sized>(
    store: &mut S,
    headers: &mut HeaderIndex,
    header_row: usize,
    name: &str,
) -> ChessResult<usize> {
    if let Some(col) = headers.column(name) {
        return Ok(col);
    }

    let col = store.insert_column()?;
    store.set_range(header_row, col, 1, 1, vec![vec![Cell::text(name)]])?;
    headers.insert(name, col);
    Ok(col)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRowStore {
    rows: Grid,
    width: usize,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Grid) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }

    /// Builds a store from a header row and text rows.
    pub fn with_headers(headers: &[&str], rows: &[Vec<&str>]) -> Self {
        let mut grid: Grid = vec![headers.iter().map(|h| Cell::text(*h)).collect()];
        grid.extend(
            rows.iter()
                .map(|row| row.iter().map(|v| Cell::text(*v)).collect::<Vec<_>>()),
        );
        Self::from_rows(grid)
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.rows
            .get(row.wrapping_sub(1))
            .and_then(|r| r.get(col.wrapping_sub(1)))
            .cloned()
            .unwrap_or_default()
    }
}

fn check_origin(row_start: usize, col_start: usize) -> ChessResult<()> {
    if row_start == 0 || col_start == 0 {
        return Err(ChessError::Store(format!(
            "range origin must be 1-based, got row={row_start} col={col_start}"
        )));
    }
    Ok(())
}

impl RowStore for MemoryRowStore {
    fn get_range(
        &self,
        row_start: usize,
        col_start: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> ChessResult<Grid> {
        check_origin(row_start, col_start)?;
        Ok((row_start..row_start + num_rows)
            .map(|row| {
                (col_start..col_start + num_cols)
                    .map(|col| self.cell(row, col))
                    .collect()
            })
            .collect())
    }

    fn set_range(
        &mut self,
        row_start: usize,
        col_start: usize,
        num_rows: usize,
        num_cols: usize,
        values: Grid,
    ) -> ChessResult<()> {
        check_origin(row_start, col_start)?;
        if values.len() != num_rows || values.iter().any(|row| row.len() != num_cols) {
            return Err(ChessError::Store(format!(
                "set_range expects {num_rows}x{num_cols} values"
            )));
        }

        let last_row = row_start + num_rows - 1;
        if self.rows.len() < last_row {
            self.rows.resize_with(last_row, Vec::new);
        }
        let last_col = col_start + num_cols - 1;
        self.width = self.width.max(last_col);

        for (offset, row_values) in values.into_iter().enumerate() {
            let row = &mut self.rows[row_start - 1 + offset];
            if row.len() < last_col {
                row.resize(last_col, Cell::Empty);
            }
            for (col_offset, value) in row_values.into_iter().enumerate() {
                row[col_start - 1 + col_offset] = value;
            }
        }
        Ok(())
    }

    fn last_row(&self) -> usize {
        self.rows
            .iter()
            .rposition(|row| row.iter().any(|c| !c.is_blank()))
            .map_or(0, |idx| idx + 1)
    }

    fn last_column(&self) -> usize {
        self.width
    }

    fn insert_column(&mut self) -> ChessResult<usize> {
        self.width += 1;
        Ok(self.width)
    }
}

/// Named sheets held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, MemoryRowStore)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: impl Into<String>, sheet: MemoryRowStore) {
        self.sheets.push((name.into(), sheet));
    }
}

impl SheetSource for MemoryWorkbook {
    type Sheet = MemoryRowStore;

    fn sheet(&self, selector: &SheetSelector) -> Option<(&str, &MemoryRowStore)> {
        let found = match selector {
            SheetSelector::Name(name) => self.sheets.iter().find(|(n, _)| n == name),
            SheetSelector::Index(idx) => self.sheets.get(*idx),
        };
        found.map(|(name, sheet)| (name.as_str(), sheet))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCursorStore {
    values: HashMap<String, String>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn get(&self, key: &str) -> ChessResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> ChessResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Cursor store persisted as a flat JSON object of string values.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> ChessResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let serde_json::Value::Object(map) = value else {
            return Err(ChessError::Store(format!(
                "cursor file '{}' is not a JSON object",
                self.path.display()
            )));
        };

        Ok(map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect())
    }
}

impl CursorStore for FileCursorStore {
    fn get(&self, key: &str) -> ChessResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> ChessResult<()> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());

        let object: serde_json::Map<String, serde_json::Value> = values
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        let body = serde_json::to_string_pretty(&serde_json::Value::Object(object))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_range_pads_missing_cells() {
        let store = MemoryRowStore::with_headers(&["A", "B"], &[vec!["1"]]);
        let grid = store.get_range(2, 1, 2, 3).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], vec![Cell::text("1"), Cell::Empty, Cell::Empty]);
        assert!(grid[1].iter().all(|c| *c == Cell::Empty));
    }

    #[test]
    fn test_set_range_grows_store() {
        let mut store = MemoryRowStore::with_headers(&["A"], &[]);
        store
            .set_range(3, 2, 1, 2, vec![vec![Cell::text("x"), Cell::Int(4)]])
            .unwrap();
        assert_eq!(store.last_row(), 3);
        assert_eq!(store.last_column(), 3);
        assert_eq!(store.cell(3, 3), Cell::Int(4));
        assert_eq!(store.cell(2, 1), Cell::Empty);
    }

    #[test]
    fn test_set_range_rejects_shape_mismatch() {
        let mut store = MemoryRowStore::new();
        let err = store.set_range(1, 1, 2, 1, vec![vec![Cell::Empty]]);
        assert!(matches!(err, Err(ChessError::Store(_))));
        assert!(store.get_range(0, 1, 1, 1).is_err());
    }

    #[test]
    fn test_last_row_ignores_trailing_blank_rows() {
        let store = MemoryRowStore::with_headers(&["A"], &[vec!["x"], vec![""], vec![" "]]);
        assert_eq!(store.last_row(), 2);
    }

    #[test]
    fn test_header_index_and_ensure_column() {
        let mut store = MemoryRowStore::with_headers(&["PGN", "Key", "PGN"], &[vec!["1. e4"]]);
        let mut headers = HeaderIndex::read(&store, 1).unwrap();
        assert_eq!(headers.column("PGN"), Some(1));
        assert_eq!(headers.column("Key"), Some(2));
        assert!(matches!(headers.require("FEN"), Err(ChessError::InvalidConfig(_))));

        let col = ensure_column(&mut store, &mut headers, 1, "FEN").unwrap();
        assert_eq!(col, 4);
        assert_eq!(store.cell(1, 4), Cell::text("FEN"));
        assert_eq!(ensure_column(&mut store, &mut headers, 1, "FEN").unwrap(), 4);
    }

    #[test]
    fn test_workbook_selects_by_name_and_index() {
        let mut book = MemoryWorkbook::new();
        book.add_sheet("Games", MemoryRowStore::with_headers(&["PGN"], &[]));
        book.add_sheet("Stats", MemoryRowStore::with_headers(&["Key"], &[]));

        assert_eq!(book.sheet(&"Stats".into()).map(|(n, _)| n), Some("Stats"));
        assert_eq!(book.sheet(&SheetSelector::Index(0)).map(|(n, _)| n), Some("Games"));
        assert!(book.sheet(&"Missing".into()).is_none());
    }

    #[test]
    fn test_file_cursor_store_persists_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");

        let mut store = FileCursorStore::new(&path);
        assert_eq!(store.get("cursor").unwrap(), None);
        store.set("cursor", "42").unwrap();
        store.set("other", "x").unwrap();

        let reopened = FileCursorStore::new(&path);
        assert_eq!(reopened.get("cursor").unwrap().as_deref(), Some("42"));
        assert_eq!(reopened.get("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_file_cursor_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        fs::write(&path, "[1, 2]").unwrap();

        let store = FileCursorStore::new(&path);
        assert!(matches!(store.get("cursor"), Err(ChessError::Store(_))));
    }
}
