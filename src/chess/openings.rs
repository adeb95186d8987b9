//! Per-opening frequency tables over backfilled rows.

use super::error::ChessResult;
use super::store::{Grid, HeaderIndex, RowStore};
use super::types::{Cell, DerivedColumn, ECO_HEADER, KEY_HEADER, NAME_HEADER, PGN_HEADER};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpeningStatsEntry {
    pub key: String,
    pub eco: String,
    pub name: String,
    pub pgn: String,
    pub fen: String,
    pub games: u64,
    pub active_counts: BTreeMap<String, u64>,
    pub castling_counts: BTreeMap<String, u64>,
}

impl OpeningStatsEntry {
    fn new(key: &str, eco: &str, name: &str, pgn: &str) -> Self {
        Self {
            key: key.to_string(),
            eco: eco.to_string(),
            name: name.to_string(),
            pgn: pgn.to_string(),
            ..Self::default()
        }
    }
}

pub type OpeningStats = BTreeMap<String, OpeningStatsEntry>;

#[derive(Debug, Clone, Copy)]
struct StatsColumns {
    key: usize,
    eco: Option<usize>,
    name: Option<usize>,
    pgn: Option<usize>,
    fen: Option<usize>,
    active: Option<usize>,
    castle: Option<usize>,
}

/// Folds every data row below `header_row` into per-key statistics.
/// Rows with a blank key are skipped; the first non-empty FEN per key wins.
pub fn aggregate<S: RowStore + ?Sized>(store: &S, header_row: usize) -> ChessResult<OpeningStats> {
    let headers = HeaderIndex::read(store, header_row)?;
    let cols = StatsColumns {
        key: headers.require(KEY_HEADER)?,
        eco: headers.column(ECO_HEADER),
        name: headers.column(NAME_HEADER),
        pgn: headers.column(PGN_HEADER),
        fen: headers.column(DerivedColumn::Fen.header()),
        active: headers.column(DerivedColumn::Active.header()),
        castle: headers.column(DerivedColumn::Castle.header()),
    };

    let mut stats = OpeningStats::new();
    let first = header_row + 1;
    let last = store.last_row();
    if last < first {
        return Ok(stats);
    }

    let grid = store.get_range(first, 1, last - first + 1, headers.width())?;
    fold_rows(&mut stats, &grid, &cols);
    Ok(stats)
}

fn fold_rows(stats: &mut OpeningStats, grid: &Grid, cols: &StatsColumns) {
    let text = |row: &[Cell], col: Option<usize>| -> String {
        col.and_then(|c| row.get(c - 1))
            .map(|cell| cell.as_text().trim().to_string())
            .unwrap_or_default()
    };

    for row in grid {
        let row = row.as_slice();
        let key = text(row, Some(cols.key));
        if key.is_empty() {
            continue;
        }

        let entry = stats.entry(key.clone()).or_insert_with(|| {
            OpeningStatsEntry::new(
                &key,
                &text(row, cols.eco),
                &text(row, cols.name),
                &text(row, cols.pgn),
            )
        });
        entry.games += 1;

        if entry.fen.is_empty() {
            entry.fen = text(row, cols.fen);
        }

        let active = text(row, cols.active);
        if !active.is_empty() {
            *entry.active_counts.entry(active).or_insert(0) += 1;
        }
        let castle = text(row, cols.castle);
        if !castle.is_empty() {
            *entry.castling_counts.entry(castle).or_insert(0) += 1;
        }
    }
}

pub const STATS_HEADERS: [&str; 8] = [
    "Key",
    "ECO",
    "Name",
    "PGN",
    "FEN",
    "Games",
    "ActiveCounts",
    "CastleCounts",
];

/// Renders stats as a header row plus one row per key, frequency tables as JSON objects.
pub fn stats_table(stats: &OpeningStats) -> Grid {
    let mut grid: Grid = vec![STATS_HEADERS.iter().map(|h| Cell::text(*h)).collect()];
    for entry in stats.values() {
        grid.push(vec![
            Cell::text(entry.key.as_str()),
            Cell::text(entry.eco.as_str()),
            Cell::text(entry.name.as_str()),
            Cell::text(entry.pgn.as_str()),
            Cell::text(entry.fen.as_str()),
            Cell::Int(i64::try_from(entry.games).unwrap_or(i64::MAX)),
            Cell::text(counts_json(&entry.active_counts)),
            Cell::text(counts_json(&entry.castling_counts)),
        ]);
    }
    grid
}

fn counts_json(counts: &BTreeMap<String, u64>) -> String {
    let object: serde_json::Map<String, serde_json::Value> = counts
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::from(*v)))
        .collect();
    serde_json::Value::Object(object).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::error::ChessError;
    use crate::chess::store::MemoryRowStore;

    fn stats_store() -> MemoryRowStore {
        MemoryRowStore::with_headers(
            &["ECO", "Name", "PGN", "Key", "FEN", "FEN_active", "FEN_castle"],
            &[
                vec!["C20", "King's Pawn", "1. e4", "C20", "", "", ""],
                vec!["C20", "Other name", "1. e4 e5", "C20", "fen-a", "w", "KQkq"],
                vec!["C20", "", "", "C20", "fen-b", "b", "KQkq"],
                vec!["B00", "Nimzowitsch", "1. e4 Nc6", "B00", "fen-c", "w", "-"],
                vec!["A00", "No key", "1. g4", "", "fen-d", "b", "Kk"],
            ],
        )
    }

    #[test]
    fn test_aggregate_groups_by_key() {
        let stats = aggregate(&stats_store(), 1).unwrap();
        assert_eq!(stats.len(), 2);

        let c20 = &stats["C20"];
        assert_eq!(c20.games, 3);
        assert_eq!(c20.name, "King's Pawn");
        assert_eq!(c20.pgn, "1. e4");
        assert_eq!(c20.fen, "fen-a");
        assert_eq!(c20.active_counts.get("w"), Some(&1));
        assert_eq!(c20.active_counts.get("b"), Some(&1));
        assert_eq!(c20.castling_counts.get("KQkq"), Some(&2));
    }

    #[test]
    fn test_aggregate_skips_blank_keys() {
        let stats = aggregate(&stats_store(), 1).unwrap();
        assert!(stats.values().all(|e| e.eco != "A00"));
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let store = stats_store();
        assert_eq!(aggregate(&store, 1).unwrap(), aggregate(&store, 1).unwrap());
    }

    #[test]
    fn test_aggregate_requires_key_column() {
        let store = MemoryRowStore::with_headers(&["ECO"], &[vec!["C20"]]);
        assert!(matches!(aggregate(&store, 1), Err(ChessError::InvalidConfig(_))));
    }

    #[test]
    fn test_aggregate_empty_sheet() {
        let store = MemoryRowStore::with_headers(&["Key"], &[]);
        assert!(aggregate(&store, 1).unwrap().is_empty());
    }

    #[test]
    fn test_stats_table_renders_counts_as_json() {
        let stats = aggregate(&stats_store(), 1).unwrap();
        let table = stats_table(&stats);
        assert_eq!(table.len(), 3);
        assert_eq!(table[0][0], Cell::text("Key"));
        assert_eq!(table[1][0], Cell::text("B00"));
        assert_eq!(table[2][5], Cell::Int(3));
        assert_eq!(table[2][7], Cell::text(r#"{"KQkq":2}"#));
    }
}
