//! PGN game splitting, FEN trajectories, resumable sheet backfill, opening
//! statistics and chunked export, loadable as the `pgn_fens` DuckDB extension.

pub mod chess;

pub use chess::backfill::{BackfillConfig, BackfillController, BatchReport};
pub use chess::engine::{RulesEngine, ShakmatyEngine};
pub use chess::error::{ChessError, ChessResult};
pub use chess::export::{ExportOptions, ExportResult, export};
pub use chess::fen::PositionComponents;
pub use chess::openings::{OpeningStats, aggregate};
pub use chess::trajectory::TrajectoryBuilder;
pub use chess::types::{Cell, GameRecord};
