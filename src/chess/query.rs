//! Caller-facing conversions: single records, multi-game text, and the
//! exploded `(record_id, ply, fen)` table form.

use super::engine::ShakmatyEngine;
use super::error::{ChessResult, ErrorAccumulator};
use super::log;
use super::splitter::{parse_game_record, split};
use super::store::Grid;
use super::trajectory::TrajectoryBuilder;
use super::types::Cell;

const BUILDER: TrajectoryBuilder<ShakmatyEngine> = TrajectoryBuilder::new(ShakmatyEngine);

/// Trajectory of one game record.
pub fn pgn_to_fens(record_text: &str, include_initial: bool) -> ChessResult<Vec<String>> {
    BUILDER.build(&parse_game_record(record_text.trim().to_string()), include_initial)
}

/// Position after the last mainline move; `None` for a game without moves.
pub fn final_fen(record_text: &str) -> ChessResult<Option<String>> {
    BUILDER.final_position(&parse_game_record(record_text.trim().to_string()))
}

/// One result per game found in `text`, in input order.
pub fn pgn_text_to_fens(text: &str, include_initial: bool) -> Vec<ChessResult<Vec<String>>> {
    split(text)
        .iter()
        .map(|record| BUILDER.build(record, include_initial))
        .collect()
}

/// Trajectories of every valid game concatenated, stopping at `max_positions`.
pub fn flatten_fens(text: &str, include_initial: bool, max_positions: Option<usize>) -> Vec<String> {
    let mut all = Vec::new();
    for (idx, result) in pgn_text_to_fens(text, include_initial).into_iter().enumerate() {
        let fens = match result {
            Ok(fens) => fens,
            Err(e) => {
                log::warn(format!("game {}: {e}", idx + 1));
                continue;
            }
        };
        for fen in fens {
            if max_positions.is_some_and(|max| all.len() >= max) {
                return all;
            }
            all.push(fen);
        }
    }
    all
}

/// One converted game with its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFens {
    pub id: String,
    /// Ply of `fens[0]`: 0 when the start position is included, else 1.
    pub first_ply: u32,
    pub fens: Vec<String>,
}

impl GameFens {
    pub fn plies(&self) -> impl Iterator<Item = (u32, &str)> {
        (self.first_ply..).zip(self.fens.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplodedRow {
    pub record_id: String,
    pub ply: u32,
    pub fen: String,
}

#[derive(Debug, Clone, Default)]
pub struct Exploded {
    pub rows: Vec<ExplodedRow>,
    /// Per-game failures joined with `; `, `None` when every game converted.
    pub diagnostics: Option<String>,
}

/// Converts every game in `text`. A single game keeps `id_base` as its id;
/// several games are suffixed `_g1`, `_g2`, ... Failed games are reported
/// into `diagnostics` and skipped.
pub fn explode_text(
    id_base: &str,
    text: &str,
    include_initial: bool,
    diagnostics: &mut ErrorAccumulator,
) -> Vec<GameFens> {
    let records = split(text);
    let multi = records.len() > 1;
    let first_ply = if include_initial { 0 } else { 1 };

    let mut games = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let id = if multi {
            format!("{id_base}_g{}", idx + 1)
        } else {
            id_base.to_string()
        };
        match BUILDER.build(record, include_initial) {
            Ok(fens) => games.push(GameFens {
                id,
                first_ply,
                fens,
            }),
            Err(e) => diagnostics.push(&format!("{id}: {e}")),
        }
    }
    games
}

/// Explodes a block of cells whose top-left cell sits at
/// (`origin_row`, `origin_col`). Only text cells are read.
pub fn explode_cells(
    cells: &Grid,
    origin_row: usize,
    origin_col: usize,
    include_initial: bool,
) -> Exploded {
    let mut diagnostics = ErrorAccumulator::default();
    let mut rows = Vec::new();

    for (r, line) in cells.iter().enumerate() {
        for (c, cell) in line.iter().enumerate() {
            let Cell::Text(text) = cell else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            let id_base = format!("R{}C{}", origin_row + r, origin_col + c);
            for game in explode_text(&id_base, text, include_initial, &mut diagnostics) {
                rows.extend(game.plies().map(|(ply, fen)| ExplodedRow {
                    record_id: game.id.clone(),
                    ply,
                    fen: fen.to_string(),
                }));
            }
        }
    }

    Exploded {
        rows,
        diagnostics: diagnostics.take(),
    }
}

/// One FEN per line, games separated by a blank line.
pub fn render_text(games: &[GameFens]) -> String {
    let mut out = String::new();
    for (idx, game) in games.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for fen in &game.fens {
            out.push_str(fen);
            out.push('\n');
        }
    }
    out
}

/// A bare list for a single game, otherwise `[{"id":..,"fens":[..]}, ..]`.
pub fn render_json(games: &[GameFens]) -> ChessResult<String> {
    if let [single] = games {
        return Ok(serde_json::to_string(&single.fens)?);
    }

    let mut out = String::from("[");
    for (idx, game) in games.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&format!(
            "{{\"id\":{},\"fens\":{}}}",
            serde_json::to_string(&game.id)?,
            serde_json::to_string(&game.fens)?
        ));
    }
    out.push(']');
    Ok(out)
}

/// `id,ply,fen` rows with quoted text fields.
pub fn render_csv(games: &[GameFens]) -> String {
    let mut out = String::from("id,ply,fen\n");
    for game in games {
        let id = csv_quote(&game.id);
        for (ply, fen) in game.plies() {
            out.push_str(&format!("{id},{ply},{}\n", csv_quote(fen)));
        }
    }
    out
}

fn csv_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
