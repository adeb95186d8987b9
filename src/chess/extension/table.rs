//! `read_pgn_fens(path_or_glob, compression := ...)`: the exploded
//! `(record_id, ply, fen)` form over PGN files.

use super::bind_info_ffi::named_varchar;
use super::string::to_cstring;
use crate::chess::error::ErrorAccumulator;
use crate::chess::export::CompressionMode;
use crate::chess::log;
use crate::chess::query::{ExplodedRow, explode_text};
use ::duckdb::{
    core::{DataChunkHandle, Inserter, LogicalTypeHandle, LogicalTypeId},
    vtab::{BindInfo, InitInfo, TableFunctionInfo, VTab},
};
use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zstd::stream::read::Decoder as ZstdDecoder;

const PATH_PATTERN_PARAM_INDEX: u64 = 0;
const ROWS_PER_CHUNK: usize = 2048;

#[repr(C)]
pub struct ReadPgnFensBindData {
    paths: Vec<PathBuf>,
    compression: CompressionMode,
}

#[derive(Debug, Default)]
struct ScanState {
    next_path_idx: usize,
    pending: VecDeque<ExplodedRow>,
}

#[repr(C)]
pub struct ReadPgnFensInitData {
    state: Mutex<ScanState>,
}

pub struct ReadPgnFensVTab;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FensColumn {
    RecordId = 0,
    Ply = 1,
    Fen = 2,
}

impl FensColumn {
    const ALL: [FensColumn; 3] = [Self::RecordId, Self::Ply, Self::Fen];

    const fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::RecordId => "record_id",
            Self::Ply => "ply",
            Self::Fen => "fen",
        }
    }

    fn logical_type(self) -> LogicalTypeHandle {
        match self {
            Self::RecordId | Self::Fen => LogicalTypeHandle::from(LogicalTypeId::Varchar),
            Self::Ply => LogicalTypeHandle::from(LogicalTypeId::UInteger),
        }
    }
}

fn resolve_compression(bind: &BindInfo) -> Result<CompressionMode, Box<dyn std::error::Error>> {
    match named_varchar(bind, "compression")? {
        None => Ok(CompressionMode::Plain),
        Some(raw) if raw.trim().eq_ignore_ascii_case("null") => Ok(CompressionMode::Plain),
        Some(raw) => Ok(CompressionMode::parse(&raw)?),
    }
}

fn expand_paths(pattern: &str) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
        let mut paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(|entry| entry.ok()).collect();
        paths.sort();
        Ok(paths)
    } else {
        Ok(vec![PathBuf::from(pattern)])
    }
}

fn read_source(path: &Path, compression: CompressionMode) -> Result<String, String> {
    let mut file =
        File::open(path).map_err(|e| format!("failed to open '{}': {e}", path.display()))?;

    let mut bytes = Vec::new();
    let read = match compression {
        CompressionMode::Plain => file.read_to_end(&mut bytes),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .and_then(|mut decoder| decoder.read_to_end(&mut bytes)),
    };
    read.map_err(|e| format!("failed to read '{}': {e}", path.display()))?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Record id prefix for the file at `path_idx` in the expanded path list.
fn file_record_id(path_idx: usize) -> String {
    format!("F{}", path_idx + 1)
}

/// Explodes one source file into rows; failed games are logged and skipped.
fn explode_file(path_idx: usize, text: &str, source: &Path) -> Vec<ExplodedRow> {
    let mut diagnostics = ErrorAccumulator::default();
    let games = explode_text(&file_record_id(path_idx), text, false, &mut diagnostics);
    if let Some(msg) = diagnostics.take() {
        log::warn(format!("read_pgn_fens: '{}': {msg}", source.display()));
    }

    games
        .into_iter()
        .flat_map(|game| {
            game.plies()
                .map(|(ply, fen)| ExplodedRow {
                    record_id: game.id.clone(),
                    ply,
                    fen: fen.to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Loads the next readable file into `state.pending`. Returns false once
/// every path is consumed.
fn load_next_file(
    state: &mut ScanState,
    bind_data: &ReadPgnFensBindData,
) -> Result<bool, Box<dyn std::error::Error>> {
    while state.next_path_idx < bind_data.paths.len() {
        let path_idx = state.next_path_idx;
        state.next_path_idx += 1;

        let path = &bind_data.paths[path_idx];
        match read_source(path, bind_data.compression) {
            Ok(text) => {
                state.pending.extend(explode_file(path_idx, &text, path));
                return Ok(true);
            }
            Err(msg) => {
                if bind_data.paths.len() == 1 {
                    log::error(&msg);
                    return Err(msg.into());
                }
                log::warn(&msg);
            }
        }
    }
    Ok(false)
}

/// Emits up to `ROWS_PER_CHUNK` rows through `write`, loading files as the
/// queue empties. Returns the number of rows written.
fn fill_chunk<W>(
    state: &mut ScanState,
    bind_data: &ReadPgnFensBindData,
    mut write: W,
) -> Result<usize, Box<dyn std::error::Error>>
where
    W: FnMut(usize, &ExplodedRow) -> Result<(), Box<dyn std::error::Error>>,
{
    let mut row_count = 0;
    while row_count < ROWS_PER_CHUNK {
        let Some(row) = state.pending.pop_front() else {
            if load_next_file(state, bind_data)? {
                continue;
            }
            break;
        };
        write(row_count, &row)?;
        row_count += 1;
    }
    Ok(row_count)
}

fn write_row(
    output: &mut DataChunkHandle,
    row_idx: usize,
    row: &ExplodedRow,
) -> Result<(), Box<dyn std::error::Error>> {
    output
        .flat_vector(FensColumn::RecordId.index())
        .insert(row_idx, to_cstring(&row.record_id)?);
    output
        .flat_vector(FensColumn::Ply.index())
        .as_mut_slice::<u32>()[row_idx] = row.ply;
    output
        .flat_vector(FensColumn::Fen.index())
        .insert(row_idx, to_cstring(&row.fen)?);
    Ok(())
}

impl VTab for ReadPgnFensVTab {
    type InitData = ReadPgnFensInitData;
    type BindData = ReadPgnFensBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn std::error::Error>> {
        let pattern = bind.get_parameter(PATH_PATTERN_PARAM_INDEX).to_string();
        let compression = resolve_compression(bind)?;
        let paths = expand_paths(&pattern)?;

        for column in FensColumn::ALL {
            bind.add_result_column(column.name(), column.logical_type());
        }

        Ok(ReadPgnFensBindData { paths, compression })
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn std::error::Error>> {
        Ok(ReadPgnFensInitData {
            state: Mutex::new(ScanState::default()),
        })
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let init_data = func.get_init_data();
        let bind_data = func.get_bind_data();
        let mut state = init_data
            .state
            .lock()
            .map_err(|_| "read_pgn_fens scan state poisoned")?;

        let row_count = fill_chunk(&mut state, bind_data, |idx, row| write_row(output, idx, row))?;
        output.set_len(row_count);
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![
            LogicalTypeHandle::from(LogicalTypeId::Varchar), // path pattern (required)
        ])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(vec![(
            "compression".to_string(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )])
    }
}
