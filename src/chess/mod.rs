pub mod backfill;
pub mod engine;
pub mod error;
pub mod export;
pub mod extension;
pub mod fen;
pub mod log;
pub mod openings;
pub mod query;
pub mod splitter;
pub mod store;
pub mod trajectory;
pub mod types;

pub use error::{ChessError, ChessResult, ErrorAccumulator};

use ::duckdb::{Connection, Result};
use duckdb_ext_macros::duckdb_extension;
use extension::{PgnFinalFenScalar, PgnTextToFensScalar, PgnToFensScalar, ReadPgnFensVTab};
use std::error::Error;

#[duckdb_extension(name = "pgn_fens", api_version = "v1.0.0")]
pub unsafe fn extension_entrypoint(con: Connection) -> Result<(), Box<dyn Error>> {
    // Table functions
    con.register_table_function::<ReadPgnFensVTab>("read_pgn_fens")?;

    // Scalar functions
    con.register_scalar_function::<PgnToFensScalar>("pgn_to_fens")?;
    con.register_scalar_function::<PgnTextToFensScalar>("pgn_text_to_fens")?;
    con.register_scalar_function::<PgnFinalFenScalar>("pgn_final_fen")?;

    Ok(())
}
