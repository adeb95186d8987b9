//! DuckDB bindings for the query surface.

mod bind_info_ffi;
mod functions;
mod scalar;
mod string;
mod table;

pub use functions::{PgnFinalFenScalar, PgnTextToFensScalar, PgnToFensScalar};
pub use table::ReadPgnFensVTab;
