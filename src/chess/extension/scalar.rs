//! Shared scalar invoke helpers.
//!
//! Each helper walks the flat input vectors, skips NULL rows (output NULL),
//! decodes `VARCHAR` rows and writes the closure's result.
//!
//! # Safety
//! Only call these from a scalar `invoke()` while the DuckDB vectors are valid.

use std::error::Error;

use ::duckdb::{
    Result,
    core::{DataChunkHandle, FlatVector, Inserter, LogicalTypeId},
    vtab::arrow::WritableVector,
};
use libduckdb_sys::duckdb_string_t;

use super::string::{decode_duckdb_string, to_cstring};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarcharOutput {
    Null,
    Value(String),
}

impl From<Option<String>> for VarcharOutput {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }
}

fn ensure_type(
    vec: &FlatVector,
    expected: LogicalTypeId,
    label: &str,
) -> Result<(), Box<dyn Error>> {
    let actual = vec.logical_type().id();
    if actual != expected {
        return Err(format!(
            "scalar helper type mismatch: {label} expected {expected:?}, got {actual:?}"
        )
        .into());
    }
    Ok(())
}

fn write_varchar(
    output: &mut FlatVector,
    row: usize,
    value: VarcharOutput,
) -> Result<(), Box<dyn Error>> {
    match value {
        VarcharOutput::Null => output.set_null(row),
        VarcharOutput::Value(v) => output.insert(row, to_cstring(&v)?),
    }
    Ok(())
}

/// Invoke a unary `VARCHAR -> VARCHAR` scalar.
pub fn invoke_unary_varchar_to_varchar<F>(
    input: &DataChunkHandle,
    output: &mut dyn WritableVector,
    mut f: F,
) -> Result<(), Box<dyn Error>>
where
    F: FnMut(&str) -> VarcharOutput,
{
    let len = input.len();
    let input_vec = input.flat_vector(0);
    ensure_type(&input_vec, LogicalTypeId::Varchar, "input[0]")?;
    let input_slice = input_vec.as_slice::<duckdb_string_t>();
    let mut output_vec = output.flat_vector();
    ensure_type(&output_vec, LogicalTypeId::Varchar, "output")?;

    for (i, s) in input_slice.iter().take(len).enumerate() {
        if input_vec.row_is_null(i as u64) {
            output_vec.set_null(i);
            continue;
        }

        // SAFETY: Row nullability is checked above.
        let val = unsafe { decode_duckdb_string(s) };
        write_varchar(&mut output_vec, i, f(&val))?;
    }

    Ok(())
}

/// Invoke a `VARCHAR [, BOOLEAN] -> VARCHAR` scalar. A missing or NULL flag
/// column yields `default_flag`.
pub fn invoke_varchar_optional_bool_to_varchar<F>(
    input: &DataChunkHandle,
    output: &mut dyn WritableVector,
    default_flag: bool,
    mut f: F,
) -> Result<(), Box<dyn Error>>
where
    F: FnMut(&str, bool) -> VarcharOutput,
{
    let len = input.len();
    let input_vec = input.flat_vector(0);
    ensure_type(&input_vec, LogicalTypeId::Varchar, "input[0]")?;
    let input_slice = input_vec.as_slice::<duckdb_string_t>();
    let flag_vec = if input.num_columns() > 1 {
        Some(input.flat_vector(1))
    } else {
        None
    };
    if let Some(vec) = &flag_vec {
        ensure_type(vec, LogicalTypeId::Boolean, "input[1]")?;
    }
    let flag_slice = flag_vec.as_ref().map(|v| v.as_slice::<bool>());

    let mut output_vec = output.flat_vector();
    ensure_type(&output_vec, LogicalTypeId::Varchar, "output")?;

    for (i, s) in input_slice.iter().take(len).enumerate() {
        if input_vec.row_is_null(i as u64) {
            output_vec.set_null(i);
            continue;
        }

        // SAFETY: Row nullability is checked above.
        let val = unsafe { decode_duckdb_string(s) };
        let flag = match (&flag_vec, flag_slice) {
            (Some(vec), Some(slice)) if !vec.row_is_null(i as u64) => slice[i],
            _ => default_flag,
        };

        write_varchar(&mut output_vec, i, f(&val, flag))?;
    }

    Ok(())
}
