use std::error::Error;

use ::duckdb::vtab::arrow::WritableVector;
use ::duckdb::{
    Result,
    core::{DataChunkHandle, LogicalTypeHandle, LogicalTypeId},
    vscalar::{ScalarFunctionSignature, VScalar},
};

use super::scalar::{
    VarcharOutput, invoke_unary_varchar_to_varchar, invoke_varchar_optional_bool_to_varchar,
};
use crate::chess::{log, query};

fn varchar_with_optional_flag() -> Vec<ScalarFunctionSignature> {
    vec![
        ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        ),
        ScalarFunctionSignature::exact(
            vec![
                LogicalTypeHandle::from(LogicalTypeId::Varchar),
                LogicalTypeHandle::from(LogicalTypeId::Boolean),
            ],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        ),
    ]
}

/// JSON array of FENs for one record, `NULL` when the record is invalid.
fn record_fens_json(text: &str, include_initial: bool) -> VarcharOutput {
    match query::pgn_to_fens(text, include_initial) {
        Ok(fens) => serde_json::to_string(&fens).ok().into(),
        Err(e) => {
            log::debug(format!("pgn_to_fens: {e}"));
            VarcharOutput::Null
        }
    }
}

/// JSON array with one entry per game; invalid games are `null`.
fn text_fens_json(text: &str, include_initial: bool) -> VarcharOutput {
    let games: Vec<serde_json::Value> = query::pgn_text_to_fens(text, include_initial)
        .into_iter()
        .map(|result| match result {
            Ok(fens) => serde_json::Value::from(fens),
            Err(e) => {
                log::debug(format!("pgn_text_to_fens: {e}"));
                serde_json::Value::Null
            }
        })
        .collect();
    VarcharOutput::Value(serde_json::Value::Array(games).to_string())
}

fn final_fen(text: &str) -> VarcharOutput {
    query::final_fen(text).ok().flatten().into()
}

pub struct PgnToFensScalar;

impl VScalar for PgnToFensScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_varchar_optional_bool_to_varchar(input, output, false, record_fens_json)
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        varchar_with_optional_flag()
    }
}

pub struct PgnTextToFensScalar;

impl VScalar for PgnTextToFensScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_varchar_optional_bool_to_varchar(input, output, false, text_fens_json)
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        varchar_with_optional_flag()
    }
}

pub struct PgnFinalFenScalar;

impl VScalar for PgnFinalFenScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_unary_varchar_to_varchar(input, output, final_fen)
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }
}
