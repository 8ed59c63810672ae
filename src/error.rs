//! Error types for the engine and the file / CLI boundary around it.

use thiserror::Error;

use crate::allocation_engine::models::Tier;
use crate::config::ConfigError;
use crate::grading::GradingError;

/// Validation failures raised before any allocation happens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("schema error{}: {reason}", row_suffix(.row))]
    Schema { row: Option<usize>, reason: String },

    #[error("duplicate question_no {question_no} at row {row}")]
    DuplicateId { row: usize, question_no: u32 },

    #[error("invalid difficulty '{label}' at row {row} (use H/M/L or Hard/Medium/Easy)")]
    InvalidDifficulty { row: usize, label: String },

    #[error("percentages must sum to 100 (got {sum}){}", set_suffix(.set_no))]
    InvalidPercentage { set_no: Option<usize>, sum: f64 },

    #[error("{tier} count must be a non-negative integer (got {value}){}", set_suffix(.set_no))]
    InvalidCount { set_no: Option<usize>, tier: Tier, value: i64 },

    #[error("number of sets must be at least 1 (got {0})")]
    InvalidSetCount(usize),

    #[error("override targets Set_{set_no} but only {num_sets} set(s) are planned")]
    InvalidOverride { set_no: usize, num_sets: usize },

    #[error("no {tier} questions in the pool but Set_{set_no} requires {required}")]
    InsufficientPool { tier: Tier, set_no: usize, required: usize },

    #[error("Set_{set_no} requires {required} {tier} question(s) but only {available} exist")]
    Shortfall { tier: Tier, set_no: usize, required: usize, available: usize },
}

fn row_suffix(row: &Option<usize>) -> String {
    row.map(|r| format!(" at row {r}")).unwrap_or_default()
}

fn set_suffix(set_no: &Option<usize>) -> String {
    set_no.map(|s| format!(" for Set_{s}")).unwrap_or_default()
}

/// Crate-level error for anything that touches files or the command line.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grading(#[from] GradingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    Input(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
