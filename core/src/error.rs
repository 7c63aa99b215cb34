use crate::record::RecordId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A declared field is absent from a record (or a required column from the input).
    #[error("record {record}: missing field `{field}`")]
    Schema { record: usize, field: String },
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("duplicate record id {0}")]
    DuplicateId(RecordId),
    #[error("row {row}, column `{column}`: cannot parse {value:?} as a number")]
    InvalidValue { row: usize, column: String, value: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
