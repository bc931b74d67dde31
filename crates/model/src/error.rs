use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("'{value}' is not a valid {expected}")]
    InvalidValue {
        expected: &'static str,
        value: String,
    },

    #[error("value is {len} characters long, the limit is {max}")]
    TooLong { max: usize, len: usize },

    #[error("Unknown duplicate mode: {0}")]
    UnknownMode(String),

    #[error("Unknown field type: {0}")]
    UnknownDataType(String),
}
