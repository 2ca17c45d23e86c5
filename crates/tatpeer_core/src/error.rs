use crate::pieces::PieceIndex;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid piece index {0}")]
    InvalidPieceIndex(PieceIndex),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("phase mismatch: expected {expected}, got {actual}")]
    PhaseMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

pub type Result<T> = core::result::Result<T, Error>;
