use milp::MilpError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("solve error: {0}")]
    Solve(#[from] MilpError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("no valid results")]
    NoResults,
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// True for failures of the instance reader, I/O included.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Io(_))
    }

    pub fn is_solve(&self) -> bool {
        matches!(self, Self::Solve(_))
    }
}
