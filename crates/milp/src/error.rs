use thiserror::Error;

#[derive(Debug, Error)]
pub enum MilpError {
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("model is infeasible")]
    Infeasible,
    #[error("model is unbounded")]
    Unbounded,
    #[error(
        "{limit} limit reached after {nodes} nodes without proving optimality (best={best:?} bound={bound})"
    )]
    LimitReached {
        limit: &'static str,
        nodes: usize,
        best: Option<f64>,
        bound: f64,
    },
    #[error("backend error: {0}")]
    Backend(String),
}

pub type MilpResult<T> = std::result::Result<T, MilpError>;

impl MilpError {
    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

impl From<minilp::Error> for MilpError {
    fn from(value: minilp::Error) -> Self {
        #[allow(unreachable_patterns)]
        match value {
            minilp::Error::Infeasible => Self::Infeasible,
            minilp::Error::Unbounded => Self::Unbounded,
            other => Self::Backend(other.to_string()),
        }
    }
}
