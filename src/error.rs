use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OmrError {
    #[error("invalid sheet structure: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type OmrResult<T> = std::result::Result<T, OmrError>;
