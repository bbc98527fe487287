use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error("Unknown deployment status: {0}")]
    UnknownDeploymentStatus(String),
}

pub type Result<T> = std::result::Result<T, Error>;
