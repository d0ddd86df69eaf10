use crate::ir::GroupId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid JSON5: {0}")]
    Json5(#[from] json5::Error),
    #[error("invalid graph document: {0}")]
    InvalidDocument(String),
    #[error("groups {outer} and {inner} contain each other")]
    CyclicContainment { outer: GroupId, inner: GroupId },
}

pub type Result<T> = std::result::Result<T, Error>;
