#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed wire data: {0}")]
    Malformed(String),

    #[error("invalid payload: {0}")]
    Invalid(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Malformed(e.to_string())
    }
}
