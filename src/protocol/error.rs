use std::io;

/// Errors raised while framing, encoding or decoding envelopes.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("Malformed {tag} payload: {source}")]
    Payload {
        tag: String,
        source: serde_json::Error,
    },

    #[error("Envelope carries no message tag")]
    MissingTag,

    #[error("Received zero-length frame")]
    EmptyFrame,

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// True when the peer closed the stream between two frames.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
