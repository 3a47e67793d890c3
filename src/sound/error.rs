//! Error type shared by the registry, the chunk walker and the sessions.

use std::io;

/// Errors produced by codec lookup and by decode/encode sessions.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unknown codec")]
    UnknownFormat,

    #[error("constructors of format '{name}' come from different providers: {providers:?}")]
    NonUniformFormat {
        name: String,
        providers: Vec<&'static str>,
    },

    #[error("bad magic: expected {expected:?}, got {actual:?}")]
    BadMagic { expected: String, actual: String },

    #[error("inconsistent format: {0}")]
    InconsistentFormat(String),

    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("unsupported format tag: {0}")]
    UnsupportedTag(u16),

    #[error("chunk {0:?} not found")]
    ChunkNotFound(String),

    #[error("buffer of {len} samples is not aligned to {channels} channels")]
    ChannelAlignment { len: usize, channels: usize },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("seek to frame {frame} is past the end ({frames} frames)")]
    SeekOutOfRange { frame: u64, frames: u64 },

    #[error("container too large: {0} data bytes")]
    ContainerOverflow(u64),

    #[error("session already closed")]
    Closed,

    #[error("closing the session failed earlier: {0}")]
    CloseFailed(String),

    #[error("end of stream")]
    EndOfStream,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// True for the terminal "done" signal, as opposed to a broken stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, CodecError::EndOfStream)
    }

    /// Maps an unexpected EOF while reading structure onto `err`.
    pub(crate) fn eof_as(err: io::Error, eof: CodecError) -> CodecError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            eof
        } else {
            CodecError::Io(err)
        }
    }
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
