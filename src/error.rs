use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using the send path.
#[derive(Error, Debug)]
pub enum Error {
    #[error("write: {0}")]
    Write(#[from] WriteError),

    #[error("digest: {0}")]
    Digest(#[from] DigestError),

    #[error("sequence: {0}")]
    Sequence(#[from] SequenceError),

    #[error("connection closed")]
    Closed,

    #[error("connection not yet open")]
    NotYetOpen,
}

/// Frame write errors.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("could not allocate a {size} byte send buffer")]
    AllocationFailed { size: usize },

    #[error("short write: transport accepted {accepted} of {requested} bytes")]
    ShortWrite {
        requested: usize,
        accepted: usize,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// External digest errors.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wrote {written} of {expected} bytes to the digest process")]
    WriteIncomplete { written: usize, expected: usize },

    #[error("reading digest output: {0}")]
    Read(#[source] std::io::Error),

    #[error("digest process exited with {0}")]
    ExitStatus(ExitStatus),

    #[error("digest process did not answer within {0:?}")]
    Timeout(Duration),
}

/// Fragment reassembly errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    #[error("continuation frame without a preceding start frame")]
    UnexpectedContinuation,

    #[error("new message started before the previous one finished")]
    InterleavedStart,

    #[error("control frames are not part of a message sequence")]
    ControlFrame,

    #[error("text message is not valid UTF-8")]
    InvalidUtf8,
}
