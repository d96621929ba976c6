//! Error taxonomy shared across the workspace, mirroring the teacher's
//! per-domain `thiserror` enums aggregated under one transparent `Error`.

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Malformed G-code text: an unrecognised letter, a non-numeric argument,
/// or an unterminated line.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum ParseError {
    #[error("invalid word `{0}`")]
    InvalidWord(String),
    #[error("unterminated line")]
    UnterminatedLine,
    #[error("malformed status frame: {0}")]
    MalformedFrame(String),
}

/// A `Block` that fails the VM's structural invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ValidateError {
    #[error("invalid word in block")]
    InvalidWord,
    #[error("word was repeated in a block")]
    RepeatedWord,
    #[error("multiple words from same modal group")]
    ConflictingModalGroup,
    #[error("unsupported code")]
    UnsupportedCode,
}

/// The controller replied `error:<n>` to a specific line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("grbl error:{0}")]
pub struct GrblAckError(pub u32);

/// A `Grbl` reset banner was observed mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("grbl reset")]
pub struct GrblReset;

/// The underlying transport (serial port, websocket) has closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("transport closed")]
pub struct TransportClosed;

/// An orchestrator operation was attempted while the machine was in an
/// incompatible state (e.g. a probe requested while running).
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("machine not in a compatible state: {0}")]
pub struct StatePrecondition(pub String);

/// A probe sequence completed without the device reporting any `[PRB:...]`
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("no probe data received")]
pub struct NoProbeData;

/// A `[PRB:...]` frame was received with its valid flag cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("probe reported invalid contact")]
pub struct ProbeInvalid;

/// The umbrella error type, propagated with `?` across crate boundaries.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validate(#[from] ValidateError),
    #[error(transparent)]
    GrblAck(#[from] GrblAckError),
    #[error(transparent)]
    GrblReset(#[from] GrblReset),
    #[error(transparent)]
    TransportClosed(#[from] TransportClosed),
    #[error(transparent)]
    StatePrecondition(#[from] StatePrecondition),
    #[error(transparent)]
    NoProbeData(#[from] NoProbeData),
    #[error(transparent)]
    ProbeInvalid(#[from] ProbeInvalid),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
