//! Error types for the ping ARQ core.
//!
//! Expected protocol events (ack timeouts, corrupted frames, foreign traffic)
//! are NOT errors: they are classified into [`crate::framing::Verdict`]s and
//! counted. Only failures of the surrounding machinery end up here.

use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Frame: wire-level decoding of a datagram into header + payload
/// - Transport: the physical send/receive primitive failed
/// - Config: a run option is out of range
/// - RetriesExhausted: the master gave up on a packet (fatal to the run)
#[derive(Debug, Error)]
pub enum Error {
    /// A datagram could not be split into header and payload
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The transport failed to send or receive
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Socket or file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Master hit the attempt budget for one packet id
    #[error("packet {packet_id} not acknowledged after {attempts} attempts")]
    RetriesExhausted { packet_id: u16, attempts: u32 },
}

/// Wire decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Datagram too short to contain the fixed header section
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    FrameTooShort { required: usize, actual: usize },

    /// Declared payload length disagrees with the datagram size
    #[error("payload length mismatch: header says {expected}, got {actual}")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    /// Payload does not fit the 16-bit length field
    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLong { len: usize, max: usize },
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `send`/`receive` called before `start()` or after `stop()`
    #[error("transport is not started")]
    NotStarted,

    /// The other side of an in-process channel has gone away
    #[error("channel closed")]
    ChannelClosed,

    /// Underlying socket failure
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
