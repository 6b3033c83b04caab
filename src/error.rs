// src/error.rs
//! Error types for buffer operations with advanced conversion support

use std::fmt;

/// Errors that can occur during buffer operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Position exceeds buffer length
    PositionOutOfBounds,
    /// Increment would exceed buffer size
    IncrementTooLarge,
    /// Buffer size exceeds maximum allowed
    SizeTooBig,
    /// Attempted to read/write beyond buffer bounds
    BufferOverflow,
    /// Invalid buffer state
    InvalidState(String),
    /// Circular buffer is full
    BufferFull,
    /// Circular buffer is empty
    BufferEmpty,
    /// Write would exceed available space
    InsufficientSpace,
    /// Invalid string encoding
    InvalidString,
    /// Invalid data format
    InvalidData(String),
    /// I/O error (for compatibility)
    Io(String),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PositionOutOfBounds => write!(f, "Position out of bounds"),
            Self::IncrementTooLarge => write!(f, "Increment too large"),
            Self::SizeTooBig => write!(f, "Buffer size too big"),
            Self::BufferOverflow => write!(f, "Buffer overflow"),
            Self::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Self::BufferFull => write!(f, "Circular buffer is full"),
            Self::BufferEmpty => write!(f, "Circular buffer is empty"),
            Self::InsufficientSpace => write!(f, "Insufficient space in buffer"),
            Self::InvalidString => write!(f, "Invalid string encoding"),
            Self::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BufferError {}

// ============================================================================
// ADVANCED ERROR CONVERSION - Makes buffer library compatible with any error type
// ============================================================================

/// Convert BufferError to std::io::Error
impl From<BufferError> for std::io::Error {
    fn from(err: BufferError) -> Self {
        use std::io::ErrorKind;
        match err {
            BufferError::BufferOverflow | BufferError::InsufficientSpace => {
                std::io::Error::new(ErrorKind::WriteZero, err)
            }
            BufferError::BufferEmpty => {
                std::io::Error::new(ErrorKind::UnexpectedEof, err)
            }
            BufferError::Io(msg) => {
                std::io::Error::new(ErrorKind::Other, msg)
            }
            _ => std::io::Error::new(ErrorKind::Other, err),
        }
    }
}

/// Convert std::io::Error to BufferError
impl From<std::io::Error> for BufferError {
    fn from(err: std::io::Error) -> Self {
        BufferError::Io(err.to_string())
    }
}

/// Convert BufferError to anyhow::Error (for SSH handler compatibility)
#[cfg(feature = "anyhow")]
impl From<BufferError> for anyhow::Error {
    fn from(err: BufferError) -> Self {
        anyhow::anyhow!("{}", err)
    }
}

/// Allow using ? with anyhow::Error
#[cfg(feature = "anyhow")]
impl From<anyhow::Error> for BufferError {
    fn from(err: anyhow::Error) -> Self {
        BufferError::InvalidState(err.to_string())
    }
}

// ============================================================================
// RESULT TYPE ALIASES
// ============================================================================

/// Result type alias for buffer operations
///
/// Note: When using with other Result types (like anyhow::Result),
/// either qualify the type (`buffer::Result<T>`) or use the conversion traits.
pub type Result<T> = std::result::Result<T, BufferError>;

// ============================================================================
// EXTENSION TRAIT FOR EASY CONVERSION
// ============================================================================

/// Extension trait for converting Results between different error types
pub trait ResultExt<T> {
    /// Convert to anyhow::Result
    #[cfg(feature = "anyhow")]
    fn into_anyhow(self) -> anyhow::Result<T>;

    /// Convert to io::Result
    fn into_io(self) -> std::io::Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[cfg(feature = "anyhow")]
    fn into_anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| e.into())
    }

    fn into_io(self) -> std::io::Result<T> {
        self.map_err(|e| e.into())
    }
}

// ============================================================================
// HELPER MACROS FOR ERROR HANDLING
// ============================================================================

/// Convenience macro for converting buffer operations to any Result type.
///
/// Requires an explicit target error type as the second argument so the
/// conversion is unambiguous â€” necessary because error types like
/// `anyhow::Error` have multiple overlapping `From` impls.
///
/// # Example
/// ```ignore
/// use fastdfs_core::prelude::*;
/// use fastdfs_core::buffer_op;
///
/// fn handler_function() -> anyhow::Result<()> {
///     let mut buf = Buffer::new(1024);
///     buffer_op!(buf.put_u32(42), anyhow::Error)?;
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! buffer_op {
    // Two-arg form: explicit target type (use this with anyhow, Box<dyn Error>, etc.)
    ($expr:expr, $target:ty) => {
        $expr.map_err(|e: $crate::BufferError| -> $target { e.into() })
    };
    // One-arg form: defaults to std::io::Error (unambiguous, no overlapping impls)
    ($expr:expr) => {
        $expr.map_err(|e: $crate::BufferError| -> std::io::Error { e.into() })
    };
}

/// Try a buffer operation with automatic error conversion
#[macro_export]
macro_rules! buffer_try {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => return Err(e.into()),
        }
    };
}

// ============================================================================
// CORE ERROR TAXONOMY — network I/O core (pool, timer, worker, conn pool)
// ============================================================================

/// Error taxonomy for the network I/O core: task pool, timing wheel, worker
/// loop, dispatch queue, and client connection pool.
///
/// This is a distinct type from [`BufferError`] because the core's failure
/// modes are about concurrency and resource exhaustion, not buffer bounds;
/// a [`BufferError`] that escapes a `Buffer` operation inside a task is
/// converted via [`From`] rather than folded into this enum's variants.
#[derive(Debug)]
pub enum CoreError {
    /// Malformed file id, bad config value, ill-formed URL, header outside
    /// expected size.
    InvalidArgument(String),
    /// Allocation failed during pool init or buffer shrink.
    OutOfMemory,
    /// Timer entry already removed, or no live connection path for a file id.
    NotFound(String),
    /// Connect-, read-, write-, or idle-timeout.
    Timeout(String),
    /// OS-level I/O failure, tagged with the operation and peer.
    NetworkError {
        /// The syscall-level operation that failed (`"connect"`, `"read"`, ...).
        op: &'static str,
        /// The peer address involved, if known.
        peer: String,
        /// The underlying OS error.
        cause: std::io::Error,
    },
    /// Framing or status-code mismatch in the wire protocol.
    Protocol(String),
    /// API call made after the owning pool was closed.
    PoolClosed,
    /// Task pool exhausted, or no storage server available.
    Unavailable(String),
    /// Unrecoverable internal invariant violation; the owning worker stops.
    Fatal(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Timeout(op) => write!(f, "timed out: {op}"),
            Self::NetworkError { op, peer, cause } => {
                write!(f, "network error during {op} to {peer}: {cause}")
            }
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::PoolClosed => write!(f, "pool is closed"),
            Self::Unavailable(what) => write!(f, "unavailable: {what}"),
            Self::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NetworkError { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => CoreError::Timeout("io".to_string()),
            _ => CoreError::NetworkError {
                op: "io",
                peer: String::new(),
                cause: err,
            },
        }
    }
}

impl From<BufferError> for CoreError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Io(msg) => CoreError::NetworkError {
                op: "buffer-io",
                peer: String::new(),
                cause: std::io::Error::other(msg),
            },
            other => CoreError::InvalidArgument(other.to_string()),
        }
    }
}

/// Result type alias for network I/O core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod core_error_tests {
    use super::*;

    #[test]
    fn displays_network_error_with_peer_and_op() {
        let err = CoreError::NetworkError {
            op: "connect",
            peer: "10.0.0.1:23000".to_string(),
            cause: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("connect"));
        assert!(rendered.contains("10.0.0.1:23000"));
    }

    #[test]
    fn io_error_timed_out_maps_to_timeout_variant() {
        let io_err = std::io::Error::from(std::io::ErrorKind::TimedOut);
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Timeout(_)));
    }

    #[test]
    fn buffer_overflow_maps_to_invalid_argument() {
        let core_err: CoreError = BufferError::BufferOverflow.into();
        assert!(matches!(core_err, CoreError::InvalidArgument(_)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_io() {
        let buf_err = BufferError::BufferOverflow;
        let io_err: std::io::Error = buf_err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_result_ext() {
        let result: Result<u32> = Ok(42);
        let io_result = result.into_io();
        assert_eq!(io_result.unwrap(), 42);
    }

    #[cfg(feature = "anyhow")]
    #[test]
    fn test_anyhow_conversion() {
        let buf_err = BufferError::InvalidString;
        let anyhow_err: anyhow::Error = buf_err.into();
        assert!(anyhow_err.to_string().contains("Invalid string"));
    }
}