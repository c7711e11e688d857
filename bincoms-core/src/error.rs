use crate::status::StatusCode;
use thiserror::Error;

/// Main error type for bincoms operations
#[derive(Error, Debug)]
pub enum BincomsError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    /// The response header or payload did not arrive in the expected shape.
    #[error("Protocol framing error: {0}")]
    ProtocolFraming(String),

    /// The payload length disagreed with the expected return layout.
    #[error(
        "Received answer {received:?} does not match the expected format \"{layout}\", trailing bytes: {residual:?}"
    )]
    FormatMismatch {
        layout: String,
        received: Vec<u8>,
        residual: Vec<u8>,
    },

    /// The device rejected the request with a non-OK status.
    #[error("{}, {}", .0.name(), .0.message())]
    Device(StatusCode),

    #[error("Function {function} takes {expected} argument(s), {got} given")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Argument {index} cannot be packed as {expected}: {found}")]
    ArgumentType {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Unrecognized field code '{0}'")]
    UnknownFieldCode(char),

    #[error("Function name \"{0}\" advertised twice")]
    DuplicateFunction(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Capability discovery failed on every attempt.
    #[error("Capability discovery failed after {attempts} attempt(s): {source}")]
    Handshake {
        attempts: usize,
        #[source]
        source: Box<BincomsError>,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Captured records could not be written or read back.
    #[error("Record store error: {0}")]
    Storage(String),
}

impl BincomsError {
    /// Errors that signal a desynchronized link rather than a device answer.
    pub fn is_link_corruption(&self) -> bool {
        matches!(
            self,
            BincomsError::ProtocolFraming(_) | BincomsError::FormatMismatch { .. }
        )
    }

    /// Errors reported by the device through the status byte.
    pub fn is_device_status(&self) -> bool {
        matches!(self, BincomsError::Device(_))
    }

    /// Errors raised before anything touched the channel.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BincomsError::ArgumentCount { .. }
                | BincomsError::ArgumentType { .. }
                | BincomsError::UnknownOperation(_)
                | BincomsError::InvalidData(_)
        )
    }

    /// Status code carried by a device error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BincomsError::Device(status) => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for bincoms operations
pub type BincomsResult<T> = Result<T, BincomsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_message() {
        let err = BincomsError::Device(StatusCode::ValueError);
        assert_eq!(
            err.to_string(),
            "VALUE_ERROR, The provided arguments are outside the allowed range"
        );
        assert!(err.is_device_status());
        assert!(!err.is_link_corruption());
        assert_eq!(err.status(), Some(StatusCode::ValueError));
    }

    #[test]
    fn test_error_categories() {
        assert!(BincomsError::ProtocolFraming("x".into()).is_link_corruption());
        let mismatch = BincomsError::FormatMismatch {
            layout: "H".into(),
            received: vec![1],
            residual: vec![],
        };
        assert!(mismatch.is_link_corruption());
        assert!(
            BincomsError::ArgumentCount {
                function: "start".into(),
                expected: 1,
                got: 0
            }
            .is_local()
        );
        assert!(!BincomsError::Timeout.is_local());
    }
}
