//! Device status table
//!
//! Every response frame carries a status byte. Zero means the request was
//! served and a payload follows; the other seven codes are rejections sent
//! without payload.

use std::fmt;

/// Status byte reported by the device in a response header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    Ok = 0,
    Busy = 1,
    Error = 2,
    UndefinedFunction = 3,
    ByteCountError = 4,
    CommunicationError = 5,
    /// Defined by the firmware but never produced; the frame has no checksum.
    ChecksumError = 6,
    ValueError = 7,
}

impl StatusCode {
    /// All codes in wire order.
    pub const ALL: [StatusCode; 8] = [
        StatusCode::Ok,
        StatusCode::Busy,
        StatusCode::Error,
        StatusCode::UndefinedFunction,
        StatusCode::ByteCountError,
        StatusCode::CommunicationError,
        StatusCode::ChecksumError,
        StatusCode::ValueError,
    ];

    /// Look up a status byte. Returns `None` outside the table.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    /// Name used by the firmware headers.
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Ok => "STATUS_OK",
            StatusCode::Busy => "STATUS_BUSY",
            StatusCode::Error => "STATUS_ERROR",
            StatusCode::UndefinedFunction => "UNDEFINED_FUNCTION_ERROR",
            StatusCode::ByteCountError => "BYTE_COUNT_ERROR",
            StatusCode::CommunicationError => "COMMUNICATION_ERROR",
            StatusCode::ChecksumError => "CHECKSUM_ERROR",
            StatusCode::ValueError => "VALUE_ERROR",
        }
    }

    /// Human-readable explanation of the code.
    pub fn message(self) -> &'static str {
        match self {
            StatusCode::Ok => "Action performed successfully",
            StatusCode::Busy => "Device is busy with another action",
            StatusCode::Error => "Action failed for undefined cause",
            StatusCode::UndefinedFunction => "Unknown function code (check command_count)",
            StatusCode::ByteCountError => {
                "Incorrect size for the provided data buffer (check get_command_names(f, 1) for the expected arguments)"
            }
            StatusCode::CommunicationError => "Ill-formed message on the communication port",
            StatusCode::ChecksumError => "Not used for now",
            StatusCode::ValueError => "The provided arguments are outside the allowed range",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_total_over_eight_codes() {
        for byte in 0u8..8 {
            let code = StatusCode::from_byte(byte).unwrap();
            assert_eq!(code.as_byte(), byte);
        }
        assert_eq!(StatusCode::from_byte(8), None);
        assert_eq!(StatusCode::from_byte(0xFF), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(StatusCode::Busy.name(), "STATUS_BUSY");
        assert_eq!(StatusCode::UndefinedFunction.to_string(), "UNDEFINED_FUNCTION_ERROR");
        assert!(StatusCode::Ok.is_ok());
        assert!(!StatusCode::ChecksumError.is_ok());
    }
}
