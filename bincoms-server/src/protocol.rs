//! JSON-RPC 2.0 messages
//!
//! One request object per line, one response object per line.

use bincoms_core::{BincomsError, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const TRANSPORT_ERROR: i64 = -32000;
pub const LINK_CORRUPTION: i64 = -32001;

/// Incoming call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    /// Positional parameters; absent means none
    #[serde(default)]
    pub params: Option<Json>,
    #[serde(default)]
    pub id: Json,
}

impl RpcRequest {
    pub fn new(method: &str, params: Vec<Json>, id: Json) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            method: method.to_string(),
            params: Some(Json::Array(params)),
            id,
        }
    }

    /// Positional parameters
    ///
    /// Named parameters are not supported and yield an invalid params fault.
    pub fn positional(&self) -> Result<&[Json], Fault> {
        match &self.params {
            None | Some(Json::Null) => Ok(&[][..]),
            Some(Json::Array(values)) => Ok(values.as_slice()),
            Some(_) => Err(Fault::new(
                FaultKind::InvalidParams,
                INVALID_PARAMS,
                "Parameters must be passed by position",
            )),
        }
    }
}

/// Outgoing reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Fault>,
    pub id: Json,
}

impl RpcResponse {
    pub fn success(id: Json, result: Json) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Json, fault: Fault) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(fault),
            id,
        }
    }

    pub fn from_result(id: Json, result: Result<Json, Fault>) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(fault) => Self::failure(id, fault),
        }
    }
}

/// Fault category carried in `error.data.kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    UnknownOperation,
    InvalidParams,
    DeviceStatus,
    LinkCorruption,
    Transport,
    ParseError,
    InvalidRequest,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultData {
    pub kind: FaultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub code: i64,
    pub message: String,
    pub data: FaultData,
}

impl Fault {
    pub fn new(kind: FaultKind, code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: FaultData { kind, status: None },
        }
    }

    pub fn unknown_operation(name: &str) -> Self {
        Self::new(
            FaultKind::UnknownOperation,
            METHOD_NOT_FOUND,
            format!("Unknown operation: {}", name),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidParams, INVALID_PARAMS, message)
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::ParseError, PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidRequest, INVALID_REQUEST, message)
    }

    pub fn device_status(status: StatusCode) -> Self {
        Self {
            code: status.as_byte() as i64,
            message: format!("{}, {}", status.name(), status.message()),
            data: FaultData {
                kind: FaultKind::DeviceStatus,
                status: Some(status.name().to_string()),
            },
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.data.kind
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<BincomsError> for Fault {
    fn from(err: BincomsError) -> Self {
        let message = err.to_string();
        match err {
            BincomsError::UnknownOperation(name) => Fault::unknown_operation(&name),
            BincomsError::Device(status) => Fault::device_status(status),
            BincomsError::ArgumentCount { .. }
            | BincomsError::ArgumentType { .. }
            | BincomsError::UnknownFieldCode(_)
            | BincomsError::InvalidData(_) => Fault::invalid_params(message),
            BincomsError::ProtocolFraming(_) | BincomsError::FormatMismatch { .. } => {
                Fault::new(FaultKind::LinkCorruption, LINK_CORRUPTION, message)
            }
            BincomsError::Timeout | BincomsError::Connection(_) => {
                Fault::new(FaultKind::Transport, TRANSPORT_ERROR, message)
            }
            BincomsError::Handshake { .. }
            | BincomsError::DuplicateFunction(_)
            | BincomsError::Storage(_) => Fault::new(FaultKind::Internal, INTERNAL_ERROR, message),
        }
    }
}
