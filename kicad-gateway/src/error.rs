//! Service-level errors and their JSON-RPC codes.

use thiserror::Error;

use crate::catalog::DiscoveryError;
use crate::config::ConfigError;
use crate::session::SessionError;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SESSION_UNAVAILABLE: i32 = -32001;
pub const RESOURCE_NOT_FOUND: i32 = -32002;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Tool not found: {0}")]
    UnknownTool(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn rpc_code(&self) -> i32 {
        match self {
            GatewayError::Session(e) if e.is_unavailable() => SESSION_UNAVAILABLE,
            GatewayError::Session(_) => INTERNAL_ERROR,
            GatewayError::Discovery(_) => RESOURCE_NOT_FOUND,
            GatewayError::InvalidParams(_) | GatewayError::UnknownTool(_) => INVALID_PARAMS,
            GatewayError::MethodNotFound(_) => METHOD_NOT_FOUND,
            GatewayError::InvalidRequest(_) => INVALID_REQUEST,
            GatewayError::Config(_) | GatewayError::Internal(_) => INTERNAL_ERROR,
        }
    }
}
