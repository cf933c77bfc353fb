//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use scanhive_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const UNKNOWN_TOOL: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::InvalidRequest(_) | AppError::Domain(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::UnknownTool(_) => code::UNKNOWN_TOOL,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Io(_) | AppError::Serialization(_) | AppError::Internal(_) => {
            code::INTERNAL_ERROR
        }
    };
    let message = match err {
        AppError::InvalidRequest(msg) | AppError::NotFound(msg) => msg,
        other => other.to_string(),
    };
    ErrorObjectOwned::owned(code, message, None::<()>)
}
