//! RPC Error Types
//!
//! Caller mistakes get 4xxx codes, engine-side failures 5xxx.

use jsonrpsee::types::ErrorObjectOwned;
use restyle_core::error::AppError;

/// RPC Error Codes
pub mod code {
    /// Rejected creation request; nothing was stored
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    /// Stored record could not be decoded or violated the state machine
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Validation(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Domain(_) | AppError::Serialization(_) => code::INTERNAL_ERROR,
    };

    let message = match err {
        AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Database(msg) => msg,
        other => other.to_string(),
    };

    ErrorObjectOwned::owned(code, message, None::<()>)
}
