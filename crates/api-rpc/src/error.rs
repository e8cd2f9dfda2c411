//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use groupq_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const BROKER_ERROR: i32 = 5003;
}

/// Numeric code for an application error
pub fn error_code(err: &AppError) -> i32 {
    match err {
        AppError::Validation(_)
        | AppError::MissingGroupId { .. }
        | AppError::Domain(_)
        | AppError::Serialization(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) | AppError::UnknownCategory(_) => code::NOT_FOUND,
        AppError::InvalidState(_) => code::CONFLICT,
        AppError::Database(_) => code::DB_ERROR,
        AppError::BrokerUnavailable(_) => code::BROKER_ERROR,
        AppError::HandlerConstruction { .. }
        | AppError::HandlerProcessing(_)
        | AppError::Config(_)
        | AppError::Io(_)
        | AppError::Internal(_) => code::INTERNAL_ERROR,
    }
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(error_code(&err), err.to_string(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupq_core::domain::QueueCategory;

    #[test]
    fn test_submission_errors_map_to_client_codes() {
        let missing = AppError::MissingGroupId {
            category: QueueCategory::Message,
        };
        assert_eq!(error_code(&missing), code::VALIDATION_ERROR);
        assert_eq!(
            error_code(&AppError::UnknownCategory("billing".into())),
            code::NOT_FOUND
        );
        assert_eq!(
            error_code(&AppError::InvalidState("already finished".into())),
            code::CONFLICT
        );
    }

    #[test]
    fn test_backend_errors_map_to_server_codes() {
        assert_eq!(
            error_code(&AppError::BrokerUnavailable("locked".into())),
            code::BROKER_ERROR
        );
        assert_eq!(error_code(&AppError::Database("disk".into())), code::DB_ERROR);

        let rpc = to_rpc_error(AppError::Internal("boom".into()));
        assert_eq!(rpc.code(), code::INTERNAL_ERROR);
        assert!(rpc.message().contains("boom"));
    }
}
