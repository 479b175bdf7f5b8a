use std::fmt;

use tonic::{Code, Status};

/// Stable error codes propagated end-to-end across service boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    InvalidInput,
    Unauthorized,
    Forbidden,
    Conflict,
    InternalServer,
    ServiceUnavailable,
    EventPublish,
    EventSubscription,
    ObjectMarshal,
    ObjectUnmarshal,
    Database,
    Transaction,
    GrpcCall,
    Redis,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InternalServer => "INTERNAL_SERVER",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::EventPublish => "EVENT_PUBLISH_ERROR",
            ErrorCode::EventSubscription => "EVENT_SUBSCRIPTION_ERROR",
            ErrorCode::ObjectMarshal => "OBJECT_MARSHAL_ERROR",
            ErrorCode::ObjectUnmarshal => "OBJECT_UNMARSHAL_ERROR",
            ErrorCode::Database => "DATABASE_ERROR",
            ErrorCode::Transaction => "TRANSACTION_ERROR",
            ErrorCode::GrpcCall => "GRPC_CALL_ERROR",
            ErrorCode::Redis => "REDIS_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error carrying a stable code and a wire-safe message.
///
/// The cause chain stays local for logs; only code and message cross service
/// boundaries.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn wrap(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServer, message)
    }

    /// Reverse mapping applied at the gRPC client boundary.
    pub fn from_status(status: Status) -> Self {
        let code = match status.code() {
            Code::NotFound => ErrorCode::NotFound,
            Code::AlreadyExists => ErrorCode::AlreadyExists,
            Code::InvalidArgument => ErrorCode::InvalidInput,
            Code::Unauthenticated => ErrorCode::Unauthorized,
            Code::PermissionDenied => ErrorCode::Forbidden,
            Code::Aborted => ErrorCode::Conflict,
            Code::Unavailable => ErrorCode::ServiceUnavailable,
            _ => ErrorCode::InternalServer,
        };
        Self::new(code, status.message().to_string())
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        let code = match err.code {
            ErrorCode::NotFound => Code::NotFound,
            ErrorCode::AlreadyExists => Code::AlreadyExists,
            ErrorCode::InvalidInput => Code::InvalidArgument,
            ErrorCode::Unauthorized => Code::Unauthenticated,
            ErrorCode::Forbidden => Code::PermissionDenied,
            ErrorCode::Conflict => Code::Aborted,
            ErrorCode::ServiceUnavailable => Code::Unavailable,
            _ => Code::Internal,
        };
        Status::new(code, err.message)
    }
}
