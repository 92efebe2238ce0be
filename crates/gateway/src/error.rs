use thiserror::Error;

use archivum_auth::AuthzError;
use archivum_core::DomainError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

/// Transport-neutral classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unauthenticated,
    Forbidden,
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl Status {
    /// HTTP-equivalent status code.
    pub fn code(self) -> u16 {
        match self {
            Status::Unauthenticated => 401,
            Status::Forbidden => 403,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::Conflict => 409,
            Status::Internal => 500,
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Authz(AuthzError::InsufficientAuthentication) => Status::Unauthenticated,
            ApiError::Authz(AuthzError::AccessDenied) => Status::Forbidden,
            ApiError::Authz(AuthzError::Domain(err)) | ApiError::Domain(err) => domain_status(err),
            ApiError::UnknownOperation(_) => Status::Internal,
        }
    }
}

fn domain_status(err: &DomainError) -> Status {
    match err {
        DomainError::InvalidParameter(_) => Status::BadRequest,
        DomainError::NotFound(_) => Status::NotFound,
        DomainError::AlreadyExists(_) | DomainError::Conflict(_) => Status::Conflict,
        DomainError::Backend(_) => Status::Internal,
    }
}
