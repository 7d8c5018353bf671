use thiserror::Error;

/// Error kinds surfaced by the core, per the wire error-code contract
/// clients branch on (spec.md §7).
#[derive(Debug, Error, Clone)]
pub enum KecsError {
    #[error("{0}")]
    ResourceNotFound(String),

    #[error("{0}")]
    ResourceAlreadyExists(String),

    #[error("{0}")]
    InvalidParameterValue(String),

    #[error("{0}")]
    ClusterNotEmpty(String),

    #[error("{0}")]
    ClusterContainsServicesException(String),

    #[error("{0}")]
    ServiceNotActive(String),

    #[error("{0}")]
    ServiceNotFound(String),

    #[error("{0}")]
    TargetGroupAssociationLimit(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl KecsError {
    /// The `__type` string AWS JSON-1.1 clients branch on.
    pub fn wire_type(&self) -> &'static str {
        match self {
            KecsError::ResourceNotFound(_) => "ResourceNotFoundException",
            KecsError::ResourceAlreadyExists(_) => "ResourceAlreadyExistsException",
            KecsError::InvalidParameterValue(_) => "InvalidParameterException",
            KecsError::ClusterNotEmpty(_) => "ClusterNotEmptyException",
            KecsError::ClusterContainsServicesException(_) => "ClusterContainsServicesException",
            KecsError::ServiceNotActive(_) => "ServiceNotActiveException",
            KecsError::ServiceNotFound(_) => "ServiceNotFoundException",
            KecsError::TargetGroupAssociationLimit(_) => "TargetGroupAssociationLimitException",
            KecsError::AccessDenied(_) => "AccessDeniedException",
            KecsError::Internal(_) => "ServerException",
        }
    }

    /// HTTP status the wire protocol maps this error kind to.
    pub fn http_status(&self) -> u16 {
        match self {
            KecsError::ResourceNotFound(_) => 400,
            KecsError::ResourceAlreadyExists(_) => 400,
            KecsError::InvalidParameterValue(_) => 400,
            KecsError::ClusterNotEmpty(_) => 400,
            KecsError::ClusterContainsServicesException(_) => 400,
            KecsError::ServiceNotActive(_) => 400,
            KecsError::ServiceNotFound(_) => 400,
            KecsError::TargetGroupAssociationLimit(_) => 400,
            KecsError::AccessDenied(_) => 403,
            KecsError::Internal(_) => 500,
        }
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        KecsError::ResourceNotFound(format!("{kind} not found: {id}"))
    }

    pub fn already_exists(kind: &str, id: &str) -> Self {
        KecsError::ResourceAlreadyExists(format!("{kind} already exists: {id}"))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        KecsError::InvalidParameterValue(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        KecsError::Internal(msg.into())
    }
}

pub type KecsResult<T> = Result<T, KecsError>;
