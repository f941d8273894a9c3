use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("unauthorized - missing required permission")]
    Forbidden,
    #[error("unknown permission identifier '{0}'")]
    UnknownPermission(String),
    #[error("unknown role '{0}'")]
    UnknownRole(String),
}
