use thiserror::Error;

/// Input validation failures surfaced to the operator. None of these mutate
/// the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("location is empty")]
    EmptyLocation,
    #[error("'{0}' is not a shelf location (expected e.g. SHELF 2C)")]
    InvalidShelf(String),
    #[error("item name is empty")]
    EmptyItemName,
    #[error("no box or shelf is selected")]
    NoActiveLocation,
}

pub type AuditResult<T> = Result<T, AuditError>;
