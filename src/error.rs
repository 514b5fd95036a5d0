//! Error types for elementkit operations.

use thiserror::Error;

/// Errors raised by the host document.
///
/// The wrapper layer never produces these on its own; they are forwarded
/// unchanged from the DOM operation that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid class token: {0:?}")]
    InvalidToken(String),

    #[error("Invalid attribute name: {0:?}")]
    InvalidAttributeName(String),

    #[error("Invalid insert position: {0:?}")]
    InvalidInsertPosition(String),

    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(&'static str),

    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("Node belongs to a different document")]
    WrongDocument,

    #[error("No modification allowed: {0}")]
    NoModificationAllowed(&'static str),

    #[error("Invalid observer options: {0}")]
    InvalidObserverOptions(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
