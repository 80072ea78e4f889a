//! Error types shared by every Trellis crate

use thiserror::Error;

/// The core error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A required argument was missing, malformed, or of the wrong type
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Component id violates the identifier syntax
    #[error("Invalid component identifier: {0:?}")]
    InvalidIdentifier(String),
    /// Attribute key cannot hold the supplied value
    #[error("Invalid attribute key: {0}")]
    InvalidKey(String),
    /// A non-terminal segment of a search expression did not resolve
    #[error("Component not found for expression segment: {0}")]
    ComponentNotFound(String),
    /// Mutation of a declared property that does not allow it
    #[error("Unsupported property operation: {0}")]
    UnsupportedProperty(String),
    /// Tree ownership invariant violated; a programming error
    #[error("Illegal tree state: {0}")]
    IllegalTreeState(String),
    /// Saved state does not match the shape of the tree it is restored into
    #[error("State mismatch: {0}")]
    StateMismatch(String),
    /// Event queued from a node with no ancestor willing to accept it
    #[error("No event target: event queued outside an attached tree")]
    NoEventTarget,
    /// A listener stopped further processing of the current event
    #[error("Event processing aborted: {0}")]
    AbortProcessing(String),
    /// Handle does not refer to a live node
    #[error("Stale handle: {0}")]
    StaleHandle(String),
    /// Expression evaluation failed
    #[error("Expression error: {0}")]
    Expression(String),
    /// Renderer failure
    #[error("Render error: {0}")]
    Render(String),
    /// Encoding or decoding of saved state failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the error signals a broken ownership invariant rather than a
    /// recoverable condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::IllegalTreeState(_))
    }
}

/// Result type alias
pub type Result<T> = core::result::Result<T, Error>;
