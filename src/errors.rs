//! Error types for querylens
//!
//! Every error here is a contract violation detected while declaring
//! descriptors, composing plans or reconstructing rows. None of them are
//! transient; callers fix the declaration instead of retrying.
//!
//! Error codes:
//! - QL_OPTIONAL_NEEDS_WRAPPING
//! - QL_REQUIRED_MUST_NOT_BE_WRAPPED
//! - QL_AMBIGUOUS_SELECTION
//! - QL_SELECTION_NOT_RESOLVABLE
//! - QL_NO_ORDERING
//! - QL_NULL_FOR_REQUIRED_ARGUMENT
//! - QL_ILLEGAL_COMPOSITION
//! - QL_INTERNAL_CONSISTENCY

use thiserror::Error;

/// Result type for querylens operations
pub type QueryResult<T> = Result<T, QueryError>;

/// querylens errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    // ==================
    // Descriptor errors
    // ==================
    /// Storage says optional, descriptor is not wrapped
    #[error("{declaring}.{attribute} is optional in storage, wrap it with Field::optional")]
    OptionalAttributeNeedsWrapping { declaring: String, attribute: String },

    /// Storage says required, descriptor is wrapped
    #[error("{declaring}.{attribute} is required in storage, remove the Field::optional wrapper")]
    RequiredAttributeMustNotBeWrapped { declaring: String, attribute: String },

    /// Invalid nesting of derived descriptors
    #[error("Illegal descriptor composition: {0}")]
    IllegalDescriptorComposition(String),

    // ==================
    // Plan errors
    // ==================
    /// Plan selection could not be determined
    #[error("Could not resolve selection. Either declare a result type matching the single query root or select explicitly")]
    AmbiguousSelection,

    /// Selection could not be re-located in the target plan
    #[error("Could not resolve selection in target plan")]
    SelectionNotResolvable,

    /// Paged query without ordering
    #[error("Paged query requires an ordering. Either pass orders explicitly or use a query which defines ordering itself")]
    NoOrderingSpecified,

    // ==================
    // Reconstruction errors
    // ==================
    /// Required constructor argument resolved to null
    #[error("Constructor {target} had a non-optional argument of type {declared} at position {position} which was supplied with null")]
    NullValueForRequiredArgument {
        target: String,
        position: usize,
        declared: String,
    },

    /// Reconstructed value count differs from declared parameters
    #[error("Constructor {target} expects {expected} arguments but got {actual}")]
    ArityMismatch {
        target: String,
        expected: usize,
        actual: usize,
    },

    /// Argument could not be converted into the requested Rust type
    #[error("Argument {position} of {target}: expected {expected}, found {found}")]
    ArgumentTypeMismatch {
        target: String,
        position: usize,
        expected: String,
        found: String,
    },

    /// Builder and reconstructor disagree
    #[error("Internal consistency failure: {0}")]
    InternalConsistency(String),

    // ==================
    // Metamodel errors
    // ==================
    /// Entity type not registered
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// Attribute not declared on the entity or embeddable
    #[error("Unknown attribute: {declaring}.{attribute}")]
    UnknownAttribute { declaring: String, attribute: String },

    /// Embeddable type not registered
    #[error("Unknown embeddable: {0}")]
    UnknownEmbeddable(String),

    // ==================
    // Execution errors
    // ==================
    /// Query returned no result
    #[error("No result")]
    NoResult,

    /// Query returned more than one result
    #[error("Expected a single result but got {0}")]
    NonUniqueResult(usize),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage session failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl QueryError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::OptionalAttributeNeedsWrapping { .. } => "QL_OPTIONAL_NEEDS_WRAPPING",
            QueryError::RequiredAttributeMustNotBeWrapped { .. } => {
                "QL_REQUIRED_MUST_NOT_BE_WRAPPED"
            }
            QueryError::IllegalDescriptorComposition(_) => "QL_ILLEGAL_COMPOSITION",
            QueryError::AmbiguousSelection => "QL_AMBIGUOUS_SELECTION",
            QueryError::SelectionNotResolvable => "QL_SELECTION_NOT_RESOLVABLE",
            QueryError::NoOrderingSpecified => "QL_NO_ORDERING",
            QueryError::NullValueForRequiredArgument { .. } => "QL_NULL_FOR_REQUIRED_ARGUMENT",
            QueryError::ArityMismatch { .. } => "QL_ARITY_MISMATCH",
            QueryError::ArgumentTypeMismatch { .. } => "QL_ARGUMENT_TYPE_MISMATCH",
            QueryError::InternalConsistency(_) => "QL_INTERNAL_CONSISTENCY",
            QueryError::UnknownEntity(_) => "QL_UNKNOWN_ENTITY",
            QueryError::UnknownAttribute { .. } => "QL_UNKNOWN_ATTRIBUTE",
            QueryError::UnknownEmbeddable(_) => "QL_UNKNOWN_EMBEDDABLE",
            QueryError::NoResult => "QL_NO_RESULT",
            QueryError::NonUniqueResult(_) => "QL_NON_UNIQUE_RESULT",
            QueryError::InvalidConfig(_) => "QL_INVALID_CONFIG",
            QueryError::Storage(_) => "QL_STORAGE",
        }
    }

    /// Returns true for errors raised while declaring descriptors or
    /// composing a plan, before anything is executed
    pub fn is_build_time(&self) -> bool {
        matches!(
            self,
            QueryError::OptionalAttributeNeedsWrapping { .. }
                | QueryError::RequiredAttributeMustNotBeWrapped { .. }
                | QueryError::IllegalDescriptorComposition(_)
                | QueryError::AmbiguousSelection
                | QueryError::SelectionNotResolvable
                | QueryError::NoOrderingSpecified
                | QueryError::UnknownEntity(_)
                | QueryError::UnknownAttribute { .. }
                | QueryError::UnknownEmbeddable(_)
        )
    }
}
