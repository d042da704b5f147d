//! Error taxonomy for search-space operations.
//!
//! Three families, matching the three ways a space mutation can go wrong:
//! - [`StructuralError`] — malformed edge requests or membership violations.
//! - [`AssignmentError`] — a value outside a parameter's domain, or an
//!   assignment the parameter's kind forbids.
//! - [`ExpansionError`] — a dynamic placeholder's builder failed or returned
//!   modules the owning space does not recognize.
//!
//! All failures surface synchronously to the caller of the triggering
//! operation; chained effects that fail abort that operation.

use thiserror::Error;

use crate::value::Value;

/// Malformed edge requests and membership violations.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("module `{0}` is not a member of this space")]
    NotAMember(String),

    #[error("module `{0}` belongs to a different space")]
    ForeignModule(String),

    #[error("refusing self-loop edge on `{0}`")]
    SelfLoop(String),

    #[error("edge `{0}` -> `{1}` already exists")]
    DuplicateEdge(String, String),
}

/// Domain violations and kind-forbidden assignments.
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("value `{value}` is outside the domain of `{name}`")]
    OutOfDomain { name: String, value: Value },

    #[error("`{0}` is already assigned")]
    AlreadyAssigned(String),

    #[error("`{0}` is computed from its dependencies and cannot be assigned directly")]
    NotDirectlyAssignable(String),

    #[error("`{0}` has an empty sampling domain")]
    EmptyDomain(String),

    #[error("`{0}` holds a {1} value and cannot be reset")]
    NotResettable(String, &'static str),
}

/// Dynamic placeholder expansion failures.
#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("builder for `{name}` failed: {reason}")]
    BuilderFailed { name: String, reason: String },

    #[error("builder for `{name}` returned module(s) not owned by this space")]
    ForeignReplacement { name: String },
}

/// Umbrella error for operations that can fail in more than one family.
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error(transparent)]
    Expansion(#[from] ExpansionError),
}
