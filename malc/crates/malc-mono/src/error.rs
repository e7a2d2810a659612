//! Monomorphization errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonoError {
    /// A call carries type arguments but no function of that name exists
    /// in the module.
    #[error("generic function `{name}` referenced by a call is not present in the module")]
    MissingFunction { name: String },

    /// Call-site type arguments do not match the target's parameter list.
    #[error("`{name}` takes {expected} type parameters, call supplies {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
}
