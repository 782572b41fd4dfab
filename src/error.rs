//! Error types for model definition and sampling.
//!
//! Definition-time mistakes (bad distribution parameters, malformed models)
//! are [`ModelError`]; everything that can additionally go wrong once a
//! sampler is running is [`SamplerError`], which wraps the former.
//! `NumericalDivergence` from the design notes has no `Err` representation —
//! it is a per-iteration flag recorded into [`crate::result::MCMCResult`]
//! rather than raised.

use thiserror::Error;

/// Errors raised while building or compiling a model, before any sampling
/// has started. Always fatal to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// A distribution constructor constraint was violated (e.g. `sigma <= 0`).
    #[error("invalid distribution parameters: {0}")]
    InvalidDistribution(String),

    /// A parameter has no prior, two priors, or is referenced before it is
    /// bound; or the left-hand side of `~` is not a `Param`/`Data` node.
    #[error("model definition error: {0}")]
    ModelDefinitionError(String),

    /// Vector-shaped data paired with a distribution whose parameter shape
    /// cannot be broadcast against it.
    #[error("dimension mismatch: expected size {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Errors a sampler invocation (`mh`/`nuts`) can return.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// No finite-log-density initial point was found within the retry budget.
    #[error("failed to find a finite-log-density initial point after {attempts} attempts")]
    InitializationFailed { attempts: usize },
}

pub type ModelResult<T> = Result<T, ModelError>;
pub type SamplerResult<T> = Result<T, SamplerError>;
