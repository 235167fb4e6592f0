//! Error kinds for the fusion boundary (§7). Fusion never panics on bad input —
//! a batch that cannot be fused at all returns `Err`; everything else is recorded as
//! a flag on the resulting [`witness_types::EventEstimate`].

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FusionError {
    /// Batch sealed with fewer than 2 observations, or fewer than 2 non-parallel rays.
    #[error("insufficient observations to fuse a position (need >= 2 non-parallel rays)")]
    InsufficientObservations,

    /// An observer's position lies inside its own hint's unit square — the wedge
    /// invariant `theta_max - theta_min < pi` cannot hold and the wedge is undefined.
    #[error("observer position falls inside its own hint's unit square")]
    DegenerateObserver,
}

pub type FusionResult<T> = Result<T, FusionError>;
