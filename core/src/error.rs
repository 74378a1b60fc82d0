//! Error types for belief updates and episode runs.

use thiserror::Error;

/// Numerical and shape failures raised while advancing a belief.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Every hypothesis carrying mass was assigned (near) zero likelihood, so the
    /// posterior cannot be renormalized.
    #[error("degenerate posterior: total mass {total} after {filter} update cannot be normalized")]
    DegeneratePosterior { filter: &'static str, total: f64 },

    /// A batch likelihood query was given coordinate vectors of different lengths.
    #[error("shape mismatch: {xs} x-coordinates but {ys} y-coordinates")]
    ShapeMismatch { xs: usize, ys: usize },
}

pub type Result<T> = std::result::Result<T, FilterError>;
