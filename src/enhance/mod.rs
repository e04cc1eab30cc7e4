//! Bone enhancement measures built on Hessian eigenvalues
//!
//! Two published sheetness measures are provided, each paired with its
//! automatic parameter-estimation pass:
//! - [`descoteaux`]: Descoteaux et al. sheetness (MICCAI 2005)
//! - [`krcah`]: Krcah et al. sheetness (ISBI 2011), with optional
//!   unsharp-mask preprocessing ([`preprocess`])
//!
//! [`multiscale`] drives either measure across a range of smoothing scales
//! and keeps, per voxel, the response of greatest absolute magnitude.
//!
//! Estimator/measure pairs sit behind the [`SheetnessMethod`] strategy trait;
//! the multi-scale driver is generic over it, so the method is chosen once at
//! construction rather than dispatched per voxel.

use rayon::prelude::*;

use crate::utils::MaskVolume;

pub mod descoteaux;
pub mod krcah;
pub mod multiscale;
pub mod preprocess;

pub use descoteaux::{descoteaux_sheetness, estimate_descoteaux_parameters, Descoteaux};
pub use krcah::{estimate_krcah_parameters, krcah_sheetness, Krcah, KrcahParameterSet};
pub use multiscale::{
    descoteaux_enhancement, descoteaux_enhancement_with_progress, equispaced_sigma_array,
    krcah_enhancement, logarithmic_sigma_array, max_absolute_combine, multiscale_enhancement,
    multiscale_enhancement_with_progress, DescoteauxParams, KrcahEnhancementResult, KrcahParams,
};
pub use preprocess::unsharp_mask;

/// Number of scalar parameters every measure consumes: {alpha, beta, c-or-gamma}
pub const PARAMETER_COUNT: usize = 3;

/// Estimated measure parameters, positional {alpha, beta, c-or-gamma}
pub type Parameters = [f64; PARAMETER_COUNT];

/// Threshold below which an eigenvalue denominator counts as degenerate
///
/// Degenerate voxels yield a zero measure rather than an error.
pub const DEGENERATE_EPS: f64 = f64::EPSILON;

/// Which intensity polarity to enhance
///
/// Bright structures (e.g. cortical bone in CT) have a strongly negative
/// dominant eigenvalue, so the internal sign multiplier is -1 for bright and
/// +1 for dark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnhanceDirection {
    /// Enhance structures brighter than their surroundings
    Bright,
    /// Enhance structures darker than their surroundings
    Dark,
}

impl EnhanceDirection {
    /// Sign convention applied to the dominant eigenvalue
    #[inline]
    pub(crate) fn multiplier(self) -> f64 {
        match self {
            EnhanceDirection::Bright => -1.0,
            EnhanceDirection::Dark => 1.0,
        }
    }
}

/// Structural failures of the enhancement pipeline
///
/// Degenerate eigenvalues and masked-out voxels are not errors; they produce
/// zero measures by documented policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnhanceError {
    /// Invalid sigma configuration: empty array, non-positive scale, or zero
    /// steps requested from a generator
    Configuration(String),
    /// A parameter slice of the wrong length reached a measure pass
    ParameterShape { expected: usize, got: usize },
}

impl std::fmt::Display for EnhanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnhanceError::Configuration(msg) => write!(f, "invalid configuration: {}", msg),
            EnhanceError::ParameterShape { expected, got } => write!(
                f,
                "parameters must have length {}, given slice of length {}",
                expected, got
            ),
        }
    }
}

impl std::error::Error for EnhanceError {}

/// An estimator/measure pair for one enhancement algorithm
///
/// Implementations are plain value types (strategy objects) carrying their
/// own tuning knobs; the multi-scale driver is generic over the trait so the
/// per-voxel measure call is monomorphized.
pub trait SheetnessMethod: Sync {
    /// One streaming pass over the eigenvalue field, producing the measure
    /// parameters for this scale
    ///
    /// When a mask is present, only voxels inside it contribute; the scan is
    /// restricted to the intersection of the mask and volume extents.
    fn estimate(
        &self,
        eigen: &[[f64; 3]],
        dims: (usize, usize, usize),
        mask: Option<&MaskVolume>,
    ) -> Parameters;

    /// Map one ordered eigenvalue triple to a sheetness value
    ///
    /// `lambdas` must be ordered ascending by absolute value,
    /// |lambda1| <= |lambda2| <= |lambda3|.
    fn sheetness(
        &self,
        lambdas: [f64; 3],
        params: &Parameters,
        direction: EnhanceDirection,
    ) -> f64;
}

/// Evaluate a measure over a whole eigenvalue field
///
/// Voxels outside the mask (when given) are set to zero without being
/// evaluated. The parameter slice is validated to have exactly
/// [`PARAMETER_COUNT`] entries before any computation starts.
pub fn measure_volume<M: SheetnessMethod>(
    method: &M,
    eigen: &[[f64; 3]],
    dims: (usize, usize, usize),
    params: &[f64],
    direction: EnhanceDirection,
    mask: Option<&MaskVolume>,
) -> Result<Vec<f64>, EnhanceError> {
    if params.len() != PARAMETER_COUNT {
        return Err(EnhanceError::ParameterShape {
            expected: PARAMETER_COUNT,
            got: params.len(),
        });
    }
    let params = [params[0], params[1], params[2]];
    let (nx, ny, _) = dims;

    let out = (0..eigen.len())
        .into_par_iter()
        .map(|idx| {
            if let Some(m) = mask {
                let x = idx % nx;
                let y = (idx / nx) % ny;
                let z = idx / (nx * ny);
                if !m.is_foreground(x, y, z) {
                    return 0.0;
                }
            }
            method.sheetness(eigen[idx], &params, direction)
        })
        .collect();

    Ok(out)
}
