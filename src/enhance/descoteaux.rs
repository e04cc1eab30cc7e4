//! Descoteaux sheetness measure and parameter estimation
//!
//! Enhances sheet-like structures (cortical bone) from the eigenvalues of
//! the scale-normalized Hessian. The noise cutoff `c` is tuned automatically
//! from the maximum Frobenius norm of the eigenvalues over the (optionally
//! masked) volume.
//!
//! Reference:
//! Descoteaux, M., Audette, M., Chinzei, K., Siddiqi, K. (2006).
//! "Bone enhancement filtering: application to sinus bone segmentation and
//! simulation of pituitary surgery." Computer Aided Surgery 11(5), 247-255.
//! https://doi.org/10.3109/10929080600997615

use rayon::prelude::*;

use super::{EnhanceDirection, Parameters, SheetnessMethod, DEGENERATE_EPS};
use crate::utils::MaskVolume;

/// Default weight applied to the maximum Frobenius norm when deriving `c`
pub const DEFAULT_FROBENIUS_NORM_WEIGHT: f64 = 0.5;

/// Descoteaux sheetness of one ordered eigenvalue triple
///
/// `lambdas` must be ordered ascending by absolute value,
/// |lambda1| <= |lambda2| <= |lambda3|.
///
/// Returns 0 when the dominant eigenvalue has the wrong sign for the
/// requested direction, or when |lambda3| is too small to divide by.
pub fn descoteaux_sheetness(
    lambdas: [f64; 3],
    alpha: f64,
    beta: f64,
    c: f64,
    direction: EnhanceDirection,
) -> f64 {
    let [a1, a2, a3] = lambdas;
    let l1 = a1.abs();
    let l2 = a2.abs();
    let l3 = a3.abs();

    // Wrong-signed dominant eigenvalue
    if direction.multiplier() * a3 < 0.0 {
        return 0.0;
    }

    // Degenerate voxel
    if l3 < DEGENERATE_EPS {
        return 0.0;
    }

    let r_sheet = l2 / l3;
    let r_blob = (2.0 * l3 - l2 - l1).abs() / l3;
    let r_noise = (l1 * l1 + l2 * l2 + l3 * l3).sqrt();

    let mut sheetness = 1.0;
    sheetness *= (-(r_sheet * r_sheet) / (2.0 * alpha * alpha)).exp();
    sheetness *= 1.0 - (-(r_blob * r_blob) / (2.0 * beta * beta)).exp();
    sheetness *= 1.0 - (-(r_noise * r_noise) / (2.0 * c * c)).exp();

    sheetness
}

/// Frobenius norm of an eigenvalue triple, sqrt(sum of squares)
///
/// Equal to the Frobenius norm of the symmetric matrix the triple came from.
#[inline]
fn frobenius_norm(lambdas: [f64; 3]) -> f64 {
    lambdas.iter().map(|l| l * l).sum::<f64>().sqrt()
}

/// Estimate Descoteaux parameters from an eigenvalue field
///
/// One streaming pass accumulating the maximum Frobenius norm; each parallel
/// worker owns a private maximum over its z-slab, and the partials are
/// reduced with `max`. The scan covers the intersection of the volume and
/// mask extents; masked-out voxels never contribute.
///
/// Returns {0.5, 0.5, weight * max norm}; `c` is 0 when no voxel qualifies.
pub fn estimate_descoteaux_parameters(
    eigen: &[[f64; 3]],
    dims: (usize, usize, usize),
    mask: Option<&MaskVolume>,
    frobenius_norm_weight: f64,
) -> Parameters {
    let (nx, ny, nz) = dims;

    // Only the intersection of the mask and volume extents is visited
    let (sx, sy, sz) = match mask {
        Some(m) => {
            let (mx, my, mz) = m.dims();
            (nx.min(mx), ny.min(my), nz.min(mz))
        }
        None => (nx, ny, nz),
    };

    let max_norm = (0..sz)
        .into_par_iter()
        .map(|z| {
            let mut chunk_max = 0.0f64;
            for y in 0..sy {
                for x in 0..sx {
                    if let Some(m) = mask {
                        if !m.is_foreground(x, y, z) {
                            continue;
                        }
                    }
                    let norm = frobenius_norm(eigen[x + y * nx + z * nx * ny]);
                    chunk_max = chunk_max.max(norm);
                }
            }
            chunk_max
        })
        .reduce(|| 0.0, f64::max);

    let mut c = 0.0;
    if max_norm > 0.0 {
        c = frobenius_norm_weight * max_norm;
    }

    [0.5, 0.5, c]
}

/// Descoteaux estimator/measure pair
#[derive(Clone, Copy, Debug)]
pub struct Descoteaux {
    /// Weight applied to the maximum Frobenius norm when deriving `c`
    pub frobenius_norm_weight: f64,
}

impl Default for Descoteaux {
    fn default() -> Self {
        Self {
            frobenius_norm_weight: DEFAULT_FROBENIUS_NORM_WEIGHT,
        }
    }
}

impl SheetnessMethod for Descoteaux {
    fn estimate(
        &self,
        eigen: &[[f64; 3]],
        dims: (usize, usize, usize),
        mask: Option<&MaskVolume>,
    ) -> Parameters {
        estimate_descoteaux_parameters(eigen, dims, mask, self.frobenius_norm_weight)
    }

    fn sheetness(
        &self,
        lambdas: [f64; 3],
        params: &Parameters,
        direction: EnhanceDirection,
    ) -> f64 {
        descoteaux_sheetness(lambdas, params[0], params[1], params[2], direction)
    }
}
