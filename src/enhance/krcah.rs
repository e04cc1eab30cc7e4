//! Krcah sheetness measure and parameter estimation
//!
//! Femur-oriented bone enhancement from Hessian eigenvalues. The noise
//! cutoff `gamma` is tuned from the average trace of the eigenvalues over
//! the (optionally masked) volume.
//!
//! Two parameter conventions exist and both are kept: the published article
//! and the authors' released implementation disagree by a factor of sqrt(2)
//! on {alpha, beta, gamma} and on whether the trace sums signed or absolute
//! eigenvalues. The discrepancy is historical; neither side is "fixed" here.
//!
//! Reference:
//! Krcah, M., Szekely, G., Blanc, R. (2011). "Fully automatic and fast
//! segmentation of the femur bone from 3D-CT images with no shape prior."
//! IEEE ISBI 2011, 2087-2090. https://doi.org/10.1109/ISBI.2011.5872823

use rayon::prelude::*;

use super::{EnhanceDirection, Parameters, SheetnessMethod, DEGENERATE_EPS};
use crate::utils::{CompensatedSum, MaskVolume};

/// Which of the two historical Krcah parameter conventions to use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KrcahParameterSet {
    /// The authors' released implementation: trace = sum of |lambda_i|,
    /// alpha = beta = gamma = sqrt(2)/2 before trace scaling
    #[default]
    Implementation,
    /// The journal article: trace = signed sum of lambda_i,
    /// alpha = beta = 0.5, gamma = 0.25 before trace scaling
    Journal,
}

/// Krcah sheetness of one ordered eigenvalue triple
///
/// `lambdas` must be ordered ascending by absolute value,
/// |lambda1| <= |lambda2| <= |lambda3|.
///
/// Returns 0 when |lambda2| or |lambda3| is too small to divide by. The
/// result is signed: the factor d*lambda3/|lambda3| makes correctly-signed
/// sheets positive and opposite-signed sheets negative.
pub fn krcah_sheetness(
    lambdas: [f64; 3],
    alpha: f64,
    beta: f64,
    gamma: f64,
    direction: EnhanceDirection,
) -> f64 {
    let [a1, a2, a3] = lambdas;
    let l1 = a1.abs();
    let l2 = a2.abs();
    let l3 = a3.abs();

    // Degenerate voxel
    if l3 < DEGENERATE_EPS || l2 < DEGENERATE_EPS {
        return 0.0;
    }

    // The average Hessian trace is folded into gamma by the estimator
    let r_sheet = l2 / l3;
    let r_noise = l1 + l2 + l3;
    let r_tube = l1 / (l2 * l3);

    let mut sheetness = direction.multiplier() * a3 / l3;
    sheetness *= (-(r_sheet * r_sheet) / (alpha * alpha)).exp();
    sheetness *= (-(r_tube * r_tube) / (beta * beta)).exp();
    sheetness *= 1.0 - (-(r_noise * r_noise) / (gamma * gamma)).exp();

    sheetness
}

/// Estimate Krcah parameters from an eigenvalue field
///
/// One streaming pass accumulating a voxel count and a trace sum; each
/// parallel worker owns a private count and compensated sum over its z-slab,
/// and partials are merged in an O(1) reduce. The trace definition is fixed
/// by `parameter_set` before the pass begins. The scan covers the
/// intersection of the volume and mask extents; masked-out voxels never
/// contribute.
///
/// `gamma` is scaled by the average trace, and is 0 when no voxel qualifies.
pub fn estimate_krcah_parameters(
    eigen: &[[f64; 3]],
    dims: (usize, usize, usize),
    mask: Option<&MaskVolume>,
    parameter_set: KrcahParameterSet,
) -> Parameters {
    let (alpha, beta, base_gamma) = match parameter_set {
        KrcahParameterSet::Implementation => {
            let v = std::f64::consts::SQRT_2 * 0.5;
            (v, v, v)
        }
        KrcahParameterSet::Journal => (0.5, 0.5, 0.25),
    };

    let (count, trace_sum) = match parameter_set {
        KrcahParameterSet::Implementation => {
            accumulate_trace(eigen, dims, mask, |l| l[0].abs() + l[1].abs() + l[2].abs())
        }
        KrcahParameterSet::Journal => accumulate_trace(eigen, dims, mask, |l| l[0] + l[1] + l[2]),
    };

    let gamma = if count > 0 {
        base_gamma * (trace_sum / count as f64)
    } else {
        0.0
    };

    [alpha, beta, gamma]
}

/// Count eligible voxels and accumulate their trace with compensated sums
///
/// The trace definition is monomorphized per call site, so the inner loop
/// carries no per-voxel indirect dispatch.
fn accumulate_trace<F>(
    eigen: &[[f64; 3]],
    dims: (usize, usize, usize),
    mask: Option<&MaskVolume>,
    trace: F,
) -> (u64, f64)
where
    F: Fn([f64; 3]) -> f64 + Sync,
{
    let (nx, ny, nz) = dims;

    let (sx, sy, sz) = match mask {
        Some(m) => {
            let (mx, my, mz) = m.dims();
            (nx.min(mx), ny.min(my), nz.min(mz))
        }
        None => (nx, ny, nz),
    };

    let (count, sum) = (0..sz)
        .into_par_iter()
        .map(|z| {
            let mut count = 0u64;
            let mut sum = CompensatedSum::default();
            for y in 0..sy {
                for x in 0..sx {
                    if let Some(m) = mask {
                        if !m.is_foreground(x, y, z) {
                            continue;
                        }
                    }
                    count += 1;
                    sum.add(trace(eigen[x + y * nx + z * nx * ny]));
                }
            }
            (count, sum)
        })
        .reduce(
            || (0u64, CompensatedSum::default()),
            |(ca, mut sa), (cb, sb)| {
                sa.merge(sb);
                (ca + cb, sa)
            },
        );

    (count, sum.value())
}

/// Krcah estimator/measure pair
#[derive(Clone, Copy, Debug, Default)]
pub struct Krcah {
    /// Which historical parameter convention the estimator follows
    pub parameter_set: KrcahParameterSet,
}

impl SheetnessMethod for Krcah {
    fn estimate(
        &self,
        eigen: &[[f64; 3]],
        dims: (usize, usize, usize),
        mask: Option<&MaskVolume>,
    ) -> Parameters {
        estimate_krcah_parameters(eigen, dims, mask, self.parameter_set)
    }

    fn sheetness(
        &self,
        lambdas: [f64; 3],
        params: &Parameters,
        direction: EnhanceDirection,
    ) -> f64 {
        krcah_sheetness(lambdas, params[0], params[1], params[2], direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance::EnhanceDirection::{Bright, Dark};

    #[test]
    fn test_zero_eigenvalues_zero_measure() {
        assert_eq!(krcah_sheetness([0.0, 0.0, 0.0], 0.5, 0.5, 0.25, Bright), 0.0);
    }

    #[test]
    fn test_near_zero_lambda2_zero_measure() {
        assert_eq!(krcah_sheetness([0.0, 0.0, 1.0], 0.5, 0.5, 0.25, Bright), 0.0);
    }

    #[test]
    fn test_lambda1_zero_reference_values() {
        let s = krcah_sheetness([0.0, 1.0, 1.0], 0.5, 0.5, 0.25, Bright);
        assert!((s - (-0.0183156368276)).abs() < 1e-6, "got {}", s);

        let s = krcah_sheetness([0.0, 1.0, 1.0], 0.5, 0.5, 0.25, Dark);
        assert!((s - 0.0183156368276).abs() < 1e-6, "got {}", s);
    }

    #[test]
    fn test_ones_reference_values() {
        let s = krcah_sheetness([1.0, 1.0, 1.0], 0.5, 0.5, 0.25, Bright);
        assert!((s - (-0.000335462627903)).abs() < 1e-6, "got {}", s);

        let s = krcah_sheetness([1.0, 1.0, 1.0], 0.5, 0.5, 0.25, Dark);
        assert!((s - 0.000335462627903).abs() < 1e-6, "got {}", s);

        // Negated triple flips the sign through a3/|a3|
        let s = krcah_sheetness([-1.0, -1.0, -1.0], 0.5, 0.5, 0.25, Bright);
        assert!((s - 0.000335462627903).abs() < 1e-6, "got {}", s);

        let s = krcah_sheetness([-1.0, -1.0, -1.0], 0.5, 0.5, 0.25, Dark);
        assert!((s - (-0.000335462627903)).abs() < 1e-6, "got {}", s);
    }

    #[test]
    fn test_estimation_implementation_mode() {
        // Uniform (1,1,1): average |trace| = 3,
        // alpha = beta = sqrt(2)/2, gamma = sqrt(2)/2 * 3
        let n = 5;
        let eigen = vec![[1.0, 1.0, 1.0]; n * n * n];
        let p =
            estimate_krcah_parameters(&eigen, (n, n, n), None, KrcahParameterSet::Implementation);
        assert!((p[0] - 0.70710678118654757).abs() < 1e-12);
        assert!((p[1] - 0.70710678118654757).abs() < 1e-12);
        assert!((p[2] - 2.12132034356).abs() < 1e-6, "gamma = {}", p[2]);
    }

    #[test]
    fn test_estimation_journal_mode() {
        let n = 4;
        let eigen = vec![[1.0, 1.0, 1.0]; n * n * n];
        let p = estimate_krcah_parameters(&eigen, (n, n, n), None, KrcahParameterSet::Journal);
        assert_eq!(p[0], 0.5);
        assert_eq!(p[1], 0.5);
        assert!((p[2] - 0.75).abs() < 1e-12, "gamma = {}", p[2]);
    }

    #[test]
    fn test_journal_mode_signed_trace_cancels() {
        // Signed trace of (-1, -1, 2) is 0; implementation trace is 4
        let eigen = vec![[-1.0, -1.0, 2.0]; 8];
        let p = estimate_krcah_parameters(&eigen, (2, 2, 2), None, KrcahParameterSet::Journal);
        assert!(p[2].abs() < 1e-12, "gamma = {}", p[2]);

        let p =
            estimate_krcah_parameters(&eigen, (2, 2, 2), None, KrcahParameterSet::Implementation);
        let expected = std::f64::consts::SQRT_2 * 0.5 * 4.0;
        assert!((p[2] - expected).abs() < 1e-12, "gamma = {}", p[2]);
    }

    #[test]
    fn test_estimation_fully_masked() {
        let eigen = vec![[1.0, 1.0, 1.0]; 8];
        let mask = MaskVolume::new(vec![0; 8], (2, 2, 2));
        let p = estimate_krcah_parameters(
            &eigen,
            (2, 2, 2),
            Some(&mask),
            KrcahParameterSet::Implementation,
        );
        assert_eq!(p[2], 0.0);
        assert!((p[0] - 0.70710678118654757).abs() < 1e-12);
    }

    #[test]
    fn test_estimation_mask_excludes_voxels() {
        // Half the volume holds huge traces but is masked away
        let mut eigen = vec![[1.0, 1.0, 1.0]; 8];
        for e in eigen.iter_mut().take(4) {
            *e = [1000.0, 1000.0, 1000.0];
        }
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let mask = MaskVolume::new(labels, (2, 2, 2));
        let p = estimate_krcah_parameters(
            &eigen,
            (2, 2, 2),
            Some(&mask),
            KrcahParameterSet::Implementation,
        );
        assert!((p[2] - 2.12132034356).abs() < 1e-6, "gamma = {}", p[2]);
    }

    #[test]
    fn test_estimation_chunk_order_independent() {
        let n = 4;
        let eigen: Vec<[f64; 3]> = (0..n * n * n)
            .map(|i| {
                let v = ((i * 17) % 7) as f64 * 0.5 - 1.0;
                [v * 0.2, v, v * 1.5]
            })
            .collect();

        let p_whole =
            estimate_krcah_parameters(&eigen, (n, n, n), None, KrcahParameterSet::Implementation);

        // Manual split along z, partials merged by hand
        let plane = n * n;
        let (c1, t1) = super::accumulate_trace(&eigen[..plane], (n, n, 1), None, |l| {
            l[0].abs() + l[1].abs() + l[2].abs()
        });
        let (c2, t2) = super::accumulate_trace(&eigen[plane..], (n, n, 3), None, |l| {
            l[0].abs() + l[1].abs() + l[2].abs()
        });
        let merged_gamma = std::f64::consts::SQRT_2 * 0.5 * ((t1 + t2) / (c1 + c2) as f64);

        assert!(
            (p_whole[2] - merged_gamma).abs() < 1e-9,
            "{} vs {}",
            p_whole[2],
            merged_gamma
        );
    }
}
