//! Eigenvalues of the symmetric 3x3 Hessian, ordered by absolute magnitude
//!
//! Uses the closed-form trigonometric solution for the eigenvalues of a real
//! symmetric 3x3 matrix. Only eigenvalues are needed downstream, never
//! eigenvectors.
//!
//! Every consumer of the eigenvalue field in this crate relies on one
//! ordering contract: the triple is sorted ascending by absolute value,
//! |lambda1| <= |lambda2| <= |lambda3|. The sheetness formulas are wrong
//! (silently, not loudly) if handed eigenvalues in any other order.
//!
//! Reference:
//! Smith, O.K. (1961). "Eigenvalues of a symmetric 3x3 matrix."
//! Communications of the ACM 4(4), 168. https://doi.org/10.1145/355578.366316

use std::f64::consts::PI;

use rayon::prelude::*;

use crate::hessian::HessianField;

/// Eigenvalues of the symmetric matrix
///
/// ```text
/// | dxx  dxy  dxz |
/// | dxy  dyy  dyz |
/// | dxz  dyz  dzz |
/// ```
///
/// Returned in no particular order; use [`sort_by_magnitude`] before feeding
/// them to a sheetness measure.
pub fn symmetric_eigenvalues(
    dxx: f64,
    dyy: f64,
    dzz: f64,
    dxy: f64,
    dxz: f64,
    dyz: f64,
) -> [f64; 3] {
    let p1 = dxy * dxy + dxz * dxz + dyz * dyz;
    if p1 == 0.0 {
        // Already diagonal
        return [dxx, dyy, dzz];
    }

    let q = (dxx + dyy + dzz) / 3.0;
    let p2 = (dxx - q) * (dxx - q)
        + (dyy - q) * (dyy - q)
        + (dzz - q) * (dzz - q)
        + 2.0 * p1;
    let p = (p2 / 6.0).sqrt();

    // B = (A - q*I) / p; det(B)/2 lies in [-1, 1] up to rounding
    let b11 = (dxx - q) / p;
    let b22 = (dyy - q) / p;
    let b33 = (dzz - q) / p;
    let b12 = dxy / p;
    let b13 = dxz / p;
    let b23 = dyz / p;

    let det_b = b11 * (b22 * b33 - b23 * b23) - b12 * (b12 * b33 - b23 * b13)
        + b13 * (b12 * b23 - b22 * b13);
    let r = (det_b / 2.0).clamp(-1.0, 1.0);
    let phi = r.acos() / 3.0;

    let e1 = q + 2.0 * p * phi.cos();
    let e3 = q + 2.0 * p * (phi + 2.0 * PI / 3.0).cos();
    let e2 = 3.0 * q - e1 - e3;

    [e1, e2, e3]
}

/// Sort a triple ascending by absolute value
///
/// This establishes the |lambda1| <= |lambda2| <= |lambda3| ordering
/// contract assumed by all measure functions.
#[inline]
pub fn sort_by_magnitude(mut lambdas: [f64; 3]) -> [f64; 3] {
    lambdas.sort_unstable_by(|a, b| {
        a.abs()
            .partial_cmp(&b.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    lambdas
}

/// Decompose a Hessian field into per-voxel ordered eigenvalue triples
///
/// Voxels are independent and processed in parallel. The returned field is
/// index-aligned with the Hessian buffers, each triple ordered ascending by
/// absolute value.
pub fn eigen_field(hessian: &HessianField) -> Vec<[f64; 3]> {
    (0..hessian.len())
        .into_par_iter()
        .map(|i| {
            sort_by_magnitude(symmetric_eigenvalues(
                hessian.dxx[i],
                hessian.dyy[i],
                hessian.dzz[i],
                hessian.dxy[i],
                hessian.dxz[i],
                hessian.dyz[i],
            ))
        })
        .collect()
}
