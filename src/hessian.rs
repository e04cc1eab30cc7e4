//! Gaussian smoothing and Hessian computation for 3D volumes
//!
//! Produces, per voxel, the six independent components of the symmetric 3x3
//! matrix of second spatial derivatives at a given smoothing scale sigma.
//! Sigma is given in physical units (mm); voxel spacing converts it to voxel
//! units per axis, and derivatives are taken with respect to physical
//! distance so anisotropic voxels are handled correctly.
//!
//! The Hessian is scale-normalized by sigma^2 so that responses are
//! comparable across scales (gamma-normalized derivatives with gamma = 2).
//!
//! Reference:
//! Lindeberg, T. (1998). "Feature detection with automatic scale selection."
//! International Journal of Computer Vision 30(2), 79-116.
//! https://doi.org/10.1023/A:1008045108935

use rayon::prelude::*;

/// Axis of a separable pass over a volume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Axis {
    X,
    Y,
    Z,
}

/// Six independent components of the symmetric Hessian, one value per voxel
///
/// All buffers use Fortran ordering: index = x + y*nx + z*nx*ny. The field
/// is scoped to a single scale iteration; callers drop it as soon as the
/// eigenvalues have been extracted to bound peak memory.
pub struct HessianField {
    pub dxx: Vec<f64>,
    pub dyy: Vec<f64>,
    pub dzz: Vec<f64>,
    pub dxy: Vec<f64>,
    pub dxz: Vec<f64>,
    pub dyz: Vec<f64>,
}

impl HessianField {
    /// Number of voxels in the field
    pub fn len(&self) -> usize {
        self.dxx.len()
    }

    /// True when the field holds no voxels
    pub fn is_empty(&self) -> bool {
        self.dxx.is_empty()
    }
}

/// Build a normalized 1D Gaussian kernel for a sigma given in voxel units
///
/// Kernel radius is ceil(3*sigma), covering >99.7% of the Gaussian mass.
fn gaussian_kernel(sigma_vox: f64) -> Vec<f64> {
    let radius = (3.0 * sigma_vox).ceil() as usize;
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f64; size];

    let mut sum = 0.0;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f64 - radius as f64;
        *k = (-x * x / (2.0 * sigma_vox * sigma_vox)).exp();
        sum += *k;
    }
    for k in kernel.iter_mut() {
        *k /= sum;
    }

    kernel
}

/// Convolve along one axis with replicate (clamp) boundary handling
///
/// Output z-planes are independent, so they are filled by parallel workers
/// writing disjoint ranges.
fn convolve_axis(
    data: &[f64],
    dims: (usize, usize, usize),
    kernel: &[f64],
    axis: Axis,
) -> Vec<f64> {
    let (nx, ny, nz) = dims;
    let radius = (kernel.len() - 1) / 2;
    let mut out = vec![0.0f64; nx * ny * nz];

    out.par_chunks_mut(nx * ny).enumerate().for_each(|(k, plane)| {
        for j in 0..ny {
            for i in 0..nx {
                let mut sum = 0.0;
                for (ki, &w) in kernel.iter().enumerate() {
                    let offset = ki as isize - radius as isize;
                    let (si, sj, sk) = match axis {
                        Axis::X => (clamp(i as isize + offset, nx), j, k),
                        Axis::Y => (i, clamp(j as isize + offset, ny), k),
                        Axis::Z => (i, j, clamp(k as isize + offset, nz)),
                    };
                    sum += data[si + sj * nx + sk * nx * ny] * w;
                }
                plane[i + j * nx] = sum;
            }
        }
    });

    out
}

#[inline]
fn clamp(v: isize, n: usize) -> usize {
    v.max(0).min(n as isize - 1) as usize
}

/// Smooth a volume with an isotropic Gaussian of physical width `sigma` (mm)
///
/// Applied as three separable 1D convolutions; the per-axis kernel width is
/// sigma divided by that axis' voxel size. A non-positive sigma returns the
/// input unchanged.
pub fn gaussian_smooth(
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    sigma: f64,
) -> Vec<f64> {
    if sigma <= 0.0 {
        return data.to_vec();
    }
    let (vsx, vsy, vsz) = voxel_size;

    let kx = gaussian_kernel(sigma / vsx);
    let ky = gaussian_kernel(sigma / vsy);
    let kz = gaussian_kernel(sigma / vsz);

    let sx = convolve_axis(data, dims, &kx, Axis::X);
    let sxy = convolve_axis(&sx, dims, &ky, Axis::Y);
    drop(sx);
    convolve_axis(&sxy, dims, &kz, Axis::Z)
}

/// First derivative along one axis, in physical units (per mm)
///
/// Central differences in the interior, one-sided at the boundary. An axis
/// with fewer than two samples yields all zeros.
pub(crate) fn derivative_axis(
    data: &[f64],
    dims: (usize, usize, usize),
    spacing: f64,
    axis: Axis,
) -> Vec<f64> {
    let (nx, ny, nz) = dims;
    let len = match axis {
        Axis::X => nx,
        Axis::Y => ny,
        Axis::Z => nz,
    };
    if len < 2 {
        return vec![0.0; nx * ny * nz];
    }

    let mut out = vec![0.0f64; nx * ny * nz];
    let h = 1.0 / spacing;
    let stride = match axis {
        Axis::X => 1,
        Axis::Y => nx,
        Axis::Z => nx * ny,
    };

    out.par_chunks_mut(nx * ny).enumerate().for_each(|(k, plane)| {
        for j in 0..ny {
            for i in 0..nx {
                let pos = match axis {
                    Axis::X => i,
                    Axis::Y => j,
                    Axis::Z => k,
                };
                let idx = i + j * nx + k * nx * ny;
                let d = if pos == 0 {
                    (data[idx + stride] - data[idx]) * h
                } else if pos == len - 1 {
                    (data[idx] - data[idx - stride]) * h
                } else {
                    (data[idx + stride] - data[idx - stride]) * 0.5 * h
                };
                plane[i + j * nx] = d;
            }
        }
    });

    out
}

/// Compute the scale-normalized Hessian field at smoothing scale `sigma` (mm)
///
/// The volume is first smoothed with a Gaussian of width sigma, then second
/// and cross derivatives are formed by repeated first differences in
/// physical units, and finally every component is multiplied by sigma^2 for
/// scale normalization.
pub fn hessian_field(
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    sigma: f64,
) -> HessianField {
    let (vsx, vsy, vsz) = voxel_size;

    let smoothed = gaussian_smooth(data, dims, voxel_size, sigma);

    let dx = derivative_axis(&smoothed, dims, vsx, Axis::X);
    let dy = derivative_axis(&smoothed, dims, vsy, Axis::Y);
    let dz = derivative_axis(&smoothed, dims, vsz, Axis::Z);
    drop(smoothed);

    let mut dxx = derivative_axis(&dx, dims, vsx, Axis::X);
    let mut dxy = derivative_axis(&dx, dims, vsy, Axis::Y);
    let mut dxz = derivative_axis(&dx, dims, vsz, Axis::Z);
    drop(dx);
    let mut dyy = derivative_axis(&dy, dims, vsy, Axis::Y);
    let mut dyz = derivative_axis(&dy, dims, vsz, Axis::Z);
    drop(dy);
    let mut dzz = derivative_axis(&dz, dims, vsz, Axis::Z);
    drop(dz);

    let s2 = sigma * sigma;
    for buf in [&mut dxx, &mut dyy, &mut dzz, &mut dxy, &mut dxz, &mut dyz] {
        for v in buf.iter_mut() {
            *v *= s2;
        }
    }

    HessianField {
        dxx,
        dyy,
        dzz,
        dxy,
        dxz,
        dyz,
    }
}
