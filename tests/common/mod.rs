//! Common test utilities for bone-core integration tests

/// Fortran-order flat index
pub fn idx(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// Synthetic volume with a bright sheet of given half-thickness
///
/// The sheet is a Gaussian profile perpendicular to z, centered on the
/// middle z-plane, with a broad in-plane envelope so the sheet has finite
/// extent (a perfectly infinite sheet has lambda2 exactly zero, which the
/// Krcah measure rejects as degenerate). One strongly dominant second
/// derivative across the sheet, two weak ones in-plane.
pub fn bright_sheet_phantom(n: usize, sheet_sigma: f64) -> Vec<f64> {
    let mut data = vec![0.0; n * n * n];
    let c = n as f64 / 2.0;
    let env_sigma = n as f64 / 3.0;
    for k in 0..n {
        let dz = k as f64 - c;
        let profile = (-dz * dz / (2.0 * sheet_sigma * sheet_sigma)).exp();
        for j in 0..n {
            for i in 0..n {
                let dx = i as f64 - c;
                let dy = j as f64 - c;
                let envelope = (-(dx * dx + dy * dy) / (2.0 * env_sigma * env_sigma)).exp();
                data[idx(i, j, k, n, n)] = profile * envelope;
            }
        }
    }
    data
}

/// Mean of the values at the central z-plane vs. a plane far from the sheet
///
/// Returns (on_sheet_mean, off_sheet_mean), skipping a boundary margin in
/// x and y to stay clear of edge effects.
pub fn sheet_contrast(volume: &[f64], n: usize, margin: usize) -> (f64, f64) {
    let center_k = n / 2;
    let far_k = margin;
    let mut on_sum = 0.0;
    let mut off_sum = 0.0;
    let mut count = 0usize;
    for j in margin..n - margin {
        for i in margin..n - margin {
            on_sum += volume[idx(i, j, center_k, n, n)];
            off_sum += volume[idx(i, j, far_k, n, n)];
            count += 1;
        }
    }
    (on_sum / count as f64, off_sum / count as f64)
}
