//! Mask volumes for restricting enhancement to a region of interest
//!
//! A [`MaskVolume`] is a label image co-registered with the volume being
//! filtered: a voxel participates in parameter estimation and receives a
//! nonzero measure only when its label differs from the configured background
//! value (default 0). Geometric masks (e.g. spheres, or an arbitrary
//! predicate over physical coordinates) are rasterized into the same
//! representation so every consumer sees one boolean-per-voxel test.
//!
//! The mask extent may be smaller than the volume extent; voxels beyond the
//! mask extent are treated as background.

/// Binary/label mask over a 3D voxel grid
///
/// Uses Fortran (column-major) ordering to match NIfTI convention:
/// index = x + y*nx + z*nx*ny.
#[derive(Clone, Debug)]
pub struct MaskVolume {
    data: Vec<u8>,
    dims: (usize, usize, usize),
    background: u8,
}

impl MaskVolume {
    /// Wrap an existing label image, with background value 0
    ///
    /// # Panics
    /// Panics if `data.len()` does not match `dims`.
    pub fn new(data: Vec<u8>, dims: (usize, usize, usize)) -> Self {
        assert_eq!(
            data.len(),
            dims.0 * dims.1 * dims.2,
            "mask data length does not match dimensions"
        );
        Self {
            data,
            dims,
            background: 0,
        }
    }

    /// Change which label value counts as background
    pub fn with_background(mut self, background: u8) -> Self {
        self.background = background;
        self
    }

    /// Mask dimensions (nx, ny, nz)
    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    /// The label value treated as outside the mask
    pub fn background(&self) -> u8 {
        self.background
    }

    /// Raw label data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True when the voxel at (x, y, z) is inside the mask
    ///
    /// Coordinates beyond the mask extent are outside.
    #[inline]
    pub fn is_foreground(&self, x: usize, y: usize, z: usize) -> bool {
        let (nx, ny, nz) = self.dims;
        if x >= nx || y >= ny || z >= nz {
            return false;
        }
        self.data[x + y * nx + z * nx * ny] != self.background
    }

    /// Rasterize a predicate over physical coordinates into a mask
    ///
    /// The predicate receives the physical position (mm) of each voxel
    /// center, computed from `voxel_size`. Voxels where the predicate holds
    /// become foreground (label 1).
    pub fn from_predicate<F>(
        dims: (usize, usize, usize),
        voxel_size: (f64, f64, f64),
        predicate: F,
    ) -> Self
    where
        F: Fn(f64, f64, f64) -> bool,
    {
        let (nx, ny, nz) = dims;
        let (vsx, vsy, vsz) = voxel_size;
        let mut data = vec![0u8; nx * ny * nz];

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    if predicate(i as f64 * vsx, j as f64 * vsy, k as f64 * vsz) {
                        data[i + j * nx + k * nx * ny] = 1;
                    }
                }
            }
        }

        Self {
            data,
            dims,
            background: 0,
        }
    }

    /// Create a binary sphere mask
    ///
    /// Voxels within `radius` (in voxel units) of the center are foreground.
    ///
    /// # Arguments
    /// * `dims` - Volume dimensions (nx, ny, nz)
    /// * `center` - Sphere center in voxel coordinates
    /// * `radius` - Sphere radius in voxels
    pub fn sphere(dims: (usize, usize, usize), center: (f64, f64, f64), radius: f64) -> Self {
        let (cx, cy, cz) = center;
        let r2 = radius * radius;
        Self::from_predicate(dims, (1.0, 1.0, 1.0), |x, y, z| {
            let dx = x - cx;
            let dy = y - cy;
            let dz = z - cz;
            dx * dx + dy * dy + dz * dz <= r2
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_mask_basic() {
        let mask = MaskVolume::sphere((10, 10, 10), (5.0, 5.0, 5.0), 3.0);

        // Center voxel inside, corner outside
        assert!(mask.is_foreground(5, 5, 5));
        assert!(!mask.is_foreground(0, 0, 0));

        let count: usize = mask.data().iter().map(|&m| m as usize).sum();
        assert!(
            count > 50 && count < 200,
            "sphere voxel count {} seems wrong",
            count
        );
    }

    #[test]
    fn test_out_of_extent_is_background() {
        let mask = MaskVolume::new(vec![1; 8], (2, 2, 2));
        assert!(mask.is_foreground(1, 1, 1));
        assert!(!mask.is_foreground(2, 0, 0));
        assert!(!mask.is_foreground(0, 5, 0));
    }

    #[test]
    fn test_background_value() {
        let data = vec![3, 3, 7, 3, 3, 3, 3, 3];
        let mask = MaskVolume::new(data, (2, 2, 2)).with_background(3);
        assert!(!mask.is_foreground(0, 0, 0));
        assert!(mask.is_foreground(0, 1, 0)); // label 7 at index 2
    }

    #[test]
    fn test_from_predicate_physical_units() {
        // Half-space x >= 4 mm with 2 mm voxels: columns 2 and 3
        let mask = MaskVolume::from_predicate((4, 2, 2), (2.0, 1.0, 1.0), |x, _, _| x >= 4.0);
        assert!(!mask.is_foreground(1, 0, 0));
        assert!(mask.is_foreground(2, 0, 0));
        assert!(mask.is_foreground(3, 1, 1));
    }
}
