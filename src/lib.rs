//! Bone-Core: multi-scale Hessian bone enhancement for 3D medical images
//!
//! This crate enhances sheet-like structures (cortical bone) in 3D scalar
//! volumes using eigenvalues of the local Hessian matrix over many smoothing
//! scales. Both published bone-enhancement measures are provided, each with
//! its automatic parameter-estimation pass, plus the multi-scale driver that
//! keeps the strongest response (in an absolute sense) across scales.
//!
//! # Modules
//! - `hessian`: Gaussian smoothing and scale-normalized Hessian fields
//! - `eigen`: symmetric 3x3 eigenvalues, ordered by absolute magnitude
//! - `enhance`: Descoteaux and Krcah measures, parameter estimation,
//!   unsharp-mask preprocessing, and the multi-scale orchestrator
//! - `utils`: mask volumes and compensated summation
//! - `nifti_io`: NIfTI load/save for the CLI tools
//!
//! Volumes are flat `Vec<f64>` buffers in Fortran (column-major) order,
//! index = x + y*nx + z*nx*ny, with explicit (nx, ny, nz) dimensions and
//! voxel sizes in mm.

pub mod eigen;
pub mod enhance;
pub mod hessian;
pub mod utils;

// I/O modules
pub mod nifti_io;
