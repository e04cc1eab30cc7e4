//! End-to-end tests of the multi-scale enhancement pipelines on synthetic
//! phantoms

mod common;

use bone_core::enhance::{
    descoteaux_enhancement, equispaced_sigma_array, krcah_enhancement, multiscale_enhancement,
    Descoteaux, DescoteauxParams, EnhanceDirection, EnhanceError, Krcah, KrcahParams,
};
use bone_core::nifti_io::{affine_from_voxel_size, load_nifti, save_nifti_gz};
use bone_core::utils::MaskVolume;

use common::{bright_sheet_phantom, idx, sheet_contrast};

#[test]
fn descoteaux_detects_bright_sheet() {
    let n = 24;
    let data = bright_sheet_phantom(n, 1.0);

    let params = DescoteauxParams {
        sigmas: vec![1.0, 2.0],
        direction: EnhanceDirection::Bright,
        ..Default::default()
    };
    let out = descoteaux_enhancement(&data, (n, n, n), (1.0, 1.0, 1.0), &params, None).unwrap();

    assert_eq!(out.len(), n * n * n);
    assert!(out.iter().all(|v| v.is_finite()));

    let (on_sheet, off_sheet) = sheet_contrast(&out, n, 6);
    assert!(
        on_sheet > 5.0 * off_sheet.max(1e-6),
        "sheet response {} should dominate background {}",
        on_sheet,
        off_sheet
    );
}

#[test]
fn descoteaux_dark_mode_ignores_bright_sheet() {
    let n = 20;
    let data = bright_sheet_phantom(n, 1.0);

    let bright = DescoteauxParams {
        sigmas: vec![1.0],
        direction: EnhanceDirection::Bright,
        ..Default::default()
    };
    let dark = DescoteauxParams {
        sigmas: vec![1.0],
        direction: EnhanceDirection::Dark,
        ..Default::default()
    };
    let out_bright =
        descoteaux_enhancement(&data, (n, n, n), (1.0, 1.0, 1.0), &bright, None).unwrap();
    let out_dark = descoteaux_enhancement(&data, (n, n, n), (1.0, 1.0, 1.0), &dark, None).unwrap();

    let center = idx(n / 2, n / 2, n / 2, n, n);
    assert!(out_bright[center] > 0.1, "bright: {}", out_bright[center]);
    assert_eq!(out_dark[center], 0.0, "dark mode must reject the sheet");
}

#[test]
fn krcah_pipeline_runs_with_preprocessing() {
    let n = 20;
    let data: Vec<f64> = bright_sheet_phantom(n, 1.0)
        .iter()
        .map(|v| v * 1000.0)
        .collect();

    let params = KrcahParams {
        sigmas: vec![1.0, 2.0],
        ..Default::default()
    };
    let result = krcah_enhancement(&data, (n, n, n), (1.0, 1.0, 1.0), &params, None).unwrap();

    let preprocessed = result.preprocessed.as_ref().unwrap();
    assert_eq!(preprocessed.len(), n * n * n);
    assert!(preprocessed.iter().all(|v| v.is_finite()));
    assert!(result.enhancement.iter().all(|v| v.is_finite()));

    // The signed measure goes positive on the bright sheet
    let (on_sheet, _) = sheet_contrast(&result.enhancement, n, 6);
    assert!(on_sheet > 0.0, "sheet response {}", on_sheet);
}

#[test]
fn krcah_without_preprocessing_has_no_preprocessed_output() {
    let n = 12;
    let data = bright_sheet_phantom(n, 1.0);
    let params = KrcahParams {
        sigmas: vec![1.0],
        preprocess: false,
        ..Default::default()
    };
    let result = krcah_enhancement(&data, (n, n, n), (1.0, 1.0, 1.0), &params, None).unwrap();
    assert!(result.preprocessed.is_none());
}

#[test]
fn masked_voxels_are_exactly_zero() {
    let n = 16;
    let data = bright_sheet_phantom(n, 1.0);

    // Mask away half of the volume along x
    let labels: Vec<u8> = (0..n * n * n)
        .map(|flat| if flat % n < n / 2 { 1 } else { 0 })
        .collect();
    let mask = MaskVolume::new(labels, (n, n, n));

    let out = multiscale_enhancement(
        &data,
        (n, n, n),
        (1.0, 1.0, 1.0),
        &[1.0],
        &Descoteaux::default(),
        EnhanceDirection::Bright,
        Some(&mask),
    )
    .unwrap();

    let mut masked_all_zero = true;
    let mut inside_has_signal = false;
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let v = out[idx(i, j, k, n, n)];
                if i < n / 2 {
                    inside_has_signal |= v != 0.0;
                } else {
                    masked_all_zero &= v == 0.0;
                }
            }
        }
    }
    assert!(masked_all_zero, "voxels outside the mask must be zero");
    assert!(inside_has_signal, "voxels inside the mask should respond");
}

#[test]
fn mask_changes_estimated_parameters_not_just_output() {
    // A tiny mask that excludes the sheet leaves only weak eigenvalues for
    // estimation, so c differs from the unmasked run
    let n = 16;
    let data = bright_sheet_phantom(n, 1.0);

    let eigen_region_mask = MaskVolume::sphere((n, n, n), (2.0, 2.0, 2.0), 2.0);

    let method = Descoteaux::default();
    let unmasked = multiscale_enhancement(
        &data,
        (n, n, n),
        (1.0, 1.0, 1.0),
        &[1.0],
        &method,
        EnhanceDirection::Bright,
        None,
    )
    .unwrap();
    let masked = multiscale_enhancement(
        &data,
        (n, n, n),
        (1.0, 1.0, 1.0),
        &[1.0],
        &method,
        EnhanceDirection::Bright,
        Some(&eigen_region_mask),
    )
    .unwrap();

    assert_ne!(unmasked, masked);
}

#[test]
fn multi_scale_response_at_least_single_scale() {
    // Adding scales can only increase per-voxel |response|
    let n = 16;
    let data = bright_sheet_phantom(n, 1.5);
    let method = Krcah::default();

    let single = multiscale_enhancement(
        &data,
        (n, n, n),
        (1.0, 1.0, 1.0),
        &[1.0],
        &method,
        EnhanceDirection::Bright,
        None,
    )
    .unwrap();
    let multi = multiscale_enhancement(
        &data,
        (n, n, n),
        (1.0, 1.0, 1.0),
        &[1.0, 2.0, 3.0],
        &method,
        EnhanceDirection::Bright,
        None,
    )
    .unwrap();

    for (m, s) in multi.iter().zip(single.iter()) {
        assert!(m.abs() + 1e-12 >= s.abs(), "{} < {}", m, s);
    }
}

#[test]
fn generated_sigma_arrays_drive_the_pipeline() {
    let n = 12;
    let data = bright_sheet_phantom(n, 1.0);
    let sigmas = equispaced_sigma_array(1.0, 2.0, 3).unwrap();
    let out = multiscale_enhancement(
        &data,
        (n, n, n),
        (1.0, 1.0, 1.0),
        &sigmas,
        &Descoteaux::default(),
        EnhanceDirection::Bright,
        None,
    )
    .unwrap();
    assert_eq!(out.len(), n * n * n);
}

#[test]
fn empty_sigma_array_is_a_configuration_error() {
    let data = vec![0.0; 27];
    let err = multiscale_enhancement(
        &data,
        (3, 3, 3),
        (1.0, 1.0, 1.0),
        &[],
        &Krcah::default(),
        EnhanceDirection::Bright,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, EnhanceError::Configuration(_)));
}

#[test]
fn enhancement_survives_nifti_round_trip() {
    let n = 10;
    let data = bright_sheet_phantom(n, 1.0);
    let params = DescoteauxParams {
        sigmas: vec![1.0],
        ..Default::default()
    };
    let out = descoteaux_enhancement(&data, (n, n, n), (1.0, 1.0, 1.0), &params, None).unwrap();

    let affine = affine_from_voxel_size((1.0, 1.0, 1.0));
    let bytes = save_nifti_gz(&out, (n, n, n), (1.0, 1.0, 1.0), &affine).unwrap();
    let loaded = load_nifti(&bytes).unwrap();

    assert_eq!(loaded.dims, (n, n, n));
    for (&a, &b) in loaded.data.iter().zip(out.iter()) {
        assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
    }
}
