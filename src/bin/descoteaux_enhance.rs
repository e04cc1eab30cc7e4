//! Descoteaux sheetness enhancement CLI
//!
//! Usage: descoteaux_enhance <input> <outputMeasure> <enhanceBright:0|1>
//!        <numSigma> <sigma1> [sigma2 sigma3 ...]

use std::path::Path;
use std::process::ExitCode;

use bone_core::enhance::{descoteaux_enhancement_with_progress, DescoteauxParams, EnhanceDirection};
use bone_core::nifti_io::{read_nifti_file, save_nifti_to_file};

const USAGE: &str = "Usage: descoteaux_enhance <input> <outputMeasure> \
<enhanceBright:0|1> <numSigma> <sigma1> [sigma2 sigma3 ...]";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 6 {
        return Err(USAGE.to_string());
    }

    let input_path = Path::new(&args[1]);
    let measure_path = Path::new(&args[2]);
    let enhance_bright = match args[3].as_str() {
        "0" => false,
        "1" => true,
        other => return Err(format!("enhanceBright must be 0 or 1, given '{}'", other)),
    };
    let sigmas = parse_sigmas(&args[4..])?;

    println!("Read in the following parameters:");
    println!("  InputFilePath:    {}", input_path.display());
    println!("  OutputMeasure:    {}", measure_path.display());
    println!(
        "  EnhanceDirection: {}",
        if enhance_bright {
            "enhancing bright objects"
        } else {
            "enhancing dark objects"
        }
    );
    println!("  Sigmas:           {:?}", sigmas);
    println!();

    let volume = read_nifti_file(input_path)?;
    println!(
        "Loaded {}x{}x{} volume, voxel size {:.3}x{:.3}x{:.3} mm",
        volume.dims.0,
        volume.dims.1,
        volume.dims.2,
        volume.voxel_size.0,
        volume.voxel_size.1,
        volume.voxel_size.2
    );

    let params = DescoteauxParams {
        sigmas,
        direction: if enhance_bright {
            EnhanceDirection::Bright
        } else {
            EnhanceDirection::Dark
        },
        ..Default::default()
    };

    let enhancement = descoteaux_enhancement_with_progress(
        &volume.data,
        volume.dims,
        volume.voxel_size,
        &params,
        None,
        |done, total| println!("Scale {}/{}", done, total),
    )
    .map_err(|e| e.to_string())?;

    save_nifti_to_file(
        measure_path,
        &enhancement,
        volume.dims,
        volume.voxel_size,
        &volume.affine,
    )?;
    println!("Wrote enhancement volume to {}", measure_path.display());

    Ok(())
}

/// Parse "<numSigma> <sigma1> [sigma2 ...]" from the argument tail
fn parse_sigmas(args: &[String]) -> Result<Vec<f64>, String> {
    let count: usize = args[0]
        .parse()
        .map_err(|_| format!("numSigma must be an integer, given '{}'", args[0]))?;
    if args.len() != count + 1 {
        return Err(format!(
            "expected {} sigma values, given {}\n{}",
            count,
            args.len() - 1,
            USAGE
        ));
    }
    args[1..]
        .iter()
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| format!("sigma must be a number, given '{}'", s))
        })
        .collect()
}
