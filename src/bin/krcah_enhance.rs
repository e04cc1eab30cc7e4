//! Krcah bone enhancement CLI
//!
//! Usage: krcah_enhance <input> <outputPreprocessed> <outputMeasure>
//!        <enhanceBright:0|1> <implementationParams:0|1>
//!        <numSigma> <sigma1> [sigma2 sigma3 ...]

use std::path::Path;
use std::process::ExitCode;

use bone_core::enhance::{
    krcah_enhancement, EnhanceDirection, KrcahParameterSet, KrcahParams,
};
use bone_core::nifti_io::{read_nifti_file, save_nifti_to_file};

const USAGE: &str = "Usage: krcah_enhance <input> <outputPreprocessed> <outputMeasure> \
<enhanceBright:0|1> <implementationParams:0|1> <numSigma> <sigma1> [sigma2 sigma3 ...]";

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
    if args.len() < 8 {
        return Err(USAGE.to_string());
    }

    let input_path = Path::new(&args[1]);
    let preprocessed_path = Path::new(&args[2]);
    let measure_path = Path::new(&args[3]);
    let enhance_bright = parse_flag(&args[4], "enhanceBright")?;
    let implementation_params = parse_flag(&args[5], "implementationParams")?;
    let sigmas = parse_sigmas(&args[6..])?;

    let direction = if enhance_bright {
        EnhanceDirection::Bright
    } else {
        EnhanceDirection::Dark
    };
    let parameter_set = if implementation_params {
        KrcahParameterSet::Implementation
    } else {
        KrcahParameterSet::Journal
    };

    println!("Read in the following parameters:");
    println!("  InputFilePath:        {}", input_path.display());
    println!("  OutputPreprocessed:   {}", preprocessed_path.display());
    println!("  OutputMeasure:        {}", measure_path.display());
    println!(
        "  EnhanceDirection:     {}",
        if enhance_bright {
            "enhancing bright objects"
        } else {
            "enhancing dark objects"
        }
    );
    println!(
        "  ParameterSet:         {}",
        if implementation_params {
            "implementation"
        } else {
            "journal article"
        }
    );
    println!("  Sigmas:               {:?}", sigmas);
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

    let params = KrcahParams {
        sigmas,
        direction,
        parameter_set,
        ..Default::default()
    };
    let result = krcah_enhancement(&volume.data, volume.dims, volume.voxel_size, &params, None)
        .map_err(|e| e.to_string())?;

    if let Some(preprocessed) = &result.preprocessed {
        save_nifti_to_file(
            preprocessed_path,
            preprocessed,
            volume.dims,
            volume.voxel_size,
            &volume.affine,
        )?;
        println!("Wrote preprocessed volume to {}", preprocessed_path.display());
    }

    save_nifti_to_file(
        measure_path,
        &result.enhancement,
        volume.dims,
        volume.voxel_size,
        &volume.affine,
    )?;
    println!("Wrote enhancement volume to {}", measure_path.display());

    Ok(())
}

fn parse_flag(arg: &str, name: &str) -> Result<bool, String> {
    match arg {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(format!("{} must be 0 or 1, given '{}'", name, other)),
    }
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
