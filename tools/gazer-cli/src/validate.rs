//! Argument checks performed before any resource is created.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use gazer_processing::ModelBundle;
use gazer_video_io::SourceId;

use crate::args::Args;

/// Marker written and removed to prove the output directory is writable.
const PROBE_FILE: &str = ".gazer";

/// Arguments that passed validation.
#[derive(Debug, Clone)]
pub struct Validated {
    pub input: String,
    pub output: PathBuf,
    pub models: ModelBundle,
}

pub fn validate(args: &Args) -> anyhow::Result<Validated> {
    let Some(output) = args.output.clone() else {
        bail!("Must specify an output directory (-o)");
    };
    probe_output_dir(&output)?;

    let Some(input) = args.input.clone() else {
        bail!("Must specify an input (-i)");
    };
    check_input(&input)?;
    check_scale(args.scale)?;

    let models = args.models();
    models.validate().context("Invalid model")?;

    Ok(Validated {
        input,
        output,
        models,
    })
}

/// Create and remove the probe file in `dir`.
pub fn probe_output_dir(dir: &Path) -> anyhow::Result<()> {
    let probe = dir.join(PROBE_FILE);
    std::fs::write(&probe, b"").with_context(|| {
        format!(
            "Specified directory {} does not exist or is not writable",
            dir.display()
        )
    })?;
    std::fs::remove_file(&probe)
        .with_context(|| format!("Failed to remove {}", probe.display()))?;
    Ok(())
}

/// The crop scale must be a positive finite factor.
pub fn check_scale(scale: f32) -> anyhow::Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        bail!("Scale (-s) must be a positive number, got {scale}");
    }
    Ok(())
}

/// Inputs must name an existing file unless they are URIs or synthetic.
pub fn check_input(input: &str) -> anyhow::Result<SourceId> {
    let id = SourceId::parse(input).context("Invalid input")?;
    if let SourceId::File(path) = &id {
        if !path.is_file() {
            bail!(
                "Specified input file {} does not exist or is not readable",
                path.display()
            );
        }
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn probe_leaves_no_marker() {
        let dir = tempfile::tempdir().unwrap();
        probe_output_dir(dir.path()).unwrap();
        assert!(!dir.path().join(PROBE_FILE).exists());
        assert!(probe_output_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn synthetic_inputs_need_no_file() {
        assert!(check_input("synthetic://64x48?frames=3").unwrap().is_synthetic());
        assert!(check_input("synthetic://0x48").is_err());
        assert!(check_input("/definitely/not/here.mov").is_err());
        assert!(check_input("rtsp://camera/stream").is_ok());
    }

    #[test]
    fn missing_output_or_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();

        let no_output = Args::try_parse_from(["gazer", "-i", "synthetic://8x8"]).unwrap();
        assert!(validate(&no_output)
            .unwrap_err()
            .to_string()
            .contains("output"));

        let no_input = Args::try_parse_from(["gazer", "-o", out]).unwrap();
        assert!(validate(&no_input).unwrap_err().to_string().contains("input"));

        let ok = Args::try_parse_from(["gazer", "-o", out, "-i", "synthetic://8x8"]).unwrap();
        let validated = validate(&ok).unwrap();
        assert_eq!(validated.output, dir.path());
    }

    #[test]
    fn scale_must_be_positive_and_finite() {
        assert!(check_scale(1.5).is_ok());
        for bad in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            assert!(check_scale(bad).is_err(), "{bad} accepted");
        }

        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "gazer",
            "-o",
            dir.path().to_str().unwrap(),
            "-i",
            "synthetic://8x8",
            "-s",
            "0",
        ])
        .unwrap();
        assert!(validate(&args).unwrap_err().to_string().contains("Scale"));
    }

    #[test]
    fn empty_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("eye.cpb");
        std::fs::write(&model, b"").unwrap();
        let args = Args::try_parse_from([
            "gazer",
            "-o",
            dir.path().to_str().unwrap(),
            "-i",
            "synthetic://8x8",
            "-E",
            model.to_str().unwrap(),
        ])
        .unwrap();
        assert!(validate(&args).is_err());
    }
}
