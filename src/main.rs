#![deny(missing_docs)]

//! Command line entry point for the coverprep pipeline.
use std::path::{Path, PathBuf};

use coverprep::config::{self, ComputeDevice, PipelineConfig};
use coverprep::features::{self, ChromaChordEstimator, CqtTransform};
use coverprep::{audio, cache, logging, media};

enum Command {
    Validate(PathBuf),
    Normalize {
        audio: PathBuf,
        output: Option<PathBuf>,
    },
    Spectral(PathBuf),
    Harmonic(PathBuf),
    Accumulate {
        audio: PathBuf,
        output_dir: PathBuf,
        output_file: Option<String>,
        label: Option<String>,
    },
}

struct Options {
    command: Command,
    config_path: Option<PathBuf>,
    device: Option<ComputeDevice>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let config = load_config(options.config_path.as_deref())?;

    match options.command {
        Command::Validate(path) => {
            let checked =
                media::validate_media(&path, &config.media).map_err(|err| err.to_string())?;
            println!("{}", checked.display());
        }
        Command::Normalize {
            audio: path,
            output,
        } => {
            let waveform = audio::normalize(&path, &config.audio).map_err(|err| err.to_string())?;
            if let Some(output) = output {
                waveform.write_wav(&output).map_err(|err| err.to_string())?;
                println!("{}", output.display());
            } else {
                println!(
                    "{} samples at {} Hz",
                    waveform.len(),
                    waveform.sample_rate()
                );
            }
        }
        Command::Spectral(path) => {
            let device = options
                .device
                .unwrap_or_else(|| ComputeDevice::from_env_or(config.device));
            let features =
                features::extract_spectral_from_file(&path, &config.audio, &CqtTransform::default())
                    .map_err(|err| err.to_string())?;
            let placed = features.to_device(device);
            println!("{:?} on {:?}", placed.dims(), placed.device());
        }
        Command::Harmonic(path) => {
            let features = features::extract_harmonic(
                &path,
                config.harmonic.sample_rate,
                config.harmonic.hop_length,
                &ChromaChordEstimator,
            )
            .map_err(|err| err.to_string())?;
            println!("{:?}", features.as_array().shape());
        }
        Command::Accumulate {
            audio,
            output_dir,
            output_file,
            label,
        } => {
            let output_file = output_file.unwrap_or_else(|| config.harmonic.cache_file_name.clone());
            let cache = cache::accumulate(
                &audio,
                &output_dir,
                &output_file,
                label.as_deref(),
                &config.harmonic,
                &ChromaChordEstimator,
            )
            .map_err(|err| err.to_string())?;
            println!("{} entries in {}", cache.len(), cache.path().display());
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, String> {
    match path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| format!("Failed to load config: {err}"))
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut config_path = None;
    let mut device = None;
    let mut output_dir = None;
    let mut output_file = None;
    let mut label = None;
    let mut output = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--device" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--device requires a value".to_string())?;
                device = Some(
                    ComputeDevice::parse(value)
                        .ok_or_else(|| format!("Unknown device: {value}"))?,
                );
            }
            "--output-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--output-dir requires a value".to_string())?;
                output_dir = Some(PathBuf::from(value));
            }
            "--output-file" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--output-file requires a value".to_string())?;
                output_file = Some(value.clone());
            }
            "--output" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--output requires a value".to_string())?;
                output = Some(PathBuf::from(value));
            }
            "--label" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--label requires a value".to_string())?;
                label = Some(value.clone());
            }
            value if value.starts_with('-') => {
                return Err(format!("Unknown argument: {value}\n\n{}", help_text()));
            }
            value => positional.push(value.to_string()),
        }
        idx += 1;
    }

    let mut positional = positional.into_iter();
    let subcommand = positional
        .next()
        .ok_or_else(|| help_text().to_string())?;
    let path = positional
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| format!("{subcommand} requires an input path"))?;
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {extra}"));
    }

    let command = match subcommand.as_str() {
        "validate" => Command::Validate(path),
        "normalize" => Command::Normalize {
            audio: path,
            output,
        },
        "spectral" => Command::Spectral(path),
        "harmonic" => Command::Harmonic(path),
        "accumulate" => Command::Accumulate {
            audio: path,
            output_dir: output_dir
                .ok_or_else(|| "accumulate requires --output-dir".to_string())?,
            output_file,
            label,
        },
        other => return Err(format!("Unknown command: {other}\n\n{}", help_text())),
    };
    Ok(Some(Options {
        command,
        config_path,
        device,
    }))
}

fn help_text() -> &'static str {
    "coverprep <command> <path> [options]\n\n\
Commands:\n\
  validate <media>     Probe and check limits; prints the usable audio path\n\
  normalize <audio>    Fixed-length mono waveform at the general rate\n\
  spectral <audio>     Extract constant-Q features; prints the tensor shape\n\
  harmonic <audio>     Extract chord pitch features; prints the matrix shape\n\
  accumulate <audio>   Append chord pitch features to a feature cache\n\n\
Options:\n\
  --config <path>        Config file (default: app config dir)\n\
  --device <cpu|wgpu>    Device for spectral tensors\n\
  --output <wav>         Write the normalized waveform (normalize)\n\
  --output-dir <dir>     Cache directory (accumulate)\n\
  --output-file <name>   Cache file name (accumulate)\n\
  --label <label>        Entry label (default: parent directory name)"
}
