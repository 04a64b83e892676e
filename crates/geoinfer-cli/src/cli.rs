use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use geoinfer_core::FieldSize;
use geoinfer_model::FilterMode;

#[derive(Parser, Debug)]
#[command(name = "geoinfer", version, about = "Run ONNX models over raster images")]
pub struct Cli {
    /// Log level (RUST_LOG syntax)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the inputs and outputs of a model
    Describe {
        /// Path to ONNX model file
        #[arg(long)]
        model: PathBuf,
    },
    /// Run a model over raw little-endian f32 rasters
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to ONNX model file
    #[arg(long)]
    pub model: PathBuf,

    /// Input bundle as NAME:RECEPTIVE_FIELD:PATH:WIDTHxHEIGHTxBANDS
    #[arg(long = "input", required = true)]
    pub inputs: Vec<InputArg>,

    /// Output bundle as NAME:EXPRESSION_FIELD
    #[arg(long = "output", required = true)]
    pub outputs: Vec<OutputArg>,

    /// Node evaluated with every run but not collected
    #[arg(long = "target")]
    pub targets: Vec<String>,

    /// Scalar placeholders, e.g. "drop_rate=0.0 is_training=false"
    #[arg(long)]
    pub placeholders: Option<String>,

    /// Inference mode (patch or full)
    #[arg(long, default_value = "patch")]
    pub mode: FilterMode,

    /// Output pixel size relative to the first input (patch mode)
    #[arg(long, default_value_t = 1.0)]
    pub spacing_scale: f64,

    /// Value read outside input images (patch mode)
    #[arg(long, default_value_t = 0.0)]
    pub padding: f32,

    /// Worker threads sharing the session
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// ORT intra-op threads
    #[arg(long)]
    pub intra_threads: Option<usize>,

    /// Where to write the raw f32 output raster
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Clone, Debug)]
pub struct InputArg {
    pub name: String,
    pub receptive_field: FieldSize,
    pub path: PathBuf,
    pub size: FieldSize,
    pub bands: usize,
}

impl FromStr for InputArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut head = s.splitn(3, ':');
        let (Some(name), Some(field), Some(rest)) = (head.next(), head.next(), head.next()) else {
            bail!("expected NAME:RECEPTIVE_FIELD:PATH:WIDTHxHEIGHTxBANDS, got `{s}`");
        };
        let Some((path, geometry)) = rest.rsplit_once(':') else {
            bail!("missing raster geometry in `{s}`");
        };

        let dims = geometry
            .split(['x', 'X'])
            .map(|d| d.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("invalid raster geometry `{geometry}`"))?;
        let &[width, height, bands] = dims.as_slice() else {
            bail!("raster geometry `{geometry}` must be WIDTHxHEIGHTxBANDS");
        };

        Ok(Self {
            name: name.to_string(),
            receptive_field: field.parse()?,
            path: PathBuf::from(path),
            size: FieldSize::new(width, height),
            bands,
        })
    }
}

#[derive(Clone, Debug)]
pub struct OutputArg {
    pub name: String,
    pub expression_field: FieldSize,
}

impl FromStr for OutputArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let Some((name, field)) = s.split_once(':') else {
            bail!("expected NAME:EXPRESSION_FIELD, got `{s}`");
        };
        Ok(Self {
            name: name.to_string(),
            expression_field: field.parse()?,
        })
    }
}
