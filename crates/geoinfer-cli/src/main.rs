mod cli;
mod raw;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command, RunArgs};
use geoinfer_backend_ort::{OrtSession, SessionOptions};
use geoinfer_core::{parse_expressions, Graph, IOName};
use geoinfer_model::{stream, InferenceFilter, ModelBase, ModelFilter};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .init();

    match cli.command {
        Command::Describe { model } => describe(&model),
        Command::Run(args) => run(args),
    }
}

fn describe(model: &Path) -> Result<()> {
    let graph = Graph::from_file(model)?;
    let session = OrtSession::from_graph(&graph, &SessionOptions::default())?;

    println!("{}", graph.label());
    for (kind, specs) in [("input", session.inputs()), ("output", session.outputs())] {
        for spec in specs {
            println!("  {kind:<6} {:<24} {:<5} {}", spec.name, spec.dtype, spec.shape_string());
        }
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let graph = Graph::from_file(&args.model)?;
    let options = SessionOptions {
        intra_threads: args.intra_threads,
        ..SessionOptions::default()
    };
    let session = OrtSession::from_graph(&graph, &options)?;

    let images = args
        .inputs
        .iter()
        .map(|input| raw::read_raster(&input.path, input.size, input.bands))
        .collect::<Result<Vec<_>>>()?;

    let mut base = ModelBase::new();
    base.set_graph(graph);
    base.set_session(&session);
    for (input, image) in args.inputs.iter().zip(&images) {
        base.push_input_bundle(input.name.as_str(), input.receptive_field, image);
    }
    for output in &args.outputs {
        base.push_output_bundle(output.name.as_str(), output.expression_field);
    }
    let registry = base.registry_mut();
    registry.set_target_nodes(args.targets.iter().map(|t| IOName::from(t.as_str())).collect());
    if let Some(expr) = &args.placeholders {
        registry.set_user_placeholders(parse_expressions(expr)?);
    }

    let mut filter = InferenceFilter::new(args.mode, base);
    if let InferenceFilter::Patch(patch) = &mut filter {
        patch.set_output_spacing_scale(args.spacing_scale);
        patch.set_padding_value(args.padding);
    }
    let info = filter.generate_output_information()?;
    info!(
        mode = ?filter.mode(),
        size = %info.size,
        bands = info.bands(),
        workers = args.workers,
        "running inference"
    );

    let out = match stream(&filter, args.workers) {
        Ok(out) => out,
        Err(err) => {
            if let Some(report) = err.report() {
                error!("debug report:\n{report}");
            }
            return Err(err.into());
        }
    };
    raw::write_raster(&args.out, &out)?;

    info!(
        path = %args.out.display(),
        size = %out.size(),
        bands = out.bands(),
        origin = ?out.origin(),
        spacing = ?out.spacing(),
        "wrote output raster"
    );
    Ok(())
}
