use crate::cli::EvaluateArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use cp2k_shell::core::models::results::{Results, ResultsRecord};
use cp2k_shell::core::models::structure::Structure;
use cp2k_shell::engine::progress::ProgressReporter;
use cp2k_shell::workflows::trajectory;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct FrameReport {
    structure: String,
    results: ResultsRecord,
}

#[derive(Debug, Serialize)]
struct EvaluationReport {
    command: String,
    frames: Vec<FrameReport>,
}

pub fn run(args: EvaluateArgs, quiet: bool) -> Result<()> {
    let app = build_config(&args.calculator, args.command.as_deref())?;
    let config = app.core_config;

    let structures = args
        .structure
        .iter()
        .map(|path| {
            info!("Loading structure from {:?}", path);
            Structure::load(path)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let progress_handler = if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let command = config.resolved_command();
    info!("Invoking the trajectory workflow with '{}'...", command);
    let results = trajectory::run(&structures, &config, &reporter)?;

    for (path, frame) in args.structure.iter().zip(&results) {
        print_frame(path, frame);
    }

    if let Some(output) = &args.output {
        let report = build_report(command, &args.structure, &results);
        write_report(output, &report)?;
        println!("✓ Results written to: {}", output.display());
    }
    Ok(())
}

fn print_frame(path: &Path, results: &Results) {
    println!("{}", path.display());
    println!("  Energy: {:.10} eV", results.energy);
    println!("  Forces (eV/A):");
    for (i, f) in results.forces.iter().enumerate() {
        println!("    {:>4} {:>16.8} {:>16.8} {:>16.8}", i, f.x, f.y, f.z);
    }
    let s = results.stress;
    println!(
        "  Stress (eV/A^3, xx yy zz yz xz xy): {:.8e} {:.8e} {:.8e} {:.8e} {:.8e} {:.8e}",
        s[0], s[1], s[2], s[3], s[4], s[5]
    );
}

fn build_report(command: String, paths: &[PathBuf], results: &[Results]) -> EvaluationReport {
    EvaluationReport {
        command,
        frames: paths
            .iter()
            .zip(results)
            .map(|(path, r)| FrameReport {
                structure: path.display().to_string(),
                results: ResultsRecord::from(r),
            })
            .collect(),
    }
}

fn write_report(path: &Path, report: &EvaluationReport) -> Result<()> {
    let text = toml::to_string_pretty(report).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    std::fs::write(path, text)?;
    Ok(())
}
