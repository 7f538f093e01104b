use super::calculator::Cp2kCalculator;
use crate::core::models::changes::EvaluationKind;
use crate::core::models::results::{Property, Results};
use crate::core::models::structure::Structure;
use crate::engine::config::CalculatorConfig;
use crate::engine::error::ShellError;
use crate::engine::progress::{FrameSummary, Progress, ProgressReporter};
use crate::engine::transport::ShellTransport;
use tracing::{info, instrument};

/// Launches a shell, evaluates every structure in order and shuts the shell down.
///
/// Consecutive structures with the same composition share one force environment, so a
/// trajectory of a fixed system only pays for loading the input once.
#[instrument(skip_all, name = "trajectory_workflow", fields(frames = structures.len()))]
pub fn run(
    structures: &[Structure],
    config: &CalculatorConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<Results>, ShellError> {
    reporter.report(Progress::ShellStarting {
        command: config.resolved_command(),
    });
    let mut calculator = Cp2kCalculator::launch(config.clone())?;
    reporter.report(Progress::ShellConnected {
        version: calculator.session().transport().version(),
    });

    let results = evaluate_all(&mut calculator, structures, reporter)?;
    calculator.close()?;
    reporter.report(Progress::ShellClosed);
    Ok(results)
}

/// Evaluates `structures` in order with an existing calculator.
pub fn evaluate_all<T: ShellTransport>(
    calculator: &mut Cp2kCalculator<T>,
    structures: &[Structure],
    reporter: &ProgressReporter,
) -> Result<Vec<Results>, ShellError> {
    reporter.report(Progress::FramesStart {
        total: structures.len(),
    });

    let mut all = Vec::with_capacity(structures.len());
    for (index, structure) in structures.iter().enumerate() {
        let results = calculator.calculate(structure, &Property::ALL)?.clone();
        let summary = FrameSummary {
            index,
            energy: results.energy,
            max_force: results.max_force(),
            kind: calculator
                .last_evaluation()
                .unwrap_or(EvaluationKind::Updated),
        };
        info!("{}", summary);
        reporter.report(Progress::FrameEvaluated(summary));
        all.push(results);
    }

    reporter.report(Progress::FramesFinish);
    Ok(all)
}
