use crate::core::models::changes::{ChangedAspect, EvaluationKind, SystemChanges};
use crate::core::models::results::{Property, Results};
use crate::core::models::structure::Structure;
use crate::engine::config::CalculatorConfig;
use crate::engine::error::ShellError;
use crate::engine::input::generate_input;
use crate::engine::process::ShellProcess;
use crate::engine::session::{ComputationSession, EnvironmentFiles, EnvironmentState};
use crate::engine::transport::ShellTransport;
use tracing::{debug, info, instrument};

/// Energy, force and stress calculator backed by a persistent CP2K shell.
///
/// The calculator remembers the last structure it evaluated and only sends the engine what
/// changed since then. A change of species, atom count or periodicity destroys the force
/// environment and loads a fresh one from a newly generated input file.
///
/// # Examples
///
/// ```no_run
/// use cp2k_shell::core::models::results::Property;
/// use cp2k_shell::core::models::structure::Structure;
/// use cp2k_shell::engine::config::CalculatorConfigBuilder;
/// use cp2k_shell::workflows::calculator::Cp2kCalculator;
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let structure = Structure::load(Path::new("h2o.toml"))?;
/// let config = CalculatorConfigBuilder::new().label("runs/h2o").xc("PBE").build()?;
/// let mut calculator = Cp2kCalculator::launch(config)?;
/// let results = calculator.calculate(&structure, &[Property::Energy])?;
/// println!("E = {} eV", results.energy);
/// calculator.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Cp2kCalculator<T: ShellTransport = ShellProcess> {
    session: ComputationSession<T>,
    config: CalculatorConfig,
    previous: Option<Structure>,
    results: Option<Results>,
    last_kind: Option<EvaluationKind>,
}

impl Cp2kCalculator<ShellProcess> {
    /// Starts the shell named by the configuration (see
    /// [`CalculatorConfig::resolved_command`]) and wraps it in a calculator.
    pub fn launch(config: CalculatorConfig) -> Result<Self, ShellError> {
        let command = config.resolved_command();
        let process = ShellProcess::start(&command)?;
        info!(
            "Connected to CP2K shell (protocol version {}).",
            process.version()
        );
        Ok(Self::with_transport(process, config))
    }
}

impl<T: ShellTransport> Cp2kCalculator<T> {
    /// Wraps a transport whose handshake has already completed.
    pub fn with_transport(transport: T, config: CalculatorConfig) -> Self {
        Self {
            session: ComputationSession::new(transport),
            config,
            previous: None,
            results: None,
            last_kind: None,
        }
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    pub fn session(&self) -> &ComputationSession<T> {
        &self.session
    }

    pub fn results(&self) -> Option<&Results> {
        self.results.as_ref()
    }

    /// How the most recent successful [`Cp2kCalculator::calculate`] got its results.
    pub fn last_evaluation(&self) -> Option<EvaluationKind> {
        self.last_kind
    }

    /// Replaces the configuration.
    ///
    /// If anything changed, the current force environment is destroyed and the cached
    /// results are discarded; the next calculation loads a freshly generated input.
    pub fn set_config(&mut self, config: CalculatorConfig) -> Result<(), ShellError> {
        if config == self.config {
            return Ok(());
        }
        debug!("Calculator configuration changed; resetting.");
        self.config = config;
        self.reset()
    }

    /// Evaluates `structure`, reusing the cached results if it matches the last one.
    ///
    /// Every evaluation yields energy, forces and stress, so `properties` only documents
    /// what the caller needs. Cached results are discarded on failure.
    #[instrument(skip_all, name = "cp2k_calculate", fields(atoms = structure.len()))]
    pub fn calculate(
        &mut self,
        structure: &Structure,
        properties: &[Property],
    ) -> Result<&Results, ShellError> {
        let changes = SystemChanges::between(self.previous.as_ref(), structure);
        if changes.is_empty() && self.results.is_some() {
            debug!("Structure unchanged; reusing results for {:?}.", properties);
            self.last_kind = Some(EvaluationKind::Cached);
        } else {
            let kind = self.evaluate(structure, changes)?;
            self.last_kind = Some(kind);
        }
        self.results
            .as_ref()
            .ok_or_else(|| ShellError::InvalidState {
                operation: "calculate",
                state: "no results are available".to_string(),
            })
    }

    /// Destroys the environment and shuts the shell down.
    pub fn close(self) -> Result<(), ShellError> {
        self.session.close()
    }

    fn evaluate(
        &mut self,
        structure: &Structure,
        changes: SystemChanges,
    ) -> Result<EvaluationKind, ShellError> {
        self.previous = None;
        self.results = None;
        self.last_kind = None;

        if changes.contains(ChangedAspect::Composition) {
            self.session.destroy_environment()?;
        }
        let (kind, changes) = match self.session.state() {
            EnvironmentState::Active(_) => (EvaluationKind::Updated, changes),
            EnvironmentState::NoEnvironment => {
                let input = generate_input(&self.config, structure)?;
                let files =
                    EnvironmentFiles::new(self.config.input_path(), self.config.output_path());
                let id = self.session.create_environment(&input, &files)?;
                info!("Loaded force environment {} from {:?}.", id, files.input);
                (EvaluationKind::Loaded, SystemChanges::all())
            }
        };

        let results = self.session.evaluate(structure, &changes)?;
        debug!("Energy: {} eV, max force: {} eV/A", results.energy, results.max_force());
        self.previous = Some(structure.clone());
        self.results = Some(results);
        Ok(kind)
    }

    fn reset(&mut self) -> Result<(), ShellError> {
        self.previous = None;
        self.results = None;
        self.last_kind = None;
        self.session.destroy_environment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::CalculatorConfigBuilder;
    use crate::engine::protocol::{READY, REPLY_END};
    use crate::engine::transport::scripted::ScriptedTransport;
    use nalgebra::{Matrix3, Point3};
    use std::path::Path;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> CalculatorConfig {
        CalculatorConfigBuilder::new()
            .label(dir.join("h2").to_string_lossy())
            .build()
            .unwrap()
    }

    fn dimer(distance: f64) -> Structure {
        Structure::new(
            vec!["H".into(), "H".into()],
            vec![Point3::origin(), Point3::new(0.0, 0.0, distance)],
            Matrix3::from_diagonal_element(10.0),
            [false; 3],
        )
        .unwrap()
    }

    fn trimer() -> Structure {
        Structure::new(
            vec!["H".into(), "H".into(), "H".into()],
            vec![
                Point3::origin(),
                Point3::new(0.0, 0.0, 0.8),
                Point3::new(0.0, 0.8, 0.0),
            ],
            Matrix3::from_diagonal_element(10.0),
            [false; 3],
        )
        .unwrap()
    }

    /// Replies from UNITS_EV_A through GET_STRESS for `n` atoms with the given uploads.
    fn evaluation(n: usize, set_cell: bool, set_pos: bool, energy: &str) -> Vec<String> {
        let mut replies = vec![READY.to_string()];
        if set_cell {
            replies.push(READY.to_string());
        }
        if set_pos {
            replies.push("0.0".to_string());
            replies.push(READY.to_string());
        }
        replies.push(READY.to_string());
        replies.push(energy.to_string());
        replies.push(READY.to_string());
        replies.push((3 * n).to_string());
        replies.extend((0..n).map(|_| "0.0 0.0 0.0".to_string()));
        replies.push(REPLY_END.to_string());
        replies.push(READY.to_string());
        replies.push("0 0 0 0 0 0 0 0 0".to_string());
        replies.push(READY.to_string());
        replies
    }

    fn load(id: &str) -> Vec<String> {
        vec![id.to_string(), READY.to_string()]
    }

    #[test]
    fn first_calculation_loads_environment_and_uploads_everything() {
        let dir = tempdir().unwrap();
        let mut transport = ScriptedTransport::new(load("1"));
        transport.push_replies(evaluation(2, true, true, "-31.0"));
        let mut calc = Cp2kCalculator::with_transport(transport, config_in(dir.path()));

        let energy = calc.calculate(&dimer(0.74), &Property::ALL).unwrap().energy;

        assert_eq!(energy, -31.0);
        assert_eq!(calc.last_evaluation(), Some(EvaluationKind::Loaded));
        assert!(dir.path().join("h2.inp").exists());
        let commands = calc.session().transport().commands();
        assert!(commands[0].starts_with("LOAD "));
        assert!(commands.contains(&"SET_CELL 1"));
        assert!(commands.contains(&"SET_POS 1"));
        assert_eq!(calc.session().transport().remaining(), 0);
    }

    #[test]
    fn unchanged_structure_uses_cached_results() {
        let dir = tempdir().unwrap();
        let mut transport = ScriptedTransport::new(load("1"));
        transport.push_replies(evaluation(2, true, true, "-31.0"));
        let mut calc = Cp2kCalculator::with_transport(transport, config_in(dir.path()));

        calc.calculate(&dimer(0.74), &[Property::Energy]).unwrap();
        let sent_before = calc.session().transport().sent.len();
        let energy = calc.calculate(&dimer(0.74), &[Property::Forces]).unwrap().energy;

        assert_eq!(energy, -31.0);
        assert_eq!(calc.last_evaluation(), Some(EvaluationKind::Cached));
        assert_eq!(calc.session().transport().sent.len(), sent_before);
    }

    #[test]
    fn moved_atoms_only_upload_positions() {
        let dir = tempdir().unwrap();
        let mut transport = ScriptedTransport::new(load("1"));
        transport.push_replies(evaluation(2, true, true, "-31.0"));
        transport.push_replies(evaluation(2, false, true, "-31.2"));
        let mut calc = Cp2kCalculator::with_transport(transport, config_in(dir.path()));

        calc.calculate(&dimer(0.74), &[Property::Energy]).unwrap();
        let sent_before = calc.session().transport().sent.len();
        let energy = calc.calculate(&dimer(0.80), &[Property::Energy]).unwrap().energy;

        assert_eq!(energy, -31.2);
        assert_eq!(calc.last_evaluation(), Some(EvaluationKind::Updated));
        let second = &calc.session().transport().sent[sent_before..];
        assert!(second.iter().any(|l| l == "SET_POS 1"));
        assert!(!second.iter().any(|l| l.starts_with("SET_CELL")));
        assert!(!second.iter().any(|l| l.starts_with("LOAD")));
    }

    #[test]
    fn composition_change_recreates_environment() {
        let dir = tempdir().unwrap();
        let mut transport = ScriptedTransport::new(load("1"));
        transport.push_replies(evaluation(2, true, true, "-31.0"));
        transport.push_replies([READY]); // DESTROY 1
        transport.push_replies(load("2"));
        transport.push_replies(evaluation(3, true, true, "-45.0"));
        let mut calc = Cp2kCalculator::with_transport(transport, config_in(dir.path()));

        calc.calculate(&dimer(0.74), &[Property::Energy]).unwrap();
        let energy = calc.calculate(&trimer(), &[Property::Energy]).unwrap().energy;

        assert_eq!(energy, -45.0);
        assert_eq!(calc.last_evaluation(), Some(EvaluationKind::Loaded));
        assert_eq!(
            calc.session().state(),
            EnvironmentState::Active(
                crate::engine::protocol::parse_force_env_id("2").unwrap()
            )
        );
        let commands = calc.session().transport().commands();
        let destroy = commands.iter().position(|c| *c == "DESTROY 1").unwrap();
        assert!(commands[destroy + 1].starts_with("LOAD "));
        assert!(commands.contains(&"SET_POS 2"));
        assert!(commands.contains(&"SET_CELL 2"));
    }

    #[test]
    fn set_config_with_changes_destroys_environment() {
        let dir = tempdir().unwrap();
        let mut transport = ScriptedTransport::new(load("1"));
        transport.push_replies(evaluation(2, true, true, "-31.0"));
        transport.push_replies([READY]);
        let mut calc = Cp2kCalculator::with_transport(transport, config_in(dir.path()));
        calc.calculate(&dimer(0.74), &[Property::Energy]).unwrap();

        calc.set_config(config_in(dir.path())).unwrap();
        assert!(calc.results().is_some());

        let mut changed = config_in(dir.path());
        changed.xc = "PBE".to_string();
        calc.set_config(changed).unwrap();
        assert!(calc.results().is_none());
        assert_eq!(calc.session().state(), EnvironmentState::NoEnvironment);
        assert_eq!(calc.config().xc, "PBE");
    }

    #[test]
    fn failed_evaluation_discards_cache() {
        let dir = tempdir().unwrap();
        let mut transport = ScriptedTransport::new(load("1"));
        transport.push_replies(evaluation(2, true, true, "-31.0"));
        transport.push_replies(["unexpected"]);
        let mut calc = Cp2kCalculator::with_transport(transport, config_in(dir.path()));

        calc.calculate(&dimer(0.74), &[Property::Energy]).unwrap();
        let result = calc.calculate(&dimer(0.9), &[Property::Energy]);

        assert!(matches!(result, Err(ShellError::Protocol { .. })));
        assert!(calc.results().is_none());
        assert_eq!(calc.last_evaluation(), None);
        assert!(calc.session().is_faulted());
    }

    #[test]
    fn template_with_subsys_fails_before_loading() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.template = "&FORCE_EVAL\n&SUBSYS\n&END SUBSYS\n&END FORCE_EVAL".to_string();
        let mut calc = Cp2kCalculator::with_transport(ScriptedTransport::default(), config);

        let result = calc.calculate(&dimer(0.74), &[Property::Energy]);

        assert!(matches!(result, Err(ShellError::Configuration { .. })));
        assert!(calc.session().transport().sent.is_empty());
        assert!(!calc.session().is_faulted());
    }
}
