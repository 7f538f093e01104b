use super::error::ShellError;
use super::protocol::{self, Command, DATA_END, ForceEnvId, REPLY_END};
use super::transport::ShellTransport;
use crate::core::models::changes::{ChangedAspect, SystemChanges};
use crate::core::models::results::{Results, to_voigt};
use crate::core::models::structure::Structure;
use nalgebra::{Matrix3, Vector3};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const STRESS_SYMMETRY_TOLERANCE: f64 = 1e-12;

/// Files exchanged with the engine when a force environment is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFiles {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl EnvironmentFiles {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentState {
    #[default]
    NoEnvironment,
    Active(ForceEnvId),
}

impl fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentState::NoEnvironment => write!(f, "no force environment exists"),
            EnvironmentState::Active(id) => write!(f, "force environment {} is active", id),
        }
    }
}

/// Manages the force environment of one CP2K shell.
///
/// The session owns its transport. Dropping the session destroys the active environment and
/// shuts the shell down; [`ComputationSession::close`] does the same but reports failures.
/// After a fatal error (see [`ShellError::is_fatal`]) the session refuses further work and
/// only kills the shell on release.
pub struct ComputationSession<T: ShellTransport> {
    transport: T,
    state: EnvironmentState,
    faulted: bool,
    closed: bool,
}

impl<T: ShellTransport> ComputationSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: EnvironmentState::NoEnvironment,
            faulted: false,
            closed: false,
        }
    }

    pub fn state(&self) -> EnvironmentState {
        self.state
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Writes `input_text` to `files.input` and asks the engine to load it.
    pub fn create_environment(
        &mut self,
        input_text: &str,
        files: &EnvironmentFiles,
    ) -> Result<ForceEnvId, ShellError> {
        self.ensure_usable()?;
        if let EnvironmentState::Active(_) = self.state {
            return Err(ShellError::InvalidState {
                operation: "create_environment",
                state: self.state.to_string(),
            });
        }
        // Nothing has reached the shell yet, so a failed write leaves the session usable.
        write_input_file(&files.input, input_text)?;
        let result = self.load(files);
        let id = self.track(result)?;
        debug!("Created force environment {}", id);
        self.state = EnvironmentState::Active(id);
        Ok(id)
    }

    /// Destroys the active force environment. Does nothing if none exists.
    pub fn destroy_environment(&mut self) -> Result<(), ShellError> {
        let EnvironmentState::Active(id) = self.state else {
            return Ok(());
        };
        self.ensure_usable()?;
        let result = protocol::send_command(&mut self.transport, &Command::Destroy(id))
            .and_then(|_| protocol::expect_ready(&mut self.transport));
        self.track(result)?;
        debug!("Destroyed force environment {}", id);
        self.state = EnvironmentState::NoEnvironment;
        Ok(())
    }

    /// Evaluates `structure` in the active environment, uploading only what `changes` names.
    /// Composition changes need a new environment.
    pub fn evaluate(
        &mut self,
        structure: &Structure,
        changes: &SystemChanges,
    ) -> Result<Results, ShellError> {
        self.ensure_usable()?;
        let EnvironmentState::Active(id) = self.state else {
            return Err(ShellError::InvalidState {
                operation: "evaluate",
                state: self.state.to_string(),
            });
        };
        debug!("Evaluating {} atoms in environment {} (changes: {})", structure.len(), id, changes);
        let result = self.run_evaluation(id, structure, changes);
        self.track(result)
    }

    /// Destroys the environment and shuts the shell down, reporting the first failure.
    pub fn close(mut self) -> Result<(), ShellError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), ShellError> {
        if self.closed {
            return Ok(());
        }
        let result = if self.faulted {
            warn!("Session faulted earlier; killing the shell instead of a clean exit.");
            self.transport.abort();
            Ok(())
        } else {
            match self.destroy_environment() {
                Ok(()) => self.transport.shutdown(),
                Err(e) => {
                    self.transport.abort();
                    Err(e)
                }
            }
        };
        self.closed = true;
        result
    }

    fn load(&mut self, files: &EnvironmentFiles) -> Result<ForceEnvId, ShellError> {
        let command = Command::Load {
            input: &files.input,
            output: &files.output,
        };
        protocol::send_command(&mut self.transport, &command)?;
        let line = self.transport.receive()?;
        let id = protocol::parse_force_env_id(&line)?;
        protocol::expect_ready(&mut self.transport)?;
        Ok(id)
    }

    fn run_evaluation(
        &mut self,
        id: ForceEnvId,
        structure: &Structure,
        changes: &SystemChanges,
    ) -> Result<Results, ShellError> {
        let t = &mut self.transport;
        let n_atoms = structure.len();

        protocol::send_command(t, &Command::UnitsEvA)?;
        protocol::expect_ready(t)?;

        if changes.contains(ChangedAspect::Cell) {
            protocol::send_command(t, &Command::SetCell(id))?;
            t.send(&protocol::format_reals(&structure.cell_row_major()))?;
            protocol::expect_ready(t)?;
        }

        if changes.contains(ChangedAspect::Positions) {
            protocol::send_command(t, &Command::SetPositions(id))?;
            t.send(&(3 * n_atoms).to_string())?;
            for p in structure.positions() {
                t.send(&protocol::format_reals(&[p.x, p.y, p.z]))?;
            }
            t.send(DATA_END)?;
            let max_change: f64 = protocol::receive_value(t, "the maximum position change")?;
            if max_change.is_nan() || max_change < 0.0 {
                return Err(ShellError::protocol(
                    "a non-negative maximum position change",
                    max_change.to_string(),
                ));
            }
            protocol::expect_ready(t)?;
        }

        protocol::send_command(t, &Command::EvalEnergyForces(id))?;
        protocol::expect_ready(t)?;

        protocol::send_command(t, &Command::GetEnergy(id))?;
        let energy: f64 = protocol::receive_value(t, "the energy")?;
        protocol::expect_ready(t)?;

        protocol::send_command(t, &Command::GetForces(id))?;
        let count: usize = protocol::receive_value(t, "the number of force components")?;
        if count != 3 * n_atoms {
            return Err(ShellError::protocol(
                format!("{} force components", 3 * n_atoms),
                count.to_string(),
            ));
        }
        let mut forces = Vec::with_capacity(n_atoms);
        for _ in 0..n_atoms {
            let f = protocol::receive_reals(t, 3, "an atomic force")?;
            forces.push(Vector3::new(f[0], f[1], f[2]));
        }
        protocol::expect_line(t, REPLY_END)?;
        protocol::expect_ready(t)?;

        protocol::send_command(t, &Command::GetStress(id))?;
        let values = protocol::receive_reals(t, 9, "the stress tensor")?;
        protocol::expect_ready(t)?;
        let stress = stress_to_voigt(&Matrix3::from_row_slice(&values))?;

        Ok(Results {
            energy,
            forces,
            stress,
        })
    }

    fn ensure_usable(&self) -> Result<(), ShellError> {
        if self.faulted || self.closed {
            Err(ShellError::Faulted)
        } else {
            Ok(())
        }
    }

    fn track<R>(&mut self, result: Result<R, ShellError>) -> Result<R, ShellError> {
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!("Shell session faulted: {}", e);
                self.faulted = true;
            }
        }
        result
    }
}

impl<T: ShellTransport> Drop for ComputationSession<T> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release the CP2K shell session: {}", e);
        }
    }
}

/// Checks symmetry and converts the engine's stress tensor to a negated Voigt vector.
pub fn stress_to_voigt(tensor: &Matrix3<f64>) -> Result<[f64; 6], ShellError> {
    for (i, j) in [(0, 1), (0, 2), (1, 2)] {
        let (a, b) = (tensor[(i, j)], tensor[(j, i)]);
        let scale = a.abs().max(b.abs()).max(1.0);
        if (a - b).abs() > STRESS_SYMMETRY_TOLERANCE * scale {
            return Err(ShellError::NumericInvariant(format!(
                "stress tensor is not symmetric: s[{}][{}] = {} but s[{}][{}] = {}",
                i, j, a, j, i, b
            )));
        }
    }
    Ok(to_voigt(tensor).map(|v| -v))
}

fn write_input_file(path: &Path, text: &str) -> Result<(), ShellError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            debug!("Creating directory {:?}", dir);
            std::fs::create_dir_all(dir)?;
        }
    }
    std::fs::write(path, text)?;
    Ok(())
}
