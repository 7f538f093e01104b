use crate::core::models::changes::EvaluationKind;
use std::fmt;

/// Outcome of one evaluated frame of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    pub index: usize,
    /// Potential energy in eV.
    pub energy: f64,
    /// Largest force norm in eV/A.
    pub max_force: f64,
    pub kind: EvaluationKind,
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {}: E = {:.6} eV, max |F| = {:.4} eV/A ({})",
            self.index, self.energy, self.max_force, self.kind
        )
    }
}

/// Events emitted while a workflow drives the shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    ShellStarting { command: String },
    ShellConnected { version: f64 },

    FramesStart { total: usize },
    FrameEvaluated(FrameSummary),
    FramesFinish,

    ShellClosed,
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
