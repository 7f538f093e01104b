use cp2k_shell::core::models::changes::EvaluationKind;
use cp2k_shell::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct FrameBar {
    pb: ProgressBar,
    loads: usize,
    cached: usize,
}

impl FrameBar {
    fn summary(&self) -> String {
        format!(
            "✓ {} frames ({} environment loads, {} cached)",
            self.pb.position(),
            self.loads,
            self.cached
        )
    }
}

/// Renders shell startup and per-frame results of a trajectory on the terminal.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<FrameBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// A handler that tracks state without drawing anything.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), target).with_style(spinner_style());
        Self {
            state: Arc::new(Mutex::new(FrameBar {
                pb,
                loads: 0,
                cached: 0,
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut bar) = state.lock() else {
                warn!("Progress state mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::ShellStarting { command } => {
                    bar.pb.set_style(spinner_style());
                    bar.pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    bar.pb.set_message(format!("Starting {}", command));
                }
                Progress::ShellConnected { version } => {
                    bar.pb.disable_steady_tick();
                    bar.pb
                        .finish_with_message(format!("✓ CP2K shell ready (protocol {})", version));
                }
                Progress::FramesStart { total } => {
                    bar.loads = 0;
                    bar.cached = 0;
                    bar.pb.reset();
                    bar.pb.set_length(total as u64);
                    bar.pb.set_style(bar_style());
                    bar.pb.set_message("");
                }
                Progress::FrameEvaluated(summary) => {
                    match summary.kind {
                        EvaluationKind::Loaded => bar.loads += 1,
                        EvaluationKind::Cached => bar.cached += 1,
                        EvaluationKind::Updated => {}
                    }
                    bar.pb.set_message(summary.to_string());
                    bar.pb.inc(1);
                }
                Progress::FramesFinish => {
                    let message = bar.summary();
                    bar.pb.finish_with_message(message);
                }
                Progress::ShellClosed => {
                    bar.pb.println("✓ CP2K shell closed");
                }
            }
        })
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("[{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp2k_shell::engine::progress::FrameSummary;
    use std::thread;

    fn frame(index: usize, kind: EvaluationKind) -> Progress {
        Progress::FrameEvaluated(FrameSummary {
            index,
            energy: -31.0 - index as f64,
            max_force: 0.25,
            kind,
        })
    }

    #[test]
    fn startup_spinner_shows_command_then_protocol_version() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        callback(Progress::ShellStarting {
            command: "cp2k_shell.psmp".to_string(),
        });
        assert_eq!(
            handler.state.lock().unwrap().pb.message(),
            "Starting cp2k_shell.psmp"
        );

        callback(Progress::ShellConnected { version: 2.0 });
        let bar = handler.state.lock().unwrap();
        assert!(bar.pb.is_finished());
        assert_eq!(bar.pb.message(), "✓ CP2K shell ready (protocol 2)");
    }

    #[test]
    fn frames_advance_bar_and_count_loads_and_cache_hits() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        callback(Progress::FramesStart { total: 3 });
        callback(frame(0, EvaluationKind::Loaded));
        {
            let bar = handler.state.lock().unwrap();
            assert_eq!(bar.pb.length(), Some(3));
            assert_eq!(bar.pb.position(), 1);
            assert!(bar.pb.message().starts_with("frame 0: E = -31.000000 eV"));
        }

        callback(frame(1, EvaluationKind::Updated));
        callback(frame(2, EvaluationKind::Cached));
        callback(Progress::FramesFinish);

        let bar = handler.state.lock().unwrap();
        assert!(bar.pb.is_finished());
        assert_eq!(
            bar.pb.message(),
            "✓ 3 frames (1 environment loads, 1 cached)"
        );
    }

    #[test]
    fn new_trajectory_resets_counters() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        callback(Progress::FramesStart { total: 1 });
        callback(frame(0, EvaluationKind::Loaded));
        callback(Progress::FramesFinish);
        callback(Progress::FramesStart { total: 2 });

        let bar = handler.state.lock().unwrap();
        assert_eq!(bar.loads, 0);
        assert_eq!(bar.pb.position(), 0);
        assert!(!bar.pb.is_finished());
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::FramesStart { total: 1 });
            callback(frame(0, EvaluationKind::Loaded));
            callback(Progress::FramesFinish);
            callback(Progress::ShellClosed);
        })
        .join()
        .unwrap();

        let bar = handler.state.lock().unwrap();
        assert_eq!(bar.loads, 1);
        assert!(bar.pb.is_finished());
    }
}
