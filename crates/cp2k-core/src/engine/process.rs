use super::error::ShellError;
use super::protocol::{self, Command};
use super::transport::ShellTransport;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command as OsCommand, ExitStatus, Stdio};
use tracing::{debug, info, trace, warn};

/// A running CP2K shell connected through its standard input and output.
///
/// The process is started and greeted by [`ShellProcess::start`] and stays alive until
/// [`ShellTransport::shutdown`] or [`ShellTransport::abort`] is called, or the value is
/// dropped.
pub struct ShellProcess {
    command: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    version: f64,
}

impl ShellProcess {
    /// Launches the shell and performs the startup handshake. The command line is split on
    /// whitespace, e.g. `mpiexec -np 4 cp2k_shell.psmp`.
    pub fn start(command: &str) -> Result<Self, ShellError> {
        let mut words = command.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| ShellError::Startup("empty shell command line".to_string()))?;

        info!("Launching CP2K shell: {}", command);
        let mut child = OsCommand::new(program)
            .args(words)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ShellError::Spawn {
                command: command.to_string(),
                source: e,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        let mut process = Self {
            command: command.to_string(),
            child: Some(child),
            stdin,
            stdout,
            version: 0.0,
        };
        if process.stdin.is_none() || process.stdout.is_none() {
            process.abort();
            return Err(ShellError::Startup(
                "failed to capture the shell's standard streams".to_string(),
            ));
        }

        match protocol::handshake(&mut process) {
            Ok(version) => {
                debug!("CP2K shell reports protocol version {}", version);
                process.version = version;
                Ok(process)
            }
            Err(e) => {
                process.abort();
                Err(e)
            }
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn version(&self) -> f64 {
        self.version
    }

    pub fn is_running(&mut self) -> bool {
        self.ensure_alive().is_ok()
    }

    fn ensure_alive(&mut self) -> Result<(), ShellError> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| ShellError::ProcessTerminated("shell is not running".to_string()))?;
        match child.try_wait()? {
            None => Ok(()),
            Some(status) => Err(ShellError::ProcessTerminated(format!(
                "shell exited unexpectedly ({})",
                status
            ))),
        }
    }
}

impl ShellTransport for ShellProcess {
    fn send(&mut self, line: &str) -> Result<(), ShellError> {
        self.ensure_alive()?;
        trace!("Sending: {}", line);
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ShellError::ProcessTerminated("shell input is closed".to_string()))?;
        writeln!(stdin, "{}", line)?;
        stdin.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<String, ShellError> {
        self.ensure_alive()?;
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| ShellError::ProcessTerminated("shell output is closed".to_string()))?;
        let mut line = String::new();
        if stdout.read_line(&mut line)? == 0 {
            return Err(ShellError::ProcessTerminated(
                "shell closed its output".to_string(),
            ));
        }
        let line = line.trim().to_string();
        trace!("Received: {}", line);
        Ok(line)
    }

    fn shutdown(&mut self) -> Result<(), ShellError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if let Some(status) = child.try_wait()? {
            debug!("CP2K shell had already exited before shutdown.");
            self.stdin = None;
            self.stdout = None;
            self.child = None;
            return exit_status_result(status);
        }
        protocol::send_command(self, &Command::Exit)?;
        self.stdin = None;
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        exit_status_result(child.wait()?)
    }

    fn abort(&mut self) {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            warn!("Killing CP2K shell '{}'.", self.command);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn exit_status_result(status: ExitStatus) -> Result<(), ShellError> {
    if status.success() {
        info!("CP2K shell exited cleanly.");
        Ok(())
    } else {
        Err(ShellError::ProcessTerminated(format!(
            "shell exited with {}",
            status
        )))
    }
}

impl Drop for ShellProcess {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}
