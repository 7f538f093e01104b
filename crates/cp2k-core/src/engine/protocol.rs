use super::error::ShellError;
use super::transport::ShellTransport;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Sent by the shell whenever it is idle and waiting for the next command.
pub const READY: &str = "* READY";
/// Terminates a multi-line reply from the shell.
pub const REPLY_END: &str = "* END";
/// Terminates multi-line data sent to the shell.
pub const DATA_END: &str = "*END";
pub const SHELL_NAME: &str = "CP2K Shell Version";
pub const MIN_SHELL_VERSION: f64 = 1.0;

/// Identifier of a force environment living inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForceEnvId(u32);

impl ForceEnvId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ForceEnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commands understood by the CP2K shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    Version,
    UnitsEvA,
    Load { input: &'a Path, output: &'a Path },
    Destroy(ForceEnvId),
    SetCell(ForceEnvId),
    SetPositions(ForceEnvId),
    EvalEnergyForces(ForceEnvId),
    GetEnergy(ForceEnvId),
    GetForces(ForceEnvId),
    GetStress(ForceEnvId),
    Exit,
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Version => write!(f, "VERSION"),
            Command::UnitsEvA => write!(f, "UNITS_EV_A"),
            Command::Load { input, output } => {
                write!(f, "LOAD {} {}", input.display(), output.display())
            }
            Command::Destroy(id) => write!(f, "DESTROY {}", id),
            Command::SetCell(id) => write!(f, "SET_CELL {}", id),
            Command::SetPositions(id) => write!(f, "SET_POS {}", id),
            Command::EvalEnergyForces(id) => write!(f, "EVAL_EF {}", id),
            Command::GetEnergy(id) => write!(f, "GET_E {}", id),
            Command::GetForces(id) => write!(f, "GET_F {}", id),
            Command::GetStress(id) => write!(f, "GET_STRESS {}", id),
            Command::Exit => write!(f, "EXIT"),
        }
    }
}

/// Formats a real with 17 significant digits, enough to round-trip any `f64`.
pub fn format_real(value: f64) -> String {
    format!("{:.16e}", value)
}

pub fn format_reals(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_real(*v))
        .collect::<Vec<_>>()
        .join("   ")
}

pub fn send_command<T: ShellTransport + ?Sized>(
    transport: &mut T,
    command: &Command<'_>,
) -> Result<(), ShellError> {
    transport.send(&command.to_string())
}

pub fn expect_line<T: ShellTransport + ?Sized>(
    transport: &mut T,
    expected: &str,
) -> Result<(), ShellError> {
    let line = transport.receive()?;
    if line == expected {
        Ok(())
    } else {
        Err(ShellError::protocol(format!("'{}'", expected), line))
    }
}

pub fn expect_ready<T: ShellTransport + ?Sized>(transport: &mut T) -> Result<(), ShellError> {
    expect_line(transport, READY)
}

pub fn receive_value<T, V>(transport: &mut T, what: &str) -> Result<V, ShellError>
where
    T: ShellTransport + ?Sized,
    V: FromStr,
{
    let line = transport.receive()?;
    line.trim()
        .parse()
        .map_err(|_| ShellError::protocol(what.to_string(), line))
}

/// Reads one line holding exactly `count` whitespace-separated reals.
pub fn receive_reals<T: ShellTransport + ?Sized>(
    transport: &mut T,
    count: usize,
    what: &str,
) -> Result<Vec<f64>, ShellError> {
    let line = transport.receive()?;
    parse_reals(&line, count).ok_or_else(|| {
        ShellError::protocol(format!("{} ({} real numbers)", what, count), line)
    })
}

fn parse_reals(line: &str, count: usize) -> Option<Vec<f64>> {
    let values = line
        .split_whitespace()
        .map(|token| token.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (values.len() == count).then_some(values)
}

/// Parses the identifier returned by `LOAD`. Only positive integers are valid.
pub fn parse_force_env_id(line: &str) -> Result<ForceEnvId, ShellError> {
    match line.trim().parse::<i64>() {
        Ok(id) if id > 0 => u32::try_from(id)
            .map(ForceEnvId)
            .map_err(|_| ShellError::protocol("a force environment id", line)),
        _ => Err(ShellError::protocol(
            "a positive force environment id",
            line,
        )),
    }
}

/// Parses the reply to `VERSION`, e.g. `CP2K Shell Version: 2.0`.
pub fn parse_version(line: &str) -> Result<f64, ShellError> {
    let (name, version) = line
        .rsplit_once(':')
        .ok_or_else(|| ShellError::Startup(format!("malformed version reply '{}'", line)))?;
    if name.trim() != SHELL_NAME {
        return Err(ShellError::Startup(format!(
            "expected '{}', got '{}'",
            SHELL_NAME,
            name.trim()
        )));
    }
    let version: f64 = version
        .trim()
        .parse()
        .map_err(|_| ShellError::Startup(format!("unreadable shell version '{}'", version)))?;
    if version < MIN_SHELL_VERSION {
        return Err(ShellError::Startup(format!(
            "shell version {} is older than the supported minimum {}",
            version, MIN_SHELL_VERSION
        )));
    }
    Ok(version)
}

/// Startup handshake: ready marker, `VERSION` reply, ready marker.
pub fn handshake<T: ShellTransport + ?Sized>(transport: &mut T) -> Result<f64, ShellError> {
    let greeting = transport.receive()?;
    if greeting != READY {
        return Err(ShellError::Startup(format!(
            "expected '{}' on startup, got '{}'",
            READY, greeting
        )));
    }
    send_command(transport, &Command::Version)?;
    let version = parse_version(&transport.receive()?)?;
    let ready = transport.receive()?;
    if ready != READY {
        return Err(ShellError::Startup(format!(
            "expected '{}' after version query, got '{}'",
            READY, ready
        )));
    }
    Ok(version)
}
