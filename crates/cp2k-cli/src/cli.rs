use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "cp2kdrv - Generate CP2K inputs and evaluate energies, forces and stress through a persistent CP2K shell.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log every line exchanged with the CP2K shell, independent of the verbosity level
    #[arg(long, global = true)]
    pub trace_protocol: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the CP2K input file that would be loaded for a structure.
    Generate(GenerateArgs),
    /// Evaluate one or more structures with a single CP2K shell.
    Evaluate(EvaluateArgs),
}

/// Calculator settings shared by all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct CalculatorArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// CP2K input template the generated settings are merged into.
    #[arg(short, long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Prefix of the generated input and output files, also the CP2K project name.
    #[arg(short, long, value_name = "LABEL")]
    pub label: Option<String>,

    /// Override the exchange-correlation functional.
    #[arg(long, value_name = "NAME")]
    pub xc: Option<String>,

    /// Override the plane-wave cutoff, in eV.
    #[arg(long, value_name = "FLOAT")]
    pub cutoff: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S calculator.max-scf=100
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `generate` subcommand.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path to the structure file (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub structure: PathBuf,

    /// Write the input here instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub calculator: CalculatorArgs,
}

/// Arguments for the `evaluate` subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Structure files (TOML), evaluated in the given order.
    #[arg(short, long, required = true, num_args(1..), value_name = "PATH")]
    pub structure: Vec<PathBuf>,

    /// Shell command line, e.g. "mpiexec -np 4 cp2k_shell.psmp".
    #[arg(long, value_name = "COMMAND")]
    pub command: Option<String>,

    /// Write the results of all structures to a TOML file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub calculator: CalculatorArgs,
}
