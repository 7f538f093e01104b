use super::file::{FileCalculatorConfig, FileConfig};
use super::models::AppConfig;
use crate::cli::CalculatorArgs;
use crate::error::{CliError, Result};
use cp2k_shell::engine::config as core_config;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Merges CLI flags, `-S` overrides, the configuration file and the library defaults.
///
/// `command` is the shell command line given on the command line, if any; it takes
/// precedence over `shell.command` from the file.
pub fn build_config(args: &CalculatorArgs, command: Option<&str>) -> Result<AppConfig> {
    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;
    let calc = file_config.calculator.take().unwrap_or_default();
    let shell = file_config.shell.take().unwrap_or_default();

    let (template, template_path) = resolve_template(args, &calc)?;

    let mut builder = core_config::CalculatorConfigBuilder::new().template(template);

    if let Some(label) = args.label.clone().or(calc.label) {
        builder = builder.label(label);
    }
    if let Some(command) = command.map(str::to_string).or(shell.command) {
        builder = builder.command(command);
    }
    if let Some(xc) = args.xc.clone().or(calc.xc) {
        builder = builder.xc(xc);
    }
    if let Some(cutoff) = args.cutoff.or(calc.cutoff) {
        builder = builder.cutoff(cutoff);
    }
    if let Some(basis_set) = calc.basis_set {
        builder = builder.basis_set(basis_set);
    }
    if let Some(file) = calc.basis_set_file {
        builder = builder.basis_set_file(file);
    }
    if let Some(file) = calc.potential_file {
        builder = builder.potential_file(file);
    }
    if let Some(potential) = calc.pseudo_potential {
        builder = builder.pseudo_potential(potential);
    }
    if let Some(max_scf) = calc.max_scf {
        builder = builder.max_scf(max_scf);
    }
    if let Some(charge) = calc.charge {
        builder = builder.charge(charge);
    }
    if let Some(uks) = calc.uks {
        builder = builder.uks(uks);
    }
    if let Some(method) = calc.force_eval_method {
        builder = builder.force_eval_method(method);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    debug!("Final calculator configuration: {:?}", core_config);

    Ok(AppConfig {
        core_config,
        template_path,
    })
}

fn resolve_template(
    args: &CalculatorArgs,
    calc: &FileCalculatorConfig,
) -> Result<(String, Option<PathBuf>)> {
    if calc.template.is_some() && calc.template_file.is_some() {
        return Err(CliError::Config(
            "`calculator.template` and `calculator.template-file` are mutually exclusive"
                .to_string(),
        ));
    }
    let path = args.template.clone().or_else(|| calc.template_file.clone());
    match path {
        Some(path) => {
            debug!("Reading input template from {:?}", path);
            let text = std::fs::read_to_string(&path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })?;
            Ok((text, Some(path)))
        }
        None => Ok((calc.template.clone().unwrap_or_default(), None)),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        if key == "shell.command" {
            config.shell.get_or_insert_with(Default::default).command =
                Some(value_str.to_string());
            continue;
        }

        let calc = config.calculator.get_or_insert_with(Default::default);
        match key {
            "calculator.label" => calc.label = Some(value_str.to_string()),
            "calculator.basis-set" => calc.basis_set = Some(value_str.to_string()),
            "calculator.basis-set-file" => calc.basis_set_file = Some(value_str.to_string()),
            "calculator.potential-file" => calc.potential_file = Some(value_str.to_string()),
            "calculator.pseudo-potential" => {
                calc.pseudo_potential = Some(value_str.to_string())
            }
            "calculator.xc" => calc.xc = Some(value_str.to_string()),
            "calculator.force-eval-method" => {
                calc.force_eval_method = Some(value_str.to_string())
            }
            "calculator.cutoff" => calc.cutoff = Some(parse_value(key, value_str, "float")?),
            "calculator.max-scf" => calc.max_scf = Some(parse_value(key, value_str, "integer")?),
            "calculator.charge" => calc.charge = Some(parse_value(key, value_str, "integer")?),
            "calculator.uks" => calc.uks = Some(parse_value(key, value_str, "boolean")?),
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
