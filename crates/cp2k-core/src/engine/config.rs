use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

/// Executable launched when no command is configured anywhere.
pub const DEFAULT_COMMAND: &str = "cp2k_shell";
pub const COMMAND_ENV_VAR: &str = "CP2K_SHELL_COMMAND";
/// One Rydberg in eV.
pub const RYDBERG_EV: f64 = 13.605_693_122_994;

static GLOBAL_COMMAND: RwLock<Option<String>> = RwLock::new(None);

/// Sets (or clears) the process-wide default command line used by calculators that do not
/// carry their own.
pub fn set_global_command(command: Option<String>) {
    let mut guard = GLOBAL_COMMAND
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = command;
}

/// Resolves the shell command line.
///
/// Precedence: the per-instance command, the global default, the [`COMMAND_ENV_VAR`]
/// environment variable, and finally [`DEFAULT_COMMAND`].
pub fn resolve_command(instance: Option<&str>) -> String {
    if let Some(command) = instance.filter(|c| !c.trim().is_empty()) {
        return command.to_string();
    }
    let global = GLOBAL_COMMAND
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    if let Some(command) = global.filter(|c| !c.trim().is_empty()) {
        return command;
    }
    match std::env::var(COMMAND_ENV_VAR) {
        Ok(command) if !command.trim().is_empty() => command,
        _ => DEFAULT_COMMAND.to_string(),
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Settings that determine the generated input and the files exchanged with the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorConfig {
    /// Prefix of the `.inp` and `.out` files, also used as the CP2K project name.
    pub label: String,
    pub command: Option<String>,
    pub template: String,
    pub basis_set: String,
    pub basis_set_file: String,
    pub potential_file: String,
    /// Pseudo-potential name, or `auto` to derive it from the XC functional.
    pub pseudo_potential: String,
    pub xc: String,
    /// Cutoff of the finest grid level in eV.
    pub cutoff: f64,
    pub max_scf: u32,
    pub charge: i32,
    /// Request an unrestricted Kohn-Sham calculation.
    pub uks: bool,
    pub force_eval_method: String,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            label: "cp2k".to_string(),
            command: None,
            template: String::new(),
            basis_set: "DZVP-MOLOPT-SR-GTH".to_string(),
            basis_set_file: "BASIS_MOLOPT".to_string(),
            potential_file: "POTENTIAL".to_string(),
            pseudo_potential: "auto".to_string(),
            xc: "LDA".to_string(),
            cutoff: 400.0 * RYDBERG_EV,
            max_scf: 50,
            charge: 0,
            uks: false,
            force_eval_method: "Quickstep".to_string(),
        }
    }
}

impl CalculatorConfig {
    pub fn input_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.inp", self.label))
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.out", self.label))
    }

    pub fn resolved_command(&self) -> String {
        resolve_command(self.command.as_deref())
    }
}

#[derive(Default)]
pub struct CalculatorConfigBuilder {
    label: Option<String>,
    command: Option<String>,
    template: Option<String>,
    basis_set: Option<String>,
    basis_set_file: Option<String>,
    potential_file: Option<String>,
    pseudo_potential: Option<String>,
    xc: Option<String>,
    cutoff: Option<f64>,
    max_scf: Option<u32>,
    charge: Option<i32>,
    uks: Option<bool>,
    force_eval_method: Option<String>,
}

impl CalculatorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
    pub fn basis_set(mut self, basis_set: impl Into<String>) -> Self {
        self.basis_set = Some(basis_set.into());
        self
    }
    pub fn basis_set_file(mut self, file: impl Into<String>) -> Self {
        self.basis_set_file = Some(file.into());
        self
    }
    pub fn potential_file(mut self, file: impl Into<String>) -> Self {
        self.potential_file = Some(file.into());
        self
    }
    pub fn pseudo_potential(mut self, potential: impl Into<String>) -> Self {
        self.pseudo_potential = Some(potential.into());
        self
    }
    pub fn xc(mut self, xc: impl Into<String>) -> Self {
        self.xc = Some(xc.into());
        self
    }
    pub fn cutoff(mut self, cutoff_ev: f64) -> Self {
        self.cutoff = Some(cutoff_ev);
        self
    }
    pub fn max_scf(mut self, max_scf: u32) -> Self {
        self.max_scf = Some(max_scf);
        self
    }
    pub fn charge(mut self, charge: i32) -> Self {
        self.charge = Some(charge);
        self
    }
    pub fn uks(mut self, uks: bool) -> Self {
        self.uks = Some(uks);
        self
    }
    pub fn force_eval_method(mut self, method: impl Into<String>) -> Self {
        self.force_eval_method = Some(method.into());
        self
    }

    pub fn build(self) -> Result<CalculatorConfig, ConfigError> {
        let defaults = CalculatorConfig::default();
        let config = CalculatorConfig {
            label: self.label.unwrap_or(defaults.label),
            command: self.command.or(defaults.command),
            template: self.template.unwrap_or(defaults.template),
            basis_set: self.basis_set.unwrap_or(defaults.basis_set),
            basis_set_file: self.basis_set_file.unwrap_or(defaults.basis_set_file),
            potential_file: self.potential_file.unwrap_or(defaults.potential_file),
            pseudo_potential: self.pseudo_potential.unwrap_or(defaults.pseudo_potential),
            xc: self.xc.unwrap_or(defaults.xc),
            cutoff: self.cutoff.unwrap_or(defaults.cutoff),
            max_scf: self.max_scf.unwrap_or(defaults.max_scf),
            charge: self.charge.unwrap_or(defaults.charge),
            uks: self.uks.unwrap_or(defaults.uks),
            force_eval_method: self.force_eval_method.unwrap_or(defaults.force_eval_method),
        };
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &CalculatorConfig) -> Result<(), ConfigError> {
    // File paths travel inside a space-separated protocol line.
    if config.label.is_empty() || config.label.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidParameter {
            name: "label",
            reason: format!("'{}' must be non-empty and free of whitespace", config.label),
        });
    }
    if !(config.cutoff.is_finite() && config.cutoff > 0.0) {
        return Err(ConfigError::InvalidParameter {
            name: "cutoff",
            reason: format!("{} is not a positive energy", config.cutoff),
        });
    }
    if config.max_scf == 0 {
        return Err(ConfigError::InvalidParameter {
            name: "max_scf",
            reason: "must be at least 1".to_string(),
        });
    }
    for (name, value) in [
        ("basis_set", &config.basis_set),
        ("xc", &config.xc),
        ("pseudo_potential", &config.pseudo_potential),
        ("force_eval_method", &config.force_eval_method),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name,
                reason: "must not be empty".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn builder_fills_in_defaults() {
        let config = CalculatorConfigBuilder::new().build().unwrap();
        assert_eq!(config, CalculatorConfig::default());
        assert_eq!(config.basis_set, "DZVP-MOLOPT-SR-GTH");
        assert_eq!(config.max_scf, 50);
        assert!((config.cutoff - 5442.277249).abs() < 1e-3);
    }

    #[test]
    fn builder_overrides_selected_fields() {
        let config = CalculatorConfigBuilder::new()
            .label("runs/h2")
            .xc("PBE")
            .max_scf(30)
            .charge(-1)
            .uks(true)
            .build()
            .unwrap();
        assert_eq!(config.label, "runs/h2");
        assert_eq!(config.xc, "PBE");
        assert_eq!(config.max_scf, 30);
        assert_eq!(config.charge, -1);
        assert!(config.uks);
        assert_eq!(config.input_path(), PathBuf::from("runs/h2.inp"));
        assert_eq!(config.output_path(), PathBuf::from("runs/h2.out"));
    }

    #[test]
    fn builder_rejects_invalid_values() {
        assert!(matches!(
            CalculatorConfigBuilder::new().label("my run").build(),
            Err(ConfigError::InvalidParameter { name: "label", .. })
        ));
        assert!(matches!(
            CalculatorConfigBuilder::new().cutoff(-1.0).build(),
            Err(ConfigError::InvalidParameter { name: "cutoff", .. })
        ));
        assert!(matches!(
            CalculatorConfigBuilder::new().max_scf(0).build(),
            Err(ConfigError::InvalidParameter { name: "max_scf", .. })
        ));
        assert!(matches!(
            CalculatorConfigBuilder::new().xc(" ").build(),
            Err(ConfigError::InvalidParameter { name: "xc", .. })
        ));
    }

    #[test]
    #[serial]
    fn resolve_command_honours_precedence() {
        set_global_command(None);
        unsafe { std::env::remove_var(COMMAND_ENV_VAR) };
        assert_eq!(resolve_command(None), DEFAULT_COMMAND);

        unsafe { std::env::set_var(COMMAND_ENV_VAR, "mpiexec -np 2 cp2k_shell.psmp") };
        assert_eq!(resolve_command(None), "mpiexec -np 2 cp2k_shell.psmp");

        set_global_command(Some("cp2k_shell.ssmp".to_string()));
        assert_eq!(resolve_command(None), "cp2k_shell.ssmp");

        assert_eq!(resolve_command(Some("my_shell")), "my_shell");
        assert_eq!(resolve_command(Some("  ")), "cp2k_shell.ssmp");

        set_global_command(None);
        unsafe { std::env::remove_var(COMMAND_ENV_VAR) };
    }
}
