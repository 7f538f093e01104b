use cp2k_shell::engine::config as core_config;
use std::path::PathBuf;

pub struct AppConfig {
    pub core_config: core_config::CalculatorConfig,
    /// File the input template was read from, if any.
    pub template_path: Option<PathBuf>,
}
