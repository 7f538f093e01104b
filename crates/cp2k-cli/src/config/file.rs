use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCalculatorConfig {
    pub label: Option<String>,
    pub template: Option<String>,
    pub template_file: Option<PathBuf>,
    pub basis_set: Option<String>,
    pub basis_set_file: Option<String>,
    pub potential_file: Option<String>,
    pub pseudo_potential: Option<String>,
    pub xc: Option<String>,
    pub cutoff: Option<f64>,
    pub max_scf: Option<u32>,
    pub charge: Option<i32>,
    pub uks: Option<bool>,
    pub force_eval_method: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileShellConfig {
    pub command: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub calculator: Option<FileCalculatorConfig>,
    pub shell: Option<FileShellConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: FileConfig =
            toml::from_str(&content).map_err(|e| CliError::FileParsing {
                path: path.to_path_buf(),
                source: e.into(),
            })?;

        // Template paths in the file are relative to the file itself.
        if let Some(template_file) = config
            .calculator
            .as_mut()
            .and_then(|c| c.template_file.as_mut())
        {
            if template_file.is_relative() {
                if let Some(dir) = path.parent() {
                    *template_file = dir.join(&*template_file);
                }
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_full_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cp2k.toml");
        fs::write(
            &path,
            r#"
            [calculator]
            label = "runs/water"
            template-file = "templates/base.inp"
            basis-set = "TZV2P-GTH"
            xc = "PBE"
            cutoff = 6000.0
            max-scf = 80
            charge = 1
            uks = true

            [shell]
            command = "mpiexec -np 4 cp2k_shell.psmp"
            "#,
        )
        .unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        let calculator = config.calculator.unwrap();
        assert_eq!(calculator.label.as_deref(), Some("runs/water"));
        assert_eq!(
            calculator.template_file,
            Some(dir.path().join("templates/base.inp"))
        );
        assert_eq!(calculator.basis_set.as_deref(), Some("TZV2P-GTH"));
        assert_eq!(calculator.max_scf, Some(80));
        assert_eq!(calculator.uks, Some(true));
        assert_eq!(
            config.shell.unwrap().command.as_deref(),
            Some("mpiexec -np 4 cp2k_shell.psmp")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cp2k.toml");
        fs::write(&path, "[calculator]\nfunctional = \"PBE\"\n").unwrap();
        assert!(matches!(
            FileConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FileConfig::from_file(&dir.path().join("absent.toml")),
            Err(CliError::Io(_))
        ));
    }
}
