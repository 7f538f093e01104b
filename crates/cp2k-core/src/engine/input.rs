use super::config::CalculatorConfig;
use crate::core::input::{InputError, InputSection, parse_input};
use crate::core::models::structure::Structure;
use std::collections::BTreeSet;
use tracing::warn;

/// First line of every generated input file.
pub const GENERATED_MARKER: &str = "!!! Generated by cp2k-shell !!!";

const GTH_FUNCTIONALS: [&str; 5] = ["LDA", "PADE", "BP", "BLYP", "PBE"];
const FALLBACK_POTENTIAL: &str = "GTH-PBE";

/// Builds the complete input file for `structure` from the configured template.
///
/// The template is parsed first, then the calculator settings, coordinates, cell and one
/// `KIND` section per species are merged into it. Settings the template already defines
/// are rejected rather than silently overridden.
pub fn generate_input(
    config: &CalculatorConfig,
    structure: &Structure,
) -> Result<String, InputError> {
    let mut root = parse_input(&config.template)?;

    root.add_keyword("GLOBAL", &format!("PROJECT {}", config.label), true)?;
    root.add_keyword(
        "FORCE_EVAL",
        &format!("METHOD {}", config.force_eval_method),
        true,
    )?;
    root.add_keyword("FORCE_EVAL", "STRESS_TENSOR ANALYTICAL", true)?;
    root.add_keyword("FORCE_EVAL/PRINT/STRESS_TENSOR", "_SECTION_PARAMETERS_ ON", true)?;
    root.add_keyword(
        "FORCE_EVAL/DFT",
        &format!("BASIS_SET_FILE_NAME {}", config.basis_set_file),
        true,
    )?;
    root.add_keyword(
        "FORCE_EVAL/DFT",
        &format!("POTENTIAL_FILE_NAME {}", config.potential_file),
        true,
    )?;
    root.add_keyword(
        "FORCE_EVAL/DFT/XC/XC_FUNCTIONAL",
        &format!("_SECTION_PARAMETERS_ {}", config.xc),
        true,
    )?;
    root.add_keyword(
        "FORCE_EVAL/DFT/MGRID",
        &format!("CUTOFF [eV] {:.20e}", config.cutoff),
        true,
    )?;
    let max_scf = format!("MAX_SCF {}", config.max_scf);
    root.add_keyword("FORCE_EVAL/DFT/SCF", &max_scf, true)?;
    root.add_keyword("FORCE_EVAL/DFT/LS_SCF", &max_scf, true)?;

    if config.uks {
        root.add_keyword("FORCE_EVAL/DFT", "UNRESTRICTED_KOHN_SHAM ON", true)?;
    }
    if config.charge != 0 {
        root.add_keyword("FORCE_EVAL/DFT", &format!("CHARGE {}", config.charge), true)?;
    }
    if !structure.is_periodic() {
        root.add_keyword("FORCE_EVAL/DFT/POISSON", "PERIODIC NONE", true)?;
        root.add_keyword("FORCE_EVAL/DFT/POISSON", "PSOLVER  MT", true)?;
    }

    if root.get_subsection("FORCE_EVAL/SUBSYS")?.is_some() {
        return Err(InputError::SectionExists {
            path: "FORCE_EVAL/SUBSYS".to_string(),
        });
    }

    for (symbol, p) in structure.symbols().iter().zip(structure.positions()) {
        let line = format!("{}  {:.20e}   {:.20e}   {:.20e}", symbol, p.x, p.y, p.z);
        root.add_keyword("FORCE_EVAL/SUBSYS/COORD", &line, false)?;
    }

    root.add_keyword(
        "FORCE_EVAL/SUBSYS/CELL",
        &format!("PERIODIC {}", structure.periodicity_label()),
        true,
    )?;
    let cell = structure.cell();
    for (i, axis) in ["A", "B", "C"].iter().enumerate() {
        let line = format!(
            "{}  {:.20e}  {:.20e}  {:.20e}",
            axis,
            cell[(i, 0)],
            cell[(i, 1)],
            cell[(i, 2)]
        );
        root.add_keyword("FORCE_EVAL/SUBSYS/CELL", &line, true)?;
    }

    let potential = resolve_pseudo_potential(config);
    let species: BTreeSet<&str> = structure.symbols().iter().map(String::as_str).collect();
    // COORD was created above, so the lookup cannot miss.
    if let Some(subsys) = root.get_subsection_mut("FORCE_EVAL/SUBSYS")? {
        for symbol in species {
            let kind = subsys.push_subsection(InputSection::with_parameters("KIND", symbol));
            kind.push_keyword(format!("BASIS_SET {}", config.basis_set));
            kind.push_keyword(format!("POTENTIAL {}", potential));
        }
    }

    let mut lines = vec![GENERATED_MARKER.to_string()];
    lines.extend(root.serialize());
    Ok(lines.join("\n"))
}

/// Resolves `auto` to the GTH pseudo-potential family of the configured functional.
pub fn resolve_pseudo_potential(config: &CalculatorConfig) -> String {
    if !config.pseudo_potential.eq_ignore_ascii_case("auto") {
        return config.pseudo_potential.clone();
    }
    let xc = config.xc.to_uppercase();
    if GTH_FUNCTIONALS.contains(&xc.as_str()) {
        format!("GTH-{}", xc)
    } else {
        warn!(
            "No GTH pseudo-potential matches functional '{}'; falling back to {}.",
            config.xc, FALLBACK_POTENTIAL
        );
        FALLBACK_POTENTIAL.to_string()
    }
}
