use crate::cli::GenerateArgs;
use crate::config::build_config;
use crate::error::Result;
use cp2k_shell::core::models::structure::Structure;
use cp2k_shell::engine::input::generate_input;
use std::io::Write;
use tracing::info;

pub fn run(args: GenerateArgs) -> Result<()> {
    let app = build_config(&args.calculator, None)?;
    if let Some(path) = &app.template_path {
        info!("Using input template {:?}", path);
    }

    info!("Loading structure from {:?}", &args.structure);
    let structure = Structure::load(&args.structure)?;

    let input = generate_input(&app.core_config, &structure)?;

    match &args.output {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, format!("{}\n", input))?;
            info!("Wrote CP2K input for {} atoms to {:?}", structure.len(), path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", input)?;
        }
    }
    Ok(())
}
