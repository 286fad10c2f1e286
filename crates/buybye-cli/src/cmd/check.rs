use crate::output::print_json;
use buybye_core::{Config, WarnLevel};
use std::path::Path;

/// Validate the config file, then build the engine so every rule is
/// checked against the registered concepts.
pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = crate::config::load(config_path)?;
    let warnings = config.validate();

    let engine = if Config::has_errors(&warnings) {
        None
    } else {
        Some(buybye_concepts::engine(config.engine.clone())?)
    };

    if json {
        let value = serde_json::json!({
            "config": config_path.display().to_string(),
            "warnings": warnings,
            "concepts": engine.as_ref().map(|e| e.registry().concept_names().count()),
            "syncs": engine.as_ref().map(|e| e.syncs().len()),
        });
        print_json(&value)?;
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
        if let Some(engine) = &engine {
            println!(
                "{} concepts, {} syncs: all rules validate.",
                engine.registry().concept_names().count(),
                engine.syncs().len()
            );
        }
    }

    if engine.is_none() {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
