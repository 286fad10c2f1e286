use crate::output::{print_json, print_table};
use buybye_server::state::AppState;
use std::path::Path;

/// List every concept operation with how the server would serve it.
pub fn run(config_path: &Path, direct_only: bool, json: bool) -> anyhow::Result<()> {
    let config = crate::config::load(config_path)?;
    let state = AppState::from_config(&config)?;
    let entries: Vec<_> = state
        .routes
        .entries(state.engine.registry())
        .into_iter()
        .filter(|e| !direct_only || e.direct)
        .collect();

    if json {
        return print_json(&entries);
    }

    let rows = entries
        .into_iter()
        .map(|e| {
            vec![
                e.route,
                e.kind.to_string(),
                if e.direct { "direct" } else { "rules" }.to_string(),
                e.justification.unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["ROUTE", "LIST", "SERVED BY", "JUSTIFICATION"], rows);
    Ok(())
}
