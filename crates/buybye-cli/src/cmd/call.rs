use crate::output::print_json;
use anyhow::Context;
use buybye_core::value::as_record;
use buybye_core::{Record, Route, Value};
use buybye_server::state::AppState;
use std::path::Path;

/// Serve one call in-process against fresh concept state, exactly as the
/// server would route it.
pub fn run(config_path: &Path, route: &str, body: Option<&str>, trace: bool) -> anyhow::Result<()> {
    let config = crate::config::load(config_path)?;
    let state = AppState::from_config(&config)?;
    let args = match body {
        Some(text) => {
            let value: Value = serde_json::from_str(text).context("--body is not valid JSON")?;
            as_record(value)?
        }
        None => Record::new(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match state.routes.resolve(route) {
            Some(Route::Direct(action)) => {
                let reply = match state.engine.call_direct(&action, &args).await? {
                    Ok(value) => value,
                    Err(failure) => serde_json::json!({ "error": failure.0 }),
                };
                print_json(&reply)
            }
            Some(Route::Request { path }) => {
                let outcome = state.engine.handle_request(&path, args).await;
                if trace {
                    if let Some(report) = &outcome.report {
                        eprintln!("{}", serde_json::to_string_pretty(report)?);
                    }
                }
                let payload = outcome
                    .result
                    .with_context(|| format!("request {} failed", outcome.request))?;
                print_json(&payload)
            }
            None => anyhow::bail!(
                "'{route}' is not under base url '{}'",
                state.routes.base_url()
            ),
        }
    })
}
