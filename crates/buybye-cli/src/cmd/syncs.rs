use crate::output::{print_json, print_table};
use anyhow::Context;
use buybye_core::Sync;
use std::path::Path;

/// List the rule set, or show one rule in full.
pub fn run(config_path: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = crate::config::load(config_path)?;
    let engine = buybye_concepts::engine(config.engine)?;
    let syncs = engine.syncs();

    if let Some(name) = name {
        let sync = syncs
            .iter()
            .find(|s| s.name == name)
            .with_context(|| format!("no sync named '{name}'"))?;
        return show(sync, json);
    }

    if json {
        let list: Vec<_> = syncs.iter().map(describe).collect();
        return print_json(&list);
    }

    let rows = syncs
        .iter()
        .map(|s| {
            let when: Vec<String> = s.when.iter().map(|w| w.action.to_string()).collect();
            let then: Vec<String> = s.then.iter().map(|t| t.action.to_string()).collect();
            vec![s.name.clone(), when.join(", "), then.join(", ")]
        })
        .collect();
    print_table(&["SYNC", "WHEN", "THEN"], rows);
    Ok(())
}

fn show(sync: &Sync, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&describe(sync));
    }
    println!("{}", sync.name);
    println!("  when:");
    for w in &sync.when {
        println!("    {w}");
    }
    if !sync.steps.is_empty() {
        println!("  where:");
        for s in &sync.steps {
            println!("    {s}");
        }
    }
    println!("  then:");
    for t in &sync.then {
        println!("    {t}");
    }
    Ok(())
}

fn describe(sync: &Sync) -> serde_json::Value {
    serde_json::json!({
        "name": sync.name,
        "when": sync.when.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        "where": sync.steps.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        "then": sync.then.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
    })
}
