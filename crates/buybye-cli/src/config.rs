use anyhow::Context;
use buybye_core::Config;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "buybye.yaml";

/// Resolve the config file path.
///
/// Priority:
/// 1. `--config` flag / `BUYBYE_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `buybye.yaml`
/// 3. Fall back to `cwd/buybye.yaml`
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut dir = cwd.clone();
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return candidate;
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => break,
        }
    }

    cwd.join(CONFIG_FILE)
}

/// Load the config at `path`, falling back to defaults when it is absent.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(path).with_context(|| format!("failed to load {}", path.display()))
}
