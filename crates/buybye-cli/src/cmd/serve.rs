use anyhow::Result;
use std::path::Path;

pub fn run(config_path: &Path, port: Option<u16>) -> Result<()> {
    let mut config = crate::config::load(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let warnings = config.validate();
    for w in &warnings {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }
    if buybye_core::Config::has_errors(&warnings) {
        anyhow::bail!("config validation found errors; run `buybye check` for details");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(buybye_server::serve(&config))
}
