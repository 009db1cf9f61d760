mod config;
mod errors;
mod files;
mod logging;
mod mime;
mod security;
mod server;

use crate::config::Config;
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() { eprintln!("--config requires a path"); std::process::exit(2); }
                config_path = Some(PathBuf::from(&args[i]));
            }
            other => { eprintln!("unknown argument: {other}"); std::process::exit(2); }
        }
        i += 1;
    }

    // an explicit --config must exist; the default file is optional
    let cfg = match &config_path {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::load_or_default(&PathBuf::from("cdn-valet.toml")).context("loading config")?,
    };
    cfg.validate().context("validating config")?;
    logging::init(cfg.log.format);

    let state = server::AppState::new(cfg).context("preparing root directory")?;
    let addr = format!("{}:{}", state.cfg.server.bind_addr, state.cfg.server.port);

    info!(
        addr = %addr,
        base_path = %state.cfg.server.base_path,
        route_shape = ?state.cfg.server.route_shape,
        root = %state.resolver.root().display(),
        "cdn-valet ready"
    );

    server::serve(state).await
}
