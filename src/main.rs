mod cli;

use anyhow::Context;
use github_rate_limit_exporter::{app, config::Config};
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::build_cli();
    let matches = cmd.get_matches();
    let log_level = matches.get_one::<String>("log-level").cloned();
    let version_flag = matches.get_flag("version");

    cli::init_logging(log_level.as_deref());

    if version_flag {
        println!("github-rate-limit-exporter {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    info!(
        "GitHub Rate Limit Exporter version {}",
        env!("CARGO_PKG_VERSION")
    );

    let config_path = matches
        .get_one::<String>("config")
        .cloned()
        .unwrap_or_else(|| "config.yaml".to_string());
    let cfg = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    app::run(cfg).await
}
