use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("github-rate-limit-exporter")
        .about("Prometheus exporter for GitHub API rate limits")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .num_args(1)
                .default_value("config.yaml")
                .help("Path to configuration file (supports .yaml, .yml, .toml, .hcl)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

pub fn init_logging(level: Option<&str>) {
    // Explicit level wins, then RUST_LOG, then info.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.init();
}
