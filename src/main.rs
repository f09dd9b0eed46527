use clap::Parser;
use sortdesk::cli::{Cli, run};
use sortdesk::config::Config;
use sortdesk::logging;
use sortdesk::output::OutputFormatter;

fn main() {
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = match Config::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::error(&format!("Error loading configuration: {}", e));
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config.log_level, config.log_file.as_deref()) {
        OutputFormatter::warning(&e.to_string());
    }
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    if let Err(e) = run(cli.command, config, &config_path) {
        OutputFormatter::error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}
