// src/main.rs

use stackctl::config::SettingsLoader;
use stackctl::{cli, effective_settings, log_sources, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let loader = SettingsLoader::new();
    let settings = match loader.get() {
        Ok(settings) => effective_settings(&args, settings),
        Err(err) => {
            eprintln!("stackctl error: {err}");
            std::process::exit(err.exit_code());
        }
    };

    let level = match logging::init_logging(log_sources(&args, &settings)) {
        Ok(level) => level,
        Err(err) => {
            eprintln!("stackctl error: {err:?}");
            std::process::exit(1);
        }
    };

    match run(args, settings, level).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "fatal error");
            eprintln!("stackctl error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
