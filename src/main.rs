use hwmonsvc::config::AppConfig;
use hwmonsvc::logging::init_logging;
use log::error;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration first (without logging)
    let config = match std::env::args_os().nth(1) {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::new(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialise logger with the configured level and target
    init_logging(&config);

    if let Err(e) = hwmonsvc::run(config).await {
        error!("Application error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
