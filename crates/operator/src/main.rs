use std::panic;
use std::process::ExitCode;

use shared::config::Config;

use operator::{setup_logging, ArgsError, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::from_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(ArgsError::Display(e)) => e.exit(),
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(err.status());
        }
    };

    // An unknown network is reported by the command itself; log to console only.
    let log_dir = Config::resolve(cli.network.as_deref())
        .ok()
        .map(|config| config.log_dir);
    if let Err(e) = setup_logging(&cli.log_level, log_dir.as_deref()) {
        eprintln!("Warning: Failed to initialize logging: {e}. Using default logging.");
    }

    panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .unwrap_or_else(|| panic::Location::caller());
        let message = match panic_info.payload().downcast_ref::<&str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => s.as_str(),
                None => "Unknown panic payload",
            },
        };

        log::error!(
            "PANIC: '{message}' at {}:{}",
            location.file(),
            location.line()
        );
    }));

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e
                .downcast_ref::<shared::Error>()
                .map_or("internal", |err| err.kind().as_str());
            log::error!("{kind} error: {e:#}");
            eprintln!("error [{kind}]: {e:#}");
            ExitCode::FAILURE
        }
    }
}
