use std::io;
use std::process::ExitCode;

use lxcportd::{ForkSupervisor, SystemConfigLoader, bootstrap_with, native};
use tracing::{error, info};

fn main() -> ExitCode {
    let port = match bootstrap_with(
        &SystemConfigLoader,
        native::default_library(),
        Box::new(ForkSupervisor),
    ) {
        Ok(port) => port,
        Err(error) => {
            // Telemetry may not be installed yet.
            eprintln!("lxcportd: {error}");
            return ExitCode::FAILURE;
        }
    };

    match port.serve(io::stdin().lock(), io::stdout()) {
        Ok(served) => {
            info!(served, "channel closed");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, "channel failed");
            ExitCode::FAILURE
        }
    }
}
