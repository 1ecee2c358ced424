//! CueFlow - run sheets for live-event shows

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = cueflow::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
