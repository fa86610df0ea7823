use matrix_ci::cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Detect the system locale before the CLI is built.
    matrix_ci::init();

    match cli::run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
