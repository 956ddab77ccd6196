//! Kodegen Bundler Wheels - container-driven Python wheel builds.
//!
//! This binary builds wheels for every selected (platform, python) target in
//! containers, extracts them, and removes temporary images on exit.

use kodegen_bundler_wheels::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Run CLI and get exit code; the build session is torn down inside run()
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
