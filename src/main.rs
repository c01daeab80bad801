mod args;
mod forms;

use clap::Parser;
use env_logger::Env;
use log::debug;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
    debug!("args: {:?}", args);

    match forms::run_forms(&args) {
        Ok(report) => {
            let summary = format!(
                "PDF generation complete! Processed: {}, errors: {}",
                report.processed, report.errors
            );
            // Keep stdout for the JSON fields.
            if args.dry_run {
                eprintln!("{}", summary);
            } else {
                println!("{}", summary);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
