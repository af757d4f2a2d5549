use clap::Parser;
use log::{LevelFilter, debug};
use std::str::FromStr;
use strom_layout::cli::Args;

fn main() {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            args.log_level
        );
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
    debug!(args:? = args; "Parsed arguments");

    if let Err(err) = strom_layout::run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
