use std::io::Write;

use clap::Parser;
use log::debug;
use snafu::ErrorCompat;

mod args;
mod tea;

fn prompt_for_source() -> String {
    print!("Please enter a file path or a URL leading to a spreadsheet: ");
    std::io::stdout().flush().unwrap();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).unwrap();
    line.trim().to_string()
}

fn main() {
    let args = args::Args::parse();
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    debug!("main: args {:?}", args);

    let source = match args.input {
        Some(input) => input,
        None => prompt_for_source(),
    };

    if let Err(e) = tea::run_election(&source, args.seed, args.out, args.reference) {
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
