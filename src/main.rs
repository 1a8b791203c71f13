mod app;
mod cli;
mod config;
mod db;
mod http;
mod paths;

use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;
use env_logger::{Env, Target};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.runs_tui());
    app::run(cli)
}

/// The TUI owns the terminal for its whole run, so its log lines go to a file.
fn init_logging(to_file: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if to_file {
        builder.target(Target::Pipe(log_sink()));
    }
    builder.init();
}

fn log_sink() -> Box<dyn Write + Send + 'static> {
    match paths::log_file_path().and_then(|path| paths::open_log_file(&path)) {
        Ok(file) => Box::new(file),
        Err(_) => Box::new(io::sink()),
    }
}
