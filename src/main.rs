mod cli;
mod commands;
mod config;
mod data_source;
mod function;
mod ownership;
mod paths;
mod progress;
mod protected;
mod provider;
mod resource;
mod retry;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use declarative::CancelToken;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Configuration file given on the command line
    pub config: Option<PathBuf>,
    /// Deadline for running operations
    pub timeout: Option<Duration>,
}

impl Context {
    /// The configuration file to use
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(paths::expand(&path.to_string_lossy())),
            None => paths::config_file(),
        }
    }

    /// A fresh cancellation token honoring `--timeout`
    pub fn cancel_token(&self) -> CancelToken {
        match self.timeout {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        timeout: cli.timeout.map(Duration::from_secs),
    };

    match cli.command {
        Command::Plan(args) => commands::lifecycle::plan(&ctx, args),
        Command::Apply(args) => commands::lifecycle::apply(&ctx, args),
        Command::Refresh(args) => commands::lifecycle::refresh(&ctx, args),
        Command::Destroy(args) => commands::lifecycle::destroy(&ctx, args),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Data(cmd) => commands::data::run(&ctx, cmd),
        Command::Fn(cmd) => commands::function::run(&ctx, cmd),
        Command::Schema { json } => commands::schema::run(json),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "utilities", &mut io::stdout());
            Ok(())
        }
    }
}
