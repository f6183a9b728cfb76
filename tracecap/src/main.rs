#![warn(clippy::all)]

#[macro_use]
extern crate tracing;

use clap::{crate_version, Parser, Subcommand};
use std::fs::File;
use std::io;
use std::path::Path;
use std::process;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use libtracecap_tools::{Config, Error};

mod commands;
mod input;

/// Live capture and trace file tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<String>,

    /// Be verbose
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture packets from one or more interfaces
    Capture(commands::capture::CaptureArgs),
    /// Copy a trace, keeping packets accepted by a BPF program
    Filter(commands::filter::FilterArgs),
    /// Display information about a trace file
    Info(commands::info::InfoArgs),
    /// Print the decoded layers of every packet
    Decode(commands::decode::DecodeArgs),
    /// Display link state of an interface
    Link(commands::link::LinkArgs),
}

fn load_config(config: &mut Config, filename: &str) -> Result<(), io::Error> {
    debug!("Loading configuration {filename}");
    let path = Path::new(&filename);
    let file = File::open(path)?;
    config.load_config(file)
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::try_from_env("TRACECAP_LOG")
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    let builder = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn run(args: Args) -> Result<(), Error> {
    let mut config = Config::default();
    if let Some(filename) = args.config.as_deref() {
        load_config(&mut config, filename)?;
    }
    match args.command {
        Command::Capture(a) => commands::capture::run(a, &mut config),
        Command::Filter(a) => commands::filter::run(a, &config),
        Command::Info(a) => commands::info::run(a),
        Command::Decode(a) => commands::decode::run(a, &mut config),
        Command::Link(a) => commands::link::run(a),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.log_json);
    debug!("tracecap {}", crate_version!());

    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}
