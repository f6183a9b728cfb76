use crate::input::{open_input, open_output};
use clap::Args;
use libtracecap_tools::bpf::{BpfProgram, BpfVm};
use libtracecap_tools::{filter_copy, Config, Error};
use std::fs;

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// BPF program file, as printed by `tcpdump -ddd`
    #[arg(short = 'f', long, conflicts_with = "filter")]
    filter_file: Option<String>,

    /// BPF program text (`-ddd` format, instructions separated by newlines or `;`)
    #[arg(long)]
    filter: Option<String>,

    /// Input trace (`-` for stdin)
    input: String,

    /// Output trace (`-` for stdout)
    output: String,
}

fn load_program(args: &FilterArgs, config: &Config) -> Result<BpfProgram, Error> {
    let text = match (args.filter_file.as_deref(), args.filter.as_deref()) {
        (Some(path), _) => fs::read_to_string(path)?,
        (None, Some(text)) => text.replace(';', "\n"),
        (None, None) => match config.get("capture.filter_file") {
            Some(path) => fs::read_to_string(path)?,
            None => {
                return Err(Error::Config(
                    "a BPF program is required (--filter-file or --filter)".to_owned(),
                ))
            }
        },
    };
    BpfProgram::from_ddd(&text)
}

pub fn run(args: FilterArgs, config: &Config) -> Result<(), Error> {
    let program = load_program(&args, config)?;
    let vm = BpfVm::new(program)?;
    debug!("filter program: {} instructions", vm.program().len());

    let input = open_input(&args.input)?;
    let output = open_output(&args.output)?;
    let count = filter_copy(input, output, &vm)?;
    info!("{}: {} packets written", args.output, count);
    Ok(())
}
