use clap::Args;
use libtracecap_live::{CancelToken, Capture, CaptureConfig, Output};
use libtracecap_tools::{Config, Error};
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Interface to capture on (repeat for several interfaces)
    #[arg(short, long = "interface", value_name = "IFACE")]
    interfaces: Vec<String>,

    /// Output file (`-` for stdout). Packets are discarded if absent.
    #[arg(short = 'w', long)]
    write: Option<String>,

    /// Output format: pcap or pcapng
    #[arg(short = 'F', long)]
    format: Option<String>,

    /// Snapshot length
    #[arg(short, long)]
    snaplen: Option<u32>,

    /// Socket receive buffer size, in bytes
    #[arg(short = 'B', long)]
    buffer_size: Option<u64>,

    /// Do not put the interfaces in promiscuous mode
    #[arg(long)]
    no_promisc: bool,

    /// Read timeout in milliseconds (0: block)
    #[arg(long)]
    timeout_ms: Option<i64>,

    /// BPF program, as printed by `tcpdump -ddd`
    #[arg(long)]
    filter_file: Option<String>,

    /// Read through a memory-mapped TPACKET_V3 ring
    #[arg(long)]
    tpacket_v3: bool,

    /// Timestamp precision of the output: micro or nano
    #[arg(long)]
    precision: Option<String>,
}

pub fn run(args: CaptureArgs, config: &mut Config) -> Result<(), Error> {
    // override config options from command-line arguments
    if !args.interfaces.is_empty() {
        let names: Vec<_> = args.interfaces.iter().map(String::as_str).collect();
        config.set("capture.interfaces", names);
    }
    if let Some(f) = args.format.as_deref() {
        config.set("capture.format", f);
    }
    if let Some(s) = args.snaplen {
        config.set("capture.snaplen", i64::from(s));
    }
    if let Some(b) = args.buffer_size {
        let b = i64::try_from(b)
            .map_err(|_| Error::Config(format!("buffer size {} out of range", b)))?;
        config.set("capture.buffer_size", b);
    }
    if args.no_promisc {
        config.set("capture.promiscuous", false);
    }
    if let Some(t) = args.timeout_ms {
        config.set("capture.timeout_ms", t);
    }
    if let Some(f) = args.filter_file.as_deref() {
        config.set("capture.filter_file", f);
    }
    if args.tpacket_v3 {
        config.set("capture.tpacket_v3", true);
    }
    if let Some(p) = args.precision.as_deref() {
        config.set("capture.precision", p);
    }

    let mut capture_config = CaptureConfig::from_config(config)?;
    // an explicit output replaces whatever the configuration file selected
    match args.write.as_deref() {
        Some("-") => capture_config.output = Output::Writer(Box::new(io::stdout())),
        Some(path) => capture_config.output = Output::Path(PathBuf::from(path)),
        None => (),
    }
    debug!("capture configuration: {:?}", capture_config);

    let capture = Capture::open(capture_config)?;
    let cancel = CancelToken::new();
    let token = cancel.clone();
    ctrlc::set_handler(move || token.cancel())
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;

    info!("capturing on {}", capture.source_names().join(", "));
    capture.run(&cancel)?;
    info!("capture done");
    Ok(())
}
