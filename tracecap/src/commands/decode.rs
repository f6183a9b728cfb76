use crate::input::open_input;
use clap::Args;
use libtracecap_decoder::PacketDecoder;
use libtracecap_tools::{Config, Error, Packet, PacketAnalyzer, ParseContext, TraceEngine};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Stop after COUNT packets
    #[arg(short = 'n', long, value_name = "COUNT")]
    count: Option<u64>,

    /// Input trace (`-` for stdin)
    input: String,
}

/// Prints one line per packet: index, relative time, length and layer chain
struct DecodePrinter<W: Write> {
    decoder: PacketDecoder,
    out: W,
    num_errors: usize,
}

impl<W: Write> DecodePrinter<W> {
    fn new(out: W) -> Self {
        DecodePrinter {
            decoder: PacketDecoder::default(),
            out,
            num_errors: 0,
        }
    }

    fn describe(&mut self, packet: &Packet, ctx: &ParseContext) -> String {
        let first = match PacketDecoder::first_layer(ctx.link_type, &packet.data) {
            Some(l) => l,
            None => return format!("link type {} not decoded", ctx.link_type),
        };
        match self.decoder.decode_from(first, &packet.data) {
            Ok(decoded) => {
                let mut s = decoded
                    .layers()
                    .iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>()
                    .join(" | ");
                if let Some(e) = &decoded.error {
                    self.num_errors += 1;
                    s.push_str(&format!(" | [{}]", e));
                }
                s
            }
            Err(e) => {
                self.num_errors += 1;
                format!("[{}]", e)
            }
        }
    }
}

impl<W: Write> PacketAnalyzer for DecodePrinter<W> {
    fn handle_packet(&mut self, packet: &Packet, ctx: &ParseContext) -> Result<(), Error> {
        let line = self.describe(packet, ctx);
        writeln!(
            self.out,
            "{} {}.{:06} {} {}",
            ctx.packet_index,
            ctx.rel_ts.as_secs(),
            ctx.rel_ts.subsec_micros(),
            packet.origlen,
            line
        )?;
        Ok(())
    }

    fn teardown(&mut self) {
        if let Err(e) = self.out.flush() {
            warn!("flush failed: {}", e);
        }
        if self.num_errors > 0 {
            info!("{} packets could not be fully decoded", self.num_errors);
        }
    }
}

pub fn run(args: DecodeArgs, config: &mut Config) -> Result<(), Error> {
    if let Some(n) = args.count {
        let n = i64::try_from(n).map_err(|_| Error::Config(format!("count {} out of range", n)))?;
        config.set("engine.max_packets", n);
    }
    let input = open_input(&args.input)?;
    let printer = DecodePrinter::new(io::BufWriter::new(io::stdout().lock()));
    let mut engine = TraceEngine::new(Box::new(printer), config);
    engine.run(input)
}
