use crate::analyzer::{PacketAnalyzer, ParseContext};
use crate::config::Config;
use crate::error::Error;
use crate::linktype::Linktype;
use crate::traits::TraceReader;
use std::io::Read;

/// Trace analyzer engine: reads every packet of a trace and hands it to an analyzer
pub struct TraceEngine {
    a: Box<dyn PacketAnalyzer>,
    max_packets: Option<usize>,
}

impl TraceEngine {
    /// Build a new TraceEngine, taking ownership of the input analyzer
    ///
    /// `engine.max_packets` limits the number of packets read.
    pub fn new(a: Box<dyn PacketAnalyzer>, config: &Config) -> Self {
        let max_packets = config.get_usize("engine.max_packets");
        TraceEngine { a, max_packets }
    }

    /// Main function: given a reader, read all packets and call the analyzer for each
    pub fn run<R: Read>(&mut self, f: R) -> Result<(), Error> {
        let mut reader = TraceReader::open(f)?;
        self.a.init()?;
        let mut ctx = ParseContext {
            format: reader.format(),
            ..Default::default()
        };
        debug!("trace format: {}", ctx.format);
        let result = self.process(&mut reader, &mut ctx);
        self.a.teardown();
        result
    }

    fn process<R: Read>(
        &mut self,
        reader: &mut TraceReader<R>,
        ctx: &mut ParseContext,
    ) -> Result<(), Error> {
        while let Some(packet) = reader.read_packet()? {
            if self.max_packets.map_or(false, |max| ctx.packet_index >= max) {
                debug!("stopping after {} packets", ctx.packet_index);
                break;
            }
            ctx.packet_index += 1;
            ctx.link_type = reader
                .link_type(packet.interface)
                .unwrap_or(Linktype::ETHERNET);
            if ctx.first_packet_ts.is_null() {
                ctx.first_packet_ts = packet.ts;
            }
            // an out-of-order timestamp is weird but not critical
            ctx.rel_ts = packet
                .ts
                .checked_sub(ctx.first_packet_ts)
                .unwrap_or_default();
            self.a.handle_packet(&packet, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;
    use crate::pcap::PcapWriter;
    use crate::timestamp::Timestamp;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<(usize, Duration, usize)>>>,
        teardown: Arc<Mutex<bool>>,
    }

    impl PacketAnalyzer for Recorder {
        fn handle_packet(&mut self, packet: &Packet, ctx: &ParseContext) -> Result<(), Error> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((ctx.packet_index, ctx.rel_ts, packet.data.len()));
            }
            Ok(())
        }

        fn teardown(&mut self) {
            if let Ok(mut t) = self.teardown.lock() {
                *t = true;
            }
        }
    }

    fn trace() -> Vec<u8> {
        let mut w = PcapWriter::new(Vec::new()).unwrap();
        for i in 0..3u64 {
            let p = Packet::new(Timestamp::new(100 + i, 0), vec![0; i as usize + 1]);
            w.write_packet(&p).unwrap();
        }
        w.into_inner().unwrap()
    }

    #[test]
    fn engine_runs_analyzer() {
        let recorder = Recorder::default();
        let seen = recorder.seen.clone();
        let teardown = recorder.teardown.clone();
        let mut engine = TraceEngine::new(Box::new(recorder), &Config::default());
        engine.run(Cursor::new(trace())).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (1, Duration::from_secs(0), 1),
                (2, Duration::from_secs(1), 2),
                (3, Duration::from_secs(2), 3)
            ]
        );
        assert!(*teardown.lock().unwrap());
    }

    #[test]
    fn engine_max_packets() {
        let recorder = Recorder::default();
        let seen = recorder.seen.clone();
        let mut config = Config::default();
        config.set("engine.max_packets", 2);
        let mut engine = TraceEngine::new(Box::new(recorder), &config);
        engine.run(Cursor::new(trace())).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
