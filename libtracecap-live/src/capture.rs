//! Multi-interface capture: one reader thread per live source, funnelled into
//! a single trace writer

use crate::config::{LiveConfig, RingConfig};
use crate::open_live;
use crate::packet::LivePacket;
use crate::source::PacketSource;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use libtracecap_tools::bpf::{BpfProgram, BpfVm};
use libtracecap_tools::{
    Config, Error, InterfaceDescription, Linktype, PcapNGWriter, PcapNGWriterOptions, PcapWriter,
    PcapWriterOptions, Timestamp, TraceFormat, TraceWriter, TsResolution,
};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::mem;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Packets in flight between the readers and the writer
const CHANNEL_DEPTH: usize = 1024;
/// How often the coordinator checks for cancellation while no packet arrives
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Cooperative cancellation flag, shared by the caller and the capture threads
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Destination of captured packets
#[derive(Default)]
pub enum Output {
    /// Capture without recording
    #[default]
    Discard,
    Path(PathBuf),
    Writer(Box<dyn Write + Send>),
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Discard => f.write_str("Discard"),
            Output::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Output::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Typed configuration of a [`Capture`]
#[derive(Debug, Default)]
pub struct CaptureConfig {
    pub interfaces: Vec<String>,
    /// Parameters applied to every live handle
    pub live: LiveConfig,
    pub format: TraceFormat,
    pub output: Output,
    /// Link type declared in the output. `None` uses the link type of each source.
    pub link_type: Option<Linktype>,
    /// Timestamp resolution of the output
    pub resolution: TsResolution,
    /// Pre-assembled BPF program
    pub filter: Option<BpfProgram>,
}

impl CaptureConfig {
    /// Build the capture configuration from the `[capture]` table
    pub fn from_config(config: &Config) -> Result<CaptureConfig, Error> {
        let mut interfaces = config.get_str_array("capture.interfaces").unwrap_or_default();
        if let Some(name) = config.get("capture.interface") {
            interfaces.push(name.to_owned());
        }
        let snaplen = match config.get_usize("capture.snaplen") {
            Some(n) => u32::try_from(n)
                .map_err(|_| Error::Config(format!("snaplen {} out of range", n)))?,
            None => 0,
        };
        let live = LiveConfig {
            snaplen,
            promiscuous: config.get_bool("capture.promiscuous").unwrap_or(true),
            timeout_ms: config.get_i64("capture.timeout_ms").unwrap_or(0),
            buffer_size: config.get_usize("capture.buffer_size").unwrap_or(0),
            tpacket_v3: config.get_bool("capture.tpacket_v3").unwrap_or(false),
            ring: config
                .get_table::<RingConfig, _>("capture.ring")?
                .unwrap_or_default(),
        };
        let format = match config.get("capture.format") {
            Some(s) => TraceFormat::from_str(s)?,
            None => TraceFormat::default(),
        };
        let output = match (config.get("capture.output"), config.get("capture.writer")) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "capture.output and capture.writer are mutually exclusive".to_owned(),
                ))
            }
            (Some("-"), None) | (None, Some("stdout")) => Output::Writer(Box::new(io::stdout())),
            (None, Some("stderr")) => Output::Writer(Box::new(io::stderr())),
            (None, Some(w)) => {
                return Err(Error::Config(format!("unknown capture writer '{}'", w)));
            }
            (Some(path), None) => Output::Path(PathBuf::from(path)),
            (None, None) => Output::Discard,
        };
        let link_type = match config.get_usize("capture.link_type") {
            Some(l) => Some(Linktype(u32::try_from(l).map_err(|_| {
                Error::Config(format!("link type {} out of range", l))
            })?)),
            None => None,
        };
        let resolution = match config.get("capture.precision") {
            None | Some("micro") => TsResolution::MICRO,
            Some("nano") => TsResolution::NANO,
            Some(p) => return Err(Error::Config(format!("unknown precision '{}'", p))),
        };
        let filter = match (config.get("capture.filter_file"), config.get("capture.filter")) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "capture.filter_file and capture.filter are mutually exclusive".to_owned(),
                ))
            }
            (Some(path), None) => Some(BpfProgram::from_ddd(&fs::read_to_string(path)?)?),
            (None, Some(text)) => Some(BpfProgram::from_ddd(text)?),
            (None, None) => None,
        };
        Ok(CaptureConfig {
            interfaces,
            live,
            format,
            output,
            link_type,
            resolution,
            filter,
        })
    }

    fn check_sources(&self, n: usize) -> Result<(), Error> {
        if n == 0 {
            return Err(Error::Config("no capture interface".to_owned()));
        }
        if self.format == TraceFormat::Pcap && n != 1 {
            return Err(Error::Config(format!(
                "pcap output supports exactly one interface, {} requested",
                n
            )));
        }
        Ok(())
    }
}

struct Source {
    handle: Box<dyn PacketSource>,
    /// Interface id in the output
    interface: u32,
    /// Set when the filter could not be installed in the kernel
    user_filter: Option<BpfVm>,
}

enum Message {
    Packet(usize, LivePacket),
    Failed(usize, Error),
}

/// A set of opened live sources and the trace writer they feed
pub struct Capture {
    sources: Vec<Source>,
    writer: Option<Box<dyn TraceWriter + Send>>,
}

fn close_all<'a, I>(handles: I)
where
    I: DoubleEndedIterator<Item = &'a Box<dyn PacketSource>>,
{
    for h in handles.rev() {
        if let Err(e) = h.close() {
            warn!("{}: close failed: {}", h.name(), e);
        }
    }
}

fn keep_first(result: &mut Result<(), Error>, e: Error) {
    if result.is_ok() {
        *result = Err(e);
    }
}

fn open_writer(
    config: &mut CaptureConfig,
    first_link_type: Linktype,
) -> Result<Option<Box<dyn TraceWriter + Send>>, Error> {
    let sink: Box<dyn Write + Send> = match mem::take(&mut config.output) {
        Output::Discard => return Ok(None),
        Output::Path(path) => Box::new(File::create(&path)?),
        Output::Writer(w) => w,
    };
    let writer: Box<dyn TraceWriter + Send> = match config.format {
        TraceFormat::Pcap => {
            let options = PcapWriterOptions {
                resolution: config.resolution,
                snaplen: config.live.normalize().snaplen,
                link_type: config.link_type.unwrap_or(first_link_type),
                buffered: true,
                ..PcapWriterOptions::default()
            };
            Box::new(PcapWriter::with_options(sink, options)?)
        }
        TraceFormat::PcapNG => {
            let options = PcapNGWriterOptions {
                buffered: true,
                ..PcapNGWriterOptions::default()
            };
            Box::new(PcapNGWriter::with_options(sink, options)?)
        }
    };
    Ok(Some(writer))
}

impl Capture {
    /// Open a live handle on every configured interface
    ///
    /// If any step fails, the handles opened so far are closed in reverse
    /// order before returning the error.
    pub fn open(config: CaptureConfig) -> Result<Capture, Error> {
        config.check_sources(config.interfaces.len())?;
        let mut handles: Vec<Box<dyn PacketSource>> = Vec::with_capacity(config.interfaces.len());
        for name in &config.interfaces {
            match open_live(name, &config.live) {
                Ok(h) => handles.push(Box::new(h)),
                Err(e) => {
                    error!("{}: cannot open capture: {}", name, e);
                    close_all(handles.iter());
                    return Err(e);
                }
            }
        }
        Capture::from_sources(config, handles)
    }

    /// Build a capture over already opened sources
    ///
    /// Attaches the filter and allocates the writer. On error, all sources are
    /// closed.
    pub fn from_sources(
        mut config: CaptureConfig,
        sources: Vec<Box<dyn PacketSource>>,
    ) -> Result<Capture, Error> {
        match Capture::prepare(&mut config, &sources) {
            Ok((writer, setup)) => {
                let sources = sources
                    .into_iter()
                    .zip(setup)
                    .map(|(handle, (interface, user_filter))| Source {
                        handle,
                        interface,
                        user_filter,
                    })
                    .collect();
                Ok(Capture { sources, writer })
            }
            Err(e) => {
                close_all(sources.iter());
                Err(e)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn prepare(
        config: &mut CaptureConfig,
        sources: &[Box<dyn PacketSource>],
    ) -> Result<(Option<Box<dyn TraceWriter + Send>>, Vec<(u32, Option<BpfVm>)>), Error> {
        config.check_sources(sources.len())?;
        let vm = config.filter.take().map(BpfVm::new).transpose()?;
        let mut user_filters = Vec::with_capacity(sources.len());
        for src in sources {
            let user_filter = match &vm {
                None => None,
                Some(vm) => {
                    if src.attach_filter(vm.program())? {
                        info!("{}: filter attached in kernel", src.name());
                        None
                    } else {
                        info!("{}: filtering in user space", src.name());
                        Some(vm.clone())
                    }
                }
            };
            user_filters.push(user_filter);
        }
        let mut writer = open_writer(config, sources[0].link_type())?;
        let snaplen = config.live.normalize().snaplen;
        let mut setup = Vec::with_capacity(sources.len());
        for (idx, (src, user_filter)) in sources.iter().zip(user_filters).enumerate() {
            let interface = match writer.as_mut() {
                Some(w) => {
                    let desc = InterfaceDescription {
                        link_type: config.link_type.unwrap_or(src.link_type()),
                        snaplen,
                        resolution: config.resolution,
                        name: Some(src.name().to_owned()),
                        options: Vec::new(),
                    };
                    w.add_interface(&desc)?
                }
                None => idx as u32,
            };
            debug!("{}: output interface {}", src.name(), interface);
            setup.push((interface, user_filter));
        }
        Ok((writer, setup))
    }

    /// Names of the capture sources, in output interface order
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.handle.name()).collect()
    }

    /// Capture until every source is closed, an error occurs, or `cancel` is set
    ///
    /// The first error wins: it cancels the other readers and is returned
    /// once everything is released. Interface statistics are recorded (pcap-ng)
    /// before the writer is closed; handles are closed last, in reverse order.
    pub fn run(mut self, cancel: &CancelToken) -> Result<(), Error> {
        let sources = mem::take(&mut self.sources);
        let mut writer = self.writer.take();
        let mut result = Ok(());

        thread::scope(|s| {
            let (tx, rx) = bounded::<Message>(CHANNEL_DEPTH);
            for (idx, src) in sources.iter().enumerate() {
                let tx = tx.clone();
                let token = cancel.clone();
                let spawned = thread::Builder::new()
                    .name(format!("capture-{}", src.handle.name()))
                    .spawn_scoped(s, move || read_loop(idx, src, &tx, &token));
                if let Err(e) = spawned {
                    error!("{}: cannot start reader: {}", src.handle.name(), e);
                    keep_first(&mut result, Error::Io(e));
                    cancel.cancel();
                }
            }
            drop(tx);

            let mut closing = false;
            loop {
                match rx.recv_timeout(CANCEL_POLL) {
                    Ok(Message::Packet(idx, packet)) => {
                        if result.is_err() {
                            continue;
                        }
                        if let Some(w) = writer.as_mut() {
                            let mut packet = packet.into_packet(sources[idx].interface);
                            if packet.ts.is_null() {
                                packet.ts = Timestamp::now();
                            }
                            if let Err(e) = w.write_packet(&packet) {
                                error!("write failed: {}", e);
                                keep_first(&mut result, e);
                                cancel.cancel();
                            }
                        }
                    }
                    Ok(Message::Failed(idx, e)) => {
                        error!("{}: capture failed: {}", sources[idx].handle.name(), e);
                        keep_first(&mut result, e);
                        cancel.cancel();
                    }
                    Err(RecvTimeoutError::Timeout) => (),
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                // wake up readers blocked in the kernel
                if cancel.is_cancelled() && !closing {
                    closing = true;
                    debug!("capture cancelled, closing handles");
                    for src in sources.iter().rev() {
                        if let Err(e) = src.handle.close() {
                            warn!("{}: close failed: {}", src.handle.name(), e);
                            keep_first(&mut result, e);
                        }
                    }
                }
            }
        });

        for src in &sources {
            let name = src.handle.name();
            match src.handle.stats() {
                Ok(st) => {
                    info!(
                        "{}: {} packets received, {} dropped",
                        name, st.received, st.dropped
                    );
                    if let Some(w) = writer.as_mut() {
                        if let Err(e) =
                            w.write_statistics(src.interface, Timestamp::now(), st.received, st.dropped)
                        {
                            keep_first(&mut result, e);
                        }
                    }
                }
                Err(e) => debug!("{}: no statistics: {}", name, e),
            }
        }
        if let Some(mut w) = writer {
            if let Err(e) = w.close() {
                keep_first(&mut result, e);
            }
        }
        for src in sources.iter().rev() {
            if let Err(e) = src.handle.close() {
                warn!("{}: close failed: {}", src.handle.name(), e);
                keep_first(&mut result, e);
            }
        }
        result
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Some(mut w) = self.writer.take() {
            if let Err(e) = w.close() {
                warn!("closing trace writer: {}", e);
            }
        }
        close_all(self.sources.iter().map(|s| &s.handle));
    }
}

fn read_loop(idx: usize, src: &Source, tx: &Sender<Message>, cancel: &CancelToken) {
    let name = src.handle.name();
    let mut count = 0u64;
    let mut filtered = 0u64;
    debug!("{}: reader started", name);
    while !cancel.is_cancelled() {
        match src.handle.read_packet() {
            Ok(packet) => {
                if let Some(vm) = &src.user_filter {
                    if !vm.matches(&packet.data) {
                        filtered += 1;
                        continue;
                    }
                }
                count += 1;
                if tx.send(Message::Packet(idx, packet)).is_err() {
                    break;
                }
            }
            Err(Error::Timeout) => trace!("{}: read timeout", name),
            Err(Error::HandleClosed) => {
                debug!("{}: handle closed", name);
                break;
            }
            Err(e) => {
                cancel.cancel();
                let _ = tx.send(Message::Failed(idx, e));
                break;
            }
        }
    }
    debug!(
        "{}: reader done, {} packets forwarded, {} filtered out",
        name, count, filtered
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::LiveStats;
    use libtracecap_tools::bpf::{BpfInstruction, BPF_ABS, BPF_B, BPF_JEQ, BPF_JMP, BPF_K, BPF_LD, BPF_RET};
    use libtracecap_tools::pcapng::Block;
    use libtracecap_tools::{PcapNGReader, PcapReader};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct MockSource {
        name: String,
        queue: Mutex<VecDeque<Result<LivePacket, Error>>>,
        /// Keep returning timeouts when the queue is empty, until closed
        idle: bool,
        kernel_filter: bool,
        closed: AtomicBool,
        close_log: Arc<Mutex<Vec<String>>>,
    }

    impl MockSource {
        fn new(name: &str, items: Vec<Result<LivePacket, Error>>, log: &Arc<Mutex<Vec<String>>>) -> Self {
            MockSource {
                name: name.to_owned(),
                queue: Mutex::new(items.into()),
                idle: false,
                kernel_filter: false,
                closed: AtomicBool::new(false),
                close_log: log.clone(),
            }
        }
    }

    impl PacketSource for MockSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn link_type(&self) -> Linktype {
            Linktype::ETHERNET
        }

        fn snaplen(&self) -> u32 {
            65535
        }

        fn read_packet(&self) -> Result<LivePacket, Error> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::HandleClosed);
            }
            match self.queue.lock().unwrap().pop_front() {
                Some(item) => item,
                None if self.idle => {
                    thread::sleep(Duration::from_millis(2));
                    Err(Error::Timeout)
                }
                None => Err(Error::HandleClosed),
            }
        }

        fn attach_filter(&self, _program: &BpfProgram) -> Result<bool, Error> {
            Ok(self.kernel_filter)
        }

        fn stats(&self) -> Result<LiveStats, Error> {
            Ok(LiveStats {
                received: 7,
                dropped: 1,
            })
        }

        fn close(&self) -> Result<(), Error> {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.close_log.lock().unwrap().push(self.name.clone());
            }
            Ok(())
        }
    }

    fn packet(sec: u64, data: &[u8]) -> Result<LivePacket, Error> {
        Ok(LivePacket {
            data: data.to_vec(),
            ts: Timestamp::new(sec, 1000),
            caplen: data.len() as u32,
            origlen: data.len() as u32,
            if_index: 1,
        })
    }

    fn boxed(s: MockSource) -> Box<dyn PacketSource> {
        Box::new(s)
    }

    #[test]
    fn capture_to_pcap() {
        let log = Arc::default();
        let out = SharedBuf::default();
        let src = MockSource::new("eth0", vec![packet(10, &[1, 2, 3]), packet(11, &[4])], &log);
        let config = CaptureConfig {
            format: TraceFormat::Pcap,
            output: Output::Writer(Box::new(out.clone())),
            live: LiveConfig {
                snaplen: 1500,
                ..LiveConfig::default()
            },
            ..CaptureConfig::default()
        };
        let capture = Capture::from_sources(config, vec![boxed(src)]).expect("capture");
        capture.run(&CancelToken::new()).expect("run");
        let bytes = out.bytes();
        let mut reader = PcapReader::new(&bytes[..]).expect("pcap header");
        assert_eq!(reader.header().snaplen, 1500);
        assert_eq!(reader.header().network, Linktype::ETHERNET);
        let p = reader.read_packet().expect("read").expect("packet");
        assert_eq!(p.data, vec![1, 2, 3]);
        assert_eq!(p.ts, Timestamp::new(10, 1000));
        let p = reader.read_packet().expect("read").expect("packet");
        assert_eq!(p.data, vec![4]);
        assert!(reader.read_packet().expect("read").is_none());
        assert_eq!(*log.lock().unwrap(), vec!["eth0".to_owned()]);
    }

    #[test]
    fn capture_to_pcapng_two_sources() {
        let log = Arc::default();
        let out = SharedBuf::default();
        let a = MockSource::new("eth0", vec![packet(10, &[0xa1]), packet(12, &[0xa2])], &log);
        let b = MockSource::new("eth1", vec![packet(11, &[0xb1])], &log);
        let config = CaptureConfig {
            output: Output::Writer(Box::new(out.clone())),
            resolution: TsResolution::NANO,
            ..CaptureConfig::default()
        };
        let capture = Capture::from_sources(config, vec![boxed(a), boxed(b)]).expect("capture");
        capture.run(&CancelToken::new()).expect("run");

        let bytes = out.bytes();
        let mut reader = PcapNGReader::new(&bytes[..]).expect("section");
        let mut per_iface: Vec<Vec<Vec<u8>>> = vec![Vec::new(), Vec::new()];
        let mut stats = Vec::new();
        while let Some(block) = reader.next_block().expect("block") {
            match block {
                Block::EnhancedPacket(p) => per_iface[p.interface as usize].push(p.data),
                Block::InterfaceStatistics(isb) => stats.push((isb.interface, isb.received, isb.dropped)),
                _ => (),
            }
        }
        let names: Vec<_> = reader.interfaces().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec![Some("eth0".to_owned()), Some("eth1".to_owned())]);
        assert!(reader.interfaces().iter().all(|i| i.resolution.is_nano()));
        // per-source order is preserved
        assert_eq!(per_iface[0], vec![vec![0xa1], vec![0xa2]]);
        assert_eq!(per_iface[1], vec![vec![0xb1]]);
        assert_eq!(stats, vec![(0, Some(7), Some(1)), (1, Some(7), Some(1))]);
        // closed in reverse order
        assert_eq!(*log.lock().unwrap(), vec!["eth1".to_owned(), "eth0".to_owned()]);
    }

    #[test]
    fn pcap_needs_one_interface() {
        let log = Arc::default();
        let a = MockSource::new("eth0", vec![], &log);
        let b = MockSource::new("eth1", vec![], &log);
        let config = CaptureConfig {
            format: TraceFormat::Pcap,
            ..CaptureConfig::default()
        };
        let r = Capture::from_sources(config, vec![boxed(a), boxed(b)]);
        assert!(matches!(r, Err(Error::Config(_))));
        assert_eq!(*log.lock().unwrap(), vec!["eth1".to_owned(), "eth0".to_owned()]);

        let config = CaptureConfig::default();
        assert!(matches!(Capture::open(config), Err(Error::Config(_))));
    }

    #[test]
    fn first_error_wins() {
        let log = Arc::default();
        let out = SharedBuf::default();
        let failing = MockSource::new(
            "eth0",
            vec![
                packet(10, &[1]),
                Err(Error::Io(io::Error::new(io::ErrorKind::Other, "link went away"))),
                packet(11, &[2]),
            ],
            &log,
        );
        let mut idle = MockSource::new("eth1", vec![], &log);
        idle.idle = true;
        let config = CaptureConfig {
            output: Output::Writer(Box::new(out.clone())),
            ..CaptureConfig::default()
        };
        let capture = Capture::from_sources(config, vec![boxed(failing), boxed(idle)]).expect("capture");
        match capture.run(&CancelToken::new()) {
            Err(Error::Io(e)) => assert_eq!(e.to_string(), "link went away"),
            other => panic!("unexpected result {:?}", other),
        }
        let mut closed = log.lock().unwrap().clone();
        closed.sort();
        assert_eq!(closed, vec!["eth0".to_owned(), "eth1".to_owned()]);
        // the packet read after the error was never written
        let bytes = out.bytes();
        let mut reader = PcapNGReader::new(&bytes[..]).expect("section");
        let mut data = Vec::new();
        while let Some(p) = reader.read_packet().expect("packet") {
            data.push(p.data);
        }
        assert!(!data.contains(&vec![2]));
    }

    #[test]
    fn cancel_closes_idle_sources() {
        let log = Arc::default();
        let mut idle = MockSource::new("eth0", vec![packet(10, &[1])], &log);
        idle.idle = true;
        let capture = Capture::from_sources(CaptureConfig::default(), vec![boxed(idle)]).expect("capture");
        let cancel = CancelToken::new();
        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                cancel.cancel();
            })
        };
        capture.run(&cancel).expect("run");
        canceller.join().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["eth0".to_owned()]);
    }

    #[test]
    fn user_space_filter() {
        let log = Arc::default();
        let out = SharedBuf::default();
        let src = MockSource::new("eth0", vec![packet(10, &[0x41]), packet(11, &[0x42])], &log);
        let program = BpfProgram::new(vec![
            BpfInstruction::stmt(BPF_LD | BPF_B | BPF_ABS, 0),
            BpfInstruction::jump(BPF_JMP | BPF_JEQ | BPF_K, 0x41, 0, 1),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0xffff),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0),
        ]);
        let config = CaptureConfig {
            format: TraceFormat::Pcap,
            output: Output::Writer(Box::new(out.clone())),
            filter: Some(program),
            ..CaptureConfig::default()
        };
        let capture = Capture::from_sources(config, vec![boxed(src)]).expect("capture");
        capture.run(&CancelToken::new()).expect("run");
        let bytes = out.bytes();
        let mut reader = PcapReader::new(&bytes[..]).expect("pcap header");
        let p = reader.read_packet().expect("read").expect("packet");
        assert_eq!(p.data, vec![0x41]);
        assert!(reader.read_packet().expect("read").is_none());
    }

    #[test]
    fn invalid_filter_closes_sources() {
        let log = Arc::default();
        let mut src = MockSource::new("eth0", vec![], &log);
        src.kernel_filter = true;
        let config = CaptureConfig {
            // no RET at the end
            filter: Some(BpfProgram::new(vec![BpfInstruction::stmt(
                BPF_LD | BPF_B | BPF_ABS,
                0,
            )])),
            ..CaptureConfig::default()
        };
        let r = Capture::from_sources(config, vec![boxed(src)]);
        assert!(matches!(r, Err(Error::Bpf(_))));
        assert_eq!(*log.lock().unwrap(), vec!["eth0".to_owned()]);
    }

    #[test]
    fn zero_timestamp_replaced() {
        let log = Arc::default();
        let out = SharedBuf::default();
        let src = MockSource::new(
            "eth0",
            vec![Ok(LivePacket {
                data: vec![1],
                caplen: 1,
                origlen: 1,
                ..LivePacket::default()
            })],
            &log,
        );
        let config = CaptureConfig {
            output: Output::Writer(Box::new(out.clone())),
            ..CaptureConfig::default()
        };
        Capture::from_sources(config, vec![boxed(src)])
            .expect("capture")
            .run(&CancelToken::new())
            .expect("run");
        let bytes = out.bytes();
        let mut reader = PcapNGReader::new(&bytes[..]).expect("section");
        let p = reader.read_packet().expect("read").expect("packet");
        assert!(!p.ts.is_null());
    }

    #[test]
    fn config_from_table() {
        let mut config = Config::default();
        let doc = r#"
            [capture]
            interfaces = ["eth0"]
            snaplen = 256
            timeout_ms = -3
            format = "pcap"
            output = "/tmp/out.pcap"
            precision = "nano"
            filter = "1\n6 0 0 65535\n"
            tpacket_v3 = true

            [capture.ring]
            block_nr = 2
        "#;
        config.load_config(doc.as_bytes()).expect("load");
        let c = CaptureConfig::from_config(&config).expect("capture config");
        assert_eq!(c.interfaces, vec!["eth0".to_owned()]);
        assert_eq!(c.format, TraceFormat::Pcap);
        assert!(matches!(c.output, Output::Path(ref p) if p == &PathBuf::from("/tmp/out.pcap")));
        assert_eq!(c.resolution, TsResolution::NANO);
        assert_eq!(c.filter.as_ref().map(|f| f.len()), Some(1));
        let live = c.live.normalize();
        assert_eq!(live.snaplen, 256);
        assert_eq!(live.timeout_ms, 0);
        assert_eq!(live.ring.block_nr, 2);
        assert_eq!(live.ring.frame_size, 2048);

        config.set("capture.writer", "stdout");
        assert!(matches!(
            CaptureConfig::from_config(&config),
            Err(Error::Config(_))
        ));
    }
}
