use assert_cmd::Command;
use libtracecap_tools::{Packet, PcapReader, PcapWriter, Timestamp};
use std::fs::{self, File};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tracecap-cli-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

/// Ethernet / IPv4 / TCP SYN from 10.0.0.1:1234 to 10.0.0.2:80
fn tcp_frame() -> Vec<u8> {
    let mut f = vec![
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0x08, 0x00,
    ];
    f.extend_from_slice(&[
        0x45, 0x00, 0x00, 0x28, 0x00, 0x01, 0x00, 0x00, 0x40, 0x06, 0x00, 0x00, 10, 0, 0, 1, 10,
        0, 0, 2,
    ]);
    f.extend_from_slice(&[
        0x04, 0xd2, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x50, 0x02, 0x20,
        0x00, 0x00, 0x00, 0x00, 0x00,
    ]);
    f
}

fn write_trace(name: &str, packets: &[Vec<u8>]) -> PathBuf {
    let path = temp_path(name);
    let mut w = PcapWriter::new(File::create(&path).unwrap()).unwrap();
    for (i, data) in packets.iter().enumerate() {
        let p = Packet::new(Timestamp::new(1_600_000_000 + i as u64, 0), data.clone());
        w.write_packet(&p).unwrap();
    }
    w.close().unwrap();
    path
}

#[test]
fn help() {
    Command::cargo_bin("tracecap")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn info_counts_packets() {
    let path = write_trace("info.pcap", &[tcp_frame(), vec![0x41; 20]]);
    let out = Command::cargo_bin("tracecap")
        .unwrap()
        .arg("info")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("File type: pcap"), "{}", out);
    assert!(out.contains("Packets: 2"), "{}", out);
}

#[test]
fn filter_keeps_matching_packets() {
    let input = write_trace(
        "filter-in.pcap",
        &[vec![0x41, 1, 2], vec![0x42, 1, 2], vec![0x41, 3]],
    );
    let output = temp_path("filter-out.pcap");
    // ldb [0]; jeq #0x41; ret #65535; ret #0
    Command::cargo_bin("tracecap")
        .unwrap()
        .arg("filter")
        .arg("--filter")
        .arg("4;48 0 0 0;21 0 1 65;6 0 0 65535;6 0 0 0")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    let mut reader = PcapReader::new(File::open(&output).unwrap()).unwrap();
    let mut kept = Vec::new();
    while let Some(p) = reader.read_packet().unwrap() {
        kept.push(p.data);
    }
    assert_eq!(kept, vec![vec![0x41, 1, 2], vec![0x41, 3]]);
}

#[test]
fn decode_prints_layers() {
    let path = write_trace("decode.pcap", &[tcp_frame()]);
    let out = Command::cargo_bin("tracecap")
        .unwrap()
        .arg("decode")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("IPv4 10.0.0.1 > 10.0.0.2"), "{}", out);
    assert!(out.contains("TCP 1234 > 80"), "{}", out);
}

#[test]
fn bad_magic_fails() {
    let path = temp_path("garbage.pcap");
    fs::write(&path, b"this is not a trace file at all").unwrap();
    Command::cargo_bin("tracecap")
        .unwrap()
        .arg("info")
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn pcap_capture_rejects_two_interfaces() {
    Command::cargo_bin("tracecap")
        .unwrap()
        .args(["capture", "-F", "pcap", "-i", "lo", "-i", "eth0"])
        .assert()
        .failure();
}
