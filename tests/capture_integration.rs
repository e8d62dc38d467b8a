use std::fs;
use std::path::Path;

use swap_traffic::capture::{write_capture, CaptureError};
use swap_traffic::frame::{ChecksumMode, FrameBuilder, Identification};
use swap_traffic::pipeline::{generate_capture, GeneratorConfig, PipelineError};
use swap_traffic::scenario::{Profile, ScenarioClass, POOL_ETH_USDC, POOL_WBTC_ETH};

// Test-local readers: nothing here reuses the crate's own layout code.

struct Rec {
    ts_sec: u32,
    ts_usec: u32,
    incl_len: u32,
    orig_len: u32,
    frame: Vec<u8>,
}

#[derive(Debug, PartialEq)]
struct Swap {
    nonce: u64,
    pool: [u8; 20],
    amount_in: u64,
    min_out: u64,
    direction: u8,
    reserved: [u8; 3],
}

fn le32(b: &[u8], o: usize) -> u32 {
    u32::from_le_bytes(b[o..o + 4].try_into().unwrap())
}
fn le64(b: &[u8], o: usize) -> u64 {
    u64::from_le_bytes(b[o..o + 8].try_into().unwrap())
}
fn be16(b: &[u8], o: usize) -> u16 {
    u16::from_be_bytes([b[o], b[o + 1]])
}

fn ones_complement(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for c in data.chunks(2) {
        let hi = u32::from(c[0]) << 8;
        sum += hi | c.get(1).map_or(0, |&lo| u32::from(lo));
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

fn read_pcap(path: &Path) -> (Vec<u8>, Vec<Rec>) {
    let bytes = fs::read(path).unwrap();
    let header = bytes[..24].to_vec();
    let mut off = 24;
    let mut out = Vec::new();
    while off < bytes.len() {
        let incl_len = le32(&bytes, off + 8);
        let rec = Rec {
            ts_sec: le32(&bytes, off),
            ts_usec: le32(&bytes, off + 4),
            incl_len,
            orig_len: le32(&bytes, off + 12),
            frame: bytes[off + 16..off + 16 + incl_len as usize].to_vec(),
        };
        off += 16 + incl_len as usize;
        out.push(rec);
    }
    assert_eq!(off, bytes.len(), "trailing bytes after last record");
    (header, out)
}

fn decode_swap(frame: &[u8]) -> Swap {
    let p = &frame[42..];
    assert_eq!(p.len(), 48);
    Swap {
        nonce: le64(p, 0),
        pool: p[8..28].try_into().unwrap(),
        amount_in: le64(p, 28),
        min_out: le64(p, 36),
        direction: p[44],
        reserved: p[45..48].try_into().unwrap(),
    }
}

fn classify(s: &Swap) -> ScenarioClass {
    if s.min_out == 1 && s.amount_in < 1_000_000 {
        ScenarioClass::Small
    } else if s.min_out == (s.amount_in as f64 * 0.999) as u64 {
        ScenarioClass::Tight
    } else {
        assert_eq!(s.min_out, (s.amount_in as f64 * 0.90) as u64);
        ScenarioClass::Large
    }
}

fn run(dir: &Path, name: &str, cfg: &GeneratorConfig) -> Vec<u8> {
    let path = dir.join(name);
    generate_capture(cfg, &path).unwrap();
    fs::read(&path).unwrap()
}

#[test]
fn end_to_end_large_seed_42() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.pcap");
    let cfg = GeneratorConfig { count: 4, profile: Profile::Large, seed: 42, ..Default::default() };
    let summary = generate_capture(&cfg, &path).unwrap();

    let (header, recs) = read_pcap(&path);
    assert_eq!(le32(&header, 0), 0xA1B2_C3D4);
    assert_eq!(&header[4..8], &[2, 0, 4, 0]);
    assert_eq!(le32(&header, 8), 0);
    assert_eq!(le32(&header, 12), 0);
    assert_eq!(le32(&header, 16), 65_535);
    assert_eq!(le32(&header, 20), 1);

    assert_eq!(recs.len(), 4);
    for (i, r) in recs.iter().enumerate() {
        assert_eq!(r.incl_len, 90);
        assert_eq!(r.orig_len, 90);
        assert_eq!(r.ts_sec, 1_700_000_000);
        assert_eq!(r.ts_usec, i as u32 * 1_000);
        let s = decode_swap(&r.frame);
        assert_eq!(s.nonce, i as u64);
        assert!(s.pool == POOL_ETH_USDC || s.pool == POOL_WBTC_ETH);
        assert!((10_000_000..=200_000_000).contains(&s.amount_in));
        assert!(s.direction <= 1);
        assert_eq!(s.reserved, [0; 3]);
    }
    assert_eq!(summary.capture.frames, 4);
    assert_eq!(summary.capture.bytes, fs::metadata(&path).unwrap().len());
    assert_eq!(summary.capture.crc32, crc32fast::hash(&fs::read(&path).unwrap()));
}

#[test]
fn same_inputs_give_identical_files() {
    let dir = tempfile::tempdir().unwrap();
    for profile in [Profile::Small, Profile::Large, Profile::Tight, Profile::Mixed] {
        let cfg = GeneratorConfig { count: 200, profile, seed: 1234, ..Default::default() };
        let a = run(dir.path(), "a.pcap", &cfg);
        let b = run(dir.path(), "b.pcap", &cfg);
        assert_eq!(a, b, "profile {profile} not reproducible");
    }
    let cfg = GeneratorConfig { count: 200, seed: 1, ..Default::default() };
    let other = GeneratorConfig { seed: 2, ..cfg.clone() };
    assert_ne!(run(dir.path(), "c.pcap", &cfg), run(dir.path(), "d.pcap", &other));
}

#[test]
fn mixed_classes_by_index() {
    use ScenarioClass::*;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.pcap");
    let cfg = GeneratorConfig { count: 8, profile: Profile::Mixed, ..Default::default() };
    generate_capture(&cfg, &path).unwrap();
    let (_, recs) = read_pcap(&path);
    let classes: Vec<_> = recs.iter().map(|r| classify(&decode_swap(&r.frame))).collect();
    assert_eq!(classes, vec![Small, Tight, Large, Large, Small, Tight, Large, Large]);
}

#[test]
fn timestamps_never_decrease() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.pcap");
    let cfg = GeneratorConfig { count: 1_500, ..Default::default() };
    generate_capture(&cfg, &path).unwrap();
    let (_, recs) = read_pcap(&path);
    assert_eq!(recs.len(), 1_500);
    for w in recs.windows(2) {
        assert!((w[0].ts_sec, w[0].ts_usec) <= (w[1].ts_sec, w[1].ts_usec));
    }
    assert_eq!(recs[999].ts_usec, 999_000);
    assert_eq!(recs[1_000].ts_usec, 0);
    assert_eq!(recs[1_000].ts_sec - recs[999].ts_sec, 1);
}

#[test]
fn frame_lengths_are_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("len.pcap");
    let cfg = GeneratorConfig { count: 64, checksums: ChecksumMode::Compute, ..Default::default() };
    generate_capture(&cfg, &path).unwrap();
    let (_, recs) = read_pcap(&path);
    for r in &recs {
        let payload_len = r.frame.len() - 42;
        assert_eq!(&r.frame[12..14], &[0x08, 0x00]);
        assert_eq!(r.frame[23], 17);
        assert_eq!(be16(&r.frame, 16) as usize, 20 + 8 + payload_len);
        assert_eq!(be16(&r.frame, 38) as usize, 8 + payload_len);
        assert_eq!(ones_complement(&r.frame[14..34]), 0xFFFF, "IPv4 header checksum");
        let mut pseudo = r.frame[26..34].to_vec();
        pseudo.extend_from_slice(&[0, 17]);
        pseudo.extend_from_slice(&r.frame[38..40]);
        pseudo.extend_from_slice(&r.frame[34..]);
        assert_eq!(ones_complement(&pseudo), 0xFFFF, "UDP checksum");
    }
}

#[test]
fn sequential_ids_count_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seq.pcap");
    let cfg = GeneratorConfig {
        count: 5,
        identification: Identification::Sequential,
        ..Default::default()
    };
    generate_capture(&cfg, &path).unwrap();
    let (_, recs) = read_pcap(&path);
    let ids: Vec<u16> = recs.iter().map(|r| be16(&r.frame, 18)).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[test]
fn write_capture_accepts_arbitrary_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/raw.pcap");
    let builder = FrameBuilder::default();
    let frames = vec![builder.wrap(&[7u8; 10], 1).unwrap(), builder.wrap(&[], 2).unwrap()];
    let stats = write_capture(&path, &frames, 10).unwrap();
    assert_eq!(stats.frames, 2);

    let (_, recs) = read_pcap(&path);
    assert_eq!(recs[0].incl_len, 52);
    assert_eq!(recs[1].incl_len, 42);
    assert_eq!(recs[1].ts_sec, 10);
    assert_eq!(recs[1].ts_usec, 1_000);
}

#[test]
fn unwritable_path_is_a_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, b"x").unwrap();
    let err = generate_capture(&GeneratorConfig::default(), &blocker.join("out.pcap")).unwrap_err();
    assert_eq!(err.stage(), "write");
    assert!(matches!(err, PipelineError::Write(CaptureError::Io(_))));
}
