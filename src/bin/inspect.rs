use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::PathBuf;
use swap_traffic::capture::{
    GLOBAL_HEADER_LEN, LINKTYPE_ETHERNET, PCAP_MAGIC, PCAP_SNAPLEN, PCAP_VERSION_MAJOR,
    PCAP_VERSION_MINOR,
};
use swap_traffic::frame::{ETHERTYPE_IPV4, ETH_HEADER_LEN, HEADERS_LEN, IPPROTO_UDP};
use swap_traffic::record::WIRE_SIZE;

#[derive(Debug, Parser)]
#[command(about = "Check a generated swap-intent capture frame by frame")]
struct Args {
    /// Capture file to read (.pcap)
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Print one line per frame
    #[arg(long, default_value_t = false)]
    dump: bool,
}

fn le_u16(b: &[u8], o: usize) -> u16 {
    u16::from_le_bytes([b[o], b[o + 1]])
}
fn le_u32(b: &[u8], o: usize) -> u32 {
    u32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]])
}
fn be_u16(b: &[u8], o: usize) -> u16 {
    u16::from_be_bytes([b[o], b[o + 1]])
}

fn check_global_header(h: &[u8]) -> Result<()> {
    ensure!(le_u32(h, 0) == PCAP_MAGIC, "bad magic {:#010x}", le_u32(h, 0));
    ensure!(
        (le_u16(h, 4), le_u16(h, 6)) == (PCAP_VERSION_MAJOR, PCAP_VERSION_MINOR),
        "unexpected version {}.{}",
        le_u16(h, 4),
        le_u16(h, 6)
    );
    ensure!(le_u32(h, 8) == 0 && le_u32(h, 12) == 0, "timezone/sigfigs not zero");
    ensure!(le_u32(h, 16) == PCAP_SNAPLEN, "unexpected snaplen {}", le_u32(h, 16));
    ensure!(le_u32(h, 20) == LINKTYPE_ETHERNET, "unexpected link type {}", le_u32(h, 20));
    Ok(())
}

fn check_frame(idx: usize, f: &[u8]) -> Result<()> {
    ensure!(f.len() >= HEADERS_LEN, "frame {idx}: only {} bytes", f.len());
    ensure!(be_u16(f, 12) == ETHERTYPE_IPV4, "frame {idx}: ethertype {:#06x}", be_u16(f, 12));
    let ip = ETH_HEADER_LEN;
    ensure!(f[ip + 9] == IPPROTO_UDP, "frame {idx}: IP protocol {}", f[ip + 9]);
    let payload_len = f.len() - HEADERS_LEN;
    ensure!(
        be_u16(f, ip + 2) as usize == 20 + 8 + payload_len,
        "frame {idx}: IPv4 total length {} for {payload_len}-byte payload",
        be_u16(f, ip + 2)
    );
    ensure!(
        be_u16(f, ip + 24) as usize == 8 + payload_len,
        "frame {idx}: UDP length {} for {payload_len}-byte payload",
        be_u16(f, ip + 24)
    );
    ensure!(payload_len == WIRE_SIZE, "frame {idx}: payload is {payload_len} bytes, expected {WIRE_SIZE}");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rdr = BufReader::new(File::open(&args.input).with_context(|| format!("open {:?}", args.input))?);

    let mut gh = [0u8; GLOBAL_HEADER_LEN];
    rdr.read_exact(&mut gh).context("reading global header")?;
    check_global_header(&gh)?;

    let mut frames = 0usize;
    let mut first: Option<(u32, u32)> = None;
    let mut prev: Option<(u32, u32)> = None;
    loop {
        let mut rh = [0u8; 16];
        match rdr.read_exact(&mut rh) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let ts = (le_u32(&rh, 0), le_u32(&rh, 4));
        let (incl, orig) = (le_u32(&rh, 8), le_u32(&rh, 12));
        if incl != orig {
            bail!("frame {frames}: incl_len {incl} != orig_len {orig}");
        }
        if let Some(p) = prev {
            if ts < p {
                bail!("frame {frames}: timestamp {}.{:06} goes back from {}.{:06}", ts.0, ts.1, p.0, p.1);
            }
        }
        let mut frame = vec![0u8; incl as usize];
        rdr.read_exact(&mut frame).with_context(|| format!("frame {frames} truncated"))?;
        check_frame(frames, &frame)?;

        if args.dump {
            let ip = ETH_HEADER_LEN;
            println!(
                "{:>6} {}.{:06} len={} id={:#06x} {}.{}.{}.{}:{} -> {}.{}.{}.{}:{} csum={:#06x}/{:#06x}",
                frames,
                ts.0,
                ts.1,
                incl,
                be_u16(&frame, ip + 4),
                frame[ip + 12], frame[ip + 13], frame[ip + 14], frame[ip + 15],
                be_u16(&frame, ip + 20),
                frame[ip + 16], frame[ip + 17], frame[ip + 18], frame[ip + 19],
                be_u16(&frame, ip + 22),
                be_u16(&frame, ip + 10),
                be_u16(&frame, ip + 26),
            );
        }
        first.get_or_insert(ts);
        prev = Some(ts);
        frames += 1;
    }

    match (first, prev) {
        (Some(a), Some(b)) => eprintln!(
            "Read {} frames, all consistent. Timestamps {}.{:06} .. {}.{:06}.",
            frames, a.0, a.1, b.0, b.1
        ),
        _ => eprintln!("Read 0 frames (header only)."),
    }
    Ok(())
}
