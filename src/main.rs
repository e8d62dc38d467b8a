use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use swap_traffic::capture::DEFAULT_BASE_TS;
use swap_traffic::frame::{Addressing, ChecksumMode, Identification, MacAddr};
use swap_traffic::pipeline::{generate_capture, GeneratorConfig, RunSummary};
use swap_traffic::record::WIRE_SIZE;
use swap_traffic::scenario::Profile;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Generate swap-intent .pcap traffic for replay")]
struct Args {
    /// Number of packets to generate
    #[arg(long, env = "SWAP_COUNT", default_value_t = 100)]
    count: u64,

    /// Scenario profile: small, large, tight or mixed
    #[arg(long, env = "SWAP_MODE", default_value = "mixed")]
    mode: Profile,

    /// Output .pcap path; parent directories are created
    #[arg(long, env = "SWAP_OUT", default_value = "traffic/mock_tx.pcap")]
    out: PathBuf,

    /// Random seed for reproducibility
    #[arg(long, env = "SWAP_SEED", default_value_t = 42)]
    seed: u64,

    /// Timestamp of the first packet, in Unix seconds
    #[arg(long, default_value_t = DEFAULT_BASE_TS)]
    base_ts: u32,

    #[arg(long, default_value = "192.168.69.1")]
    src_ip: Ipv4Addr,

    #[arg(long, default_value = "192.168.69.2")]
    dst_ip: Ipv4Addr,

    #[arg(long, default_value_t = 54321)]
    src_port: u16,

    #[arg(long, default_value_t = 8080)]
    dst_port: u16,

    #[arg(long, default_value = "00:11:22:33:44:55")]
    src_mac: MacAddr,

    #[arg(long, default_value = "02:00:00:00:00:01")]
    dst_mac: MacAddr,

    /// IPv4/UDP checksums: zero (left for the replayer) or compute
    #[arg(long, default_value = "zero")]
    checksums: ChecksumMode,

    /// IPv4 identification: random (seeded) or sequential
    #[arg(long, default_value = "random")]
    ip_id: Identification,
}

impl Args {
    fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            count: self.count,
            profile: self.mode,
            seed: self.seed,
            base_ts: self.base_ts,
            addressing: Addressing {
                src_mac: self.src_mac,
                dst_mac: self.dst_mac,
                src_ip: self.src_ip,
                dst_ip: self.dst_ip,
                src_port: self.src_port,
                dst_port: self.dst_port,
            },
            checksums: self.checksums,
            identification: self.ip_id,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn format_ts(secs: u32, usec: u32) -> String {
    let fmt = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3] UTC"
    );
    OffsetDateTime::from_unix_timestamp(i64::from(secs))
        .map(|t| t + Duration::microseconds(i64::from(usec)))
        .ok()
        .and_then(|t| t.format(&fmt).ok())
        .unwrap_or_else(|| format!("{secs}.{usec:06}"))
}

fn print_summary(args: &Args, s: &RunSummary) {
    println!("[swap_traffic] Written {} packets to {}", s.capture.frames, args.out.display());
    println!("  SwapIntent wire size: {WIRE_SIZE} bytes per packet");
    println!(
        "  Mode: {}, seed: {} (small={}, tight={}, large={})",
        s.profile, s.seed, s.classes.small, s.classes.tight, s.classes.large
    );
    if let Some((sec, usec)) = s.capture.last_ts {
        println!("  Window: {} .. {}", format_ts(s.base_ts, 0), format_ts(sec, usec));
    }
    println!("  File: {} bytes, crc32 {:08x}", s.capture.bytes, s.capture.crc32);
    println!("  Replay with: tcpreplay --intf1=tap0 --mbps=100 {}", args.out.display());
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    let args = Args::parse();
    init_tracing();

    let cfg = args.config();
    let summary = generate_capture(&cfg, &args.out)
        .with_context(|| format!("generating {}", args.out.display()))?;
    print_summary(&args, &summary);
    Ok(())
}
