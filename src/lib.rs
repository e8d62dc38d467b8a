//! Synthetic swap-intent traffic generator.
//!
//! This crate builds deterministic `.pcap` files whose UDP payloads are
//! fixed-layout swap intents, for feeding a packet-processing pipeline
//! under test (e.g. via `tcpreplay`):
//!
//! - `record`: 48-byte little-endian swap intent codec (write-only)
//! - `scenario`: seeded `small`/`large`/`tight`/`mixed` profiles
//! - `frame`: Ethernet II + IPv4 + UDP framing in network byte order
//! - `capture`: libpcap container writer with synthetic 1 ms timestamps
//! - `pipeline`: ties the four together for one reproducible run
//!
//! The binaries in this repository (`src/main.rs` and `src/bin/inspect.rs`)
//! generate capture files and check them back.
pub mod capture;
pub mod frame;
pub mod pipeline;
pub mod record;
pub mod scenario;
