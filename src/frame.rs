//! Ethernet II / IPv4 / UDP framing around an arbitrary payload.
//!
//! All header fields are written in network byte order through
//! [`put_be_u16`] and [`put_be_u32`]. The swap payload keeps its own
//! little-endian layout; the two encodings never share a writer.
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use rand::Rng;
use thiserror::Error;

pub const ETH_HEADER_LEN: usize = 14;
pub const IPV4_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;
/// Link + network + transport overhead in front of the payload.
pub const HEADERS_LEN: usize = ETH_HEADER_LEN + IPV4_HEADER_LEN + UDP_HEADER_LEN;
/// Largest payload whose IPv4 total length still fits in 16 bits.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - IPV4_HEADER_LEN - UDP_HEADER_LEN;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const IPPROTO_UDP: u8 = 17;
/// Version 4, IHL 5 (no options).
const IPV4_VERSION_IHL: u8 = 0x45;
/// Don't Fragment, offset 0.
const IPV4_FLAGS_DF: u16 = 0x4000;
const IPV4_TTL: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("payload of {len} bytes exceeds the IPv4 limit of {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// 48-bit hardware address, stored in transmission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address '{0}' (expected six hex octets separated by ':')")]
pub struct InvalidMac(pub String);

impl FromStr for MacAddr {
    type Err = InvalidMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split(':');
        for slot in out.iter_mut() {
            let part = parts.next().ok_or_else(|| InvalidMac(s.to_string()))?;
            if part.len() != 2 {
                return Err(InvalidMac(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| InvalidMac(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(InvalidMac(s.to_string()));
        }
        Ok(MacAddr(out))
    }
}

/// Endpoints stamped into every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl Default for Addressing {
    fn default() -> Self {
        Self {
            src_mac: MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            dst_mac: MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            src_ip: Ipv4Addr::new(192, 168, 69, 1),
            dst_ip: Ipv4Addr::new(192, 168, 69, 2),
            src_port: 54321,
            dst_port: 8080,
        }
    }
}

/// How IPv4 and UDP checksum fields are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Both fields left zero. Legal for UDP over IPv4; the replay side is
    /// expected to recompute or ignore the IPv4 one.
    #[default]
    Zero,
    /// Real IPv4 header checksum and UDP pseudo-header checksum.
    Compute,
}

impl FromStr for ChecksumMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zero" => Ok(ChecksumMode::Zero),
            "compute" => Ok(ChecksumMode::Compute),
            other => Err(format!("unknown checksum mode '{other}' (expected zero or compute)")),
        }
    }
}

/// Source of the IPv4 identification field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Identification {
    /// Uniform in `1..=65535`, drawn from the run's seeded source.
    #[default]
    Random,
    /// `(index % 65535) + 1`; consumes no randomness.
    Sequential,
}

impl Identification {
    pub fn next<R: Rng>(self, index: u64, rng: &mut R) -> u16 {
        match self {
            Identification::Random => rng.gen_range(1..=u16::MAX),
            Identification::Sequential => (index % u64::from(u16::MAX)) as u16 + 1,
        }
    }
}

impl FromStr for Identification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Identification::Random),
            "sequential" => Ok(Identification::Sequential),
            other => Err(format!("unknown ip-id policy '{other}' (expected random or sequential)")),
        }
    }
}

/// One raw link-layer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes after the UDP header.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADERS_LEN..]
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameBuilder {
    addressing: Addressing,
    checksums: ChecksumMode,
}

impl FrameBuilder {
    pub fn new(addressing: Addressing, checksums: ChecksumMode) -> Self {
        Self { addressing, checksums }
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    pub fn checksums(&self) -> ChecksumMode {
        self.checksums
    }

    /// Wrap `payload` in Ethernet, IPv4 and UDP headers.
    ///
    /// Lengths are derived from `payload.len()` only. No options, VLAN
    /// tags or fragmentation.
    pub fn wrap(&self, payload: &[u8], identification: u16) -> Result<Frame, FrameError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge { len: payload.len(), max: MAX_PAYLOAD_LEN });
        }
        let udp_len = (UDP_HEADER_LEN + payload.len()) as u16;
        let ip_len = IPV4_HEADER_LEN as u16 + udp_len;
        let a = &self.addressing;

        let mut b = vec![0u8; HEADERS_LEN + payload.len()];

        // Ethernet II
        b[0..6].copy_from_slice(&a.dst_mac.0);
        b[6..12].copy_from_slice(&a.src_mac.0);
        put_be_u16(&mut b, 12, ETHERTYPE_IPV4);

        // IPv4
        let ip = ETH_HEADER_LEN;
        b[ip] = IPV4_VERSION_IHL;
        b[ip + 1] = 0; // DSCP/ECN
        put_be_u16(&mut b, ip + 2, ip_len);
        put_be_u16(&mut b, ip + 4, identification);
        put_be_u16(&mut b, ip + 6, IPV4_FLAGS_DF);
        b[ip + 8] = IPV4_TTL;
        b[ip + 9] = IPPROTO_UDP;
        put_be_u32(&mut b, ip + 12, u32::from(a.src_ip));
        put_be_u32(&mut b, ip + 16, u32::from(a.dst_ip));

        // UDP
        let udp = ip + IPV4_HEADER_LEN;
        put_be_u16(&mut b, udp, a.src_port);
        put_be_u16(&mut b, udp + 2, a.dst_port);
        put_be_u16(&mut b, udp + 4, udp_len);

        b[HEADERS_LEN..].copy_from_slice(payload);

        if self.checksums == ChecksumMode::Compute {
            let ip_sum = internet_checksum(&b[ip..udp]);
            put_be_u16(&mut b, ip + 10, ip_sum);
            let udp_sum = udp_checksum(a.src_ip, a.dst_ip, &b[udp..]);
            put_be_u16(&mut b, udp + 6, udp_sum);
        }

        Ok(Frame { bytes: b })
    }
}

/// Network byte order.
pub fn put_be_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_be_bytes());
}

/// Network byte order.
pub fn put_be_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_be_bytes());
}

fn ones_complement_sum(mut acc: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for c in &mut chunks {
        acc += u32::from(u16::from_be_bytes([c[0], c[1]]));
    }
    if let [last] = chunks.remainder() {
        acc += u32::from(*last) << 8;
    }
    acc
}

fn fold(mut acc: u32) -> u16 {
    while acc > 0xFFFF {
        acc = (acc & 0xFFFF) + (acc >> 16);
    }
    !(acc as u16)
}

/// RFC 1071 checksum over `data`.
pub fn internet_checksum(data: &[u8]) -> u16 {
    fold(ones_complement_sum(0, data))
}

/// UDP checksum including the IPv4 pseudo-header. `segment` is the UDP
/// header (checksum field zero) plus payload.
pub fn udp_checksum(src: Ipv4Addr, dst: Ipv4Addr, segment: &[u8]) -> u16 {
    let mut pseudo = [0u8; 12];
    pseudo[0..4].copy_from_slice(&src.octets());
    pseudo[4..8].copy_from_slice(&dst.octets());
    pseudo[9] = IPPROTO_UDP;
    put_be_u16(&mut pseudo, 10, segment.len() as u16);
    let acc = ones_complement_sum(ones_complement_sum(0, &pseudo), segment);
    match fold(acc) {
        // zero means "no checksum" on the wire
        0 => 0xFFFF,
        sum => sum,
    }
}
