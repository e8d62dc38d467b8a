//! Fixed-layout wire record for a swap intent.
//!
//! Every record is exactly [`WIRE_SIZE`] bytes, all integers little-endian:
//!
//! ```text
//! [0..8]   nonce            u64
//! [8..28]  pool_address     [u8; 20]
//! [28..36] amount_in        u64
//! [36..44] min_amount_out   u64
//! [44]     token_direction  u8 (0 or 1)
//! [45..48] reserved         zero
//! ```
//!
//! The codec is write-only. Readers of the produced captures keep their own
//! decoder; this module is the single source of truth for offsets.
use thiserror::Error;

/// Encoded size of one [`SwapIntent`].
pub const WIRE_SIZE: usize = 48;
/// Length of the opaque pool identifier.
pub const POOL_ADDRESS_LEN: usize = 20;

pub const NONCE_OFFSET: usize = 0;
pub const POOL_ADDRESS_OFFSET: usize = 8;
pub const AMOUNT_IN_OFFSET: usize = 28;
pub const MIN_AMOUNT_OUT_OFFSET: usize = 36;
pub const TOKEN_DIRECTION_OFFSET: usize = 44;
pub const RESERVED_OFFSET: usize = 45;

pub type PoolAddress = [u8; POOL_ADDRESS_LEN];
pub type EncodedRecord = [u8; WIRE_SIZE];

/// Malformed input handed to the codec. Always a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("pool address must be 20 bytes, got {len}")]
    PoolAddressLength { len: usize },
    #[error("token direction must be 0 or 1, got {0}")]
    TokenDirection(u8),
}

/// Which side of the pool the swap sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenDirection {
    ZeroForOne = 0,
    OneForZero = 1,
}

impl TryFrom<u8> for TokenDirection {
    type Error = ContractViolation;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(TokenDirection::ZeroForOne),
            1 => Ok(TokenDirection::OneForZero),
            other => Err(ContractViolation::TokenDirection(other)),
        }
    }
}

impl From<TokenDirection> for u8 {
    fn from(d: TokenDirection) -> u8 {
        d as u8
    }
}

/// A single swap intent, built per record and dropped once encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntent {
    pub nonce: u64,
    pub pool_address: PoolAddress,
    pub amount_in: u64,
    /// May exceed `amount_in`; ordering is checked downstream, not here.
    pub min_amount_out: u64,
    pub token_direction: TokenDirection,
}

impl SwapIntent {
    /// Validate raw inputs. Wide integers are masked to their low 64 bits.
    pub fn new(
        nonce: u128,
        pool_address: &[u8],
        amount_in: u128,
        min_amount_out: u128,
        token_direction: u8,
    ) -> Result<Self, ContractViolation> {
        let pool_address: PoolAddress = pool_address
            .try_into()
            .map_err(|_| ContractViolation::PoolAddressLength { len: pool_address.len() })?;
        let token_direction = TokenDirection::try_from(token_direction)?;
        Ok(Self {
            nonce: mask_u64(nonce),
            pool_address,
            amount_in: mask_u64(amount_in),
            min_amount_out: mask_u64(min_amount_out),
            token_direction,
        })
    }

    /// Serialize into the fixed little-endian layout.
    pub fn encode(&self) -> EncodedRecord {
        let mut out = [0u8; WIRE_SIZE];
        put_le_u64(&mut out, NONCE_OFFSET, self.nonce);
        out[POOL_ADDRESS_OFFSET..POOL_ADDRESS_OFFSET + POOL_ADDRESS_LEN]
            .copy_from_slice(&self.pool_address);
        put_le_u64(&mut out, AMOUNT_IN_OFFSET, self.amount_in);
        put_le_u64(&mut out, MIN_AMOUNT_OUT_OFFSET, self.min_amount_out);
        out[TOKEN_DIRECTION_OFFSET] = self.token_direction.into();
        // reserved bytes stay zero
        out
    }
}

/// Validate and encode in one step.
pub fn encode(
    nonce: u128,
    pool_address: &[u8],
    amount_in: u128,
    min_amount_out: u128,
    token_direction: u8,
) -> Result<EncodedRecord, ContractViolation> {
    SwapIntent::new(nonce, pool_address, amount_in, min_amount_out, token_direction)
        .map(|intent| intent.encode())
}

/// Wrap-around truncation, never saturating.
fn mask_u64(v: u128) -> u64 {
    (v & u128::from(u64::MAX)) as u64
}

/// Payload byte order. Network headers use `frame::put_be_u16`/`put_be_u32` instead.
fn put_le_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}
