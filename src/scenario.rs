//! Scenario profiles that drive downstream accept/reject paths.
//!
//! A [`ScenarioGenerator`] owns the run's only random source. Each call to
//! [`ScenarioGenerator::intent`] advances it in a fixed order per class, so a
//! given `(profile, seed, count)` always yields the same intents.
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use crate::record::{PoolAddress, SwapIntent, TokenDirection};

/// ETH/USDC pool id.
pub const POOL_ETH_USDC: PoolAddress = [
    0xA0, 0xB8, 0x69, 0x91, 0xC6, 0x21, 0x8B, 0x36, 0xC1, 0xD1, 0x9D, 0x4A, 0x2E, 0x9E, 0xB0, 0xCE,
    0x36, 0x06, 0xEB, 0x48,
];
/// WBTC/ETH pool id.
pub const POOL_WBTC_ETH: PoolAddress = [
    0xCB, 0xCD, 0xF9, 0x62, 0x6B, 0xC0, 0x3E, 0x24, 0xF7, 0x79, 0x43, 0x41, 0x78, 0xA7, 0x3A, 0x0B,
    0x4B, 0xAD, 0x62, 0xED,
];

const LARGE_POOLS: [PoolAddress; 2] = [POOL_ETH_USDC, POOL_WBTC_ETH];

/// Below the downstream minimum of 1_000_000, so these get dropped.
pub const SMALL_AMOUNT_IN: (u64, u64) = (1, 999_999);
pub const LARGE_AMOUNT_IN: (u64, u64) = (10_000_000, 200_000_000);
pub const TIGHT_AMOUNT_IN: (u64, u64) = (5_000_000, 50_000_000);

pub const LARGE_MIN_OUT_RATIO: f64 = 0.90;
pub const TIGHT_MIN_OUT_RATIO: f64 = 0.999;

/// Concrete class of a single generated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioClass {
    /// Below the acceptance threshold.
    Small,
    /// Slippage tight enough to revert after a front-run.
    Tight,
    /// Profitable target with generous slippage.
    Large,
}

impl ScenarioClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioClass::Small => "small",
            ScenarioClass::Tight => "tight",
            ScenarioClass::Large => "large",
        }
    }
}

impl fmt::Display for ScenarioClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named generation profile selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Profile {
    Small,
    Large,
    Tight,
    /// `small, tight, large, large` by `index % 4`.
    #[default]
    Mixed,
}

impl Profile {
    /// Class of the record at `index`. Never random, even for `Mixed`.
    pub fn class_for(self, index: u64) -> ScenarioClass {
        match self {
            Profile::Small => ScenarioClass::Small,
            Profile::Large => ScenarioClass::Large,
            Profile::Tight => ScenarioClass::Tight,
            Profile::Mixed => match index % 4 {
                0 => ScenarioClass::Small,
                1 => ScenarioClass::Tight,
                _ => ScenarioClass::Large,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Small => "small",
            Profile::Large => "large",
            Profile::Tight => "tight",
            Profile::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown profile '{0}' (expected small, large, tight or mixed)")]
pub struct UnknownProfile(pub String);

impl FromStr for Profile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(Profile::Small),
            "large" => Ok(Profile::Large),
            "tight" => Ok(Profile::Tight),
            "mixed" => Ok(Profile::Mixed),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

/// Deterministic producer of swap intents.
#[derive(Debug)]
pub struct ScenarioGenerator {
    profile: Profile,
    rng: StdRng,
}

impl ScenarioGenerator {
    pub fn new(profile: Profile, seed: u64) -> Self {
        Self { profile, rng: StdRng::seed_from_u64(seed) }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// The shared random source. Frame identification draws come from here
    /// too, so that a run has exactly one stream of randomness.
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Build the intent for record `index`; `index` doubles as the nonce.
    pub fn intent(&mut self, index: u64) -> (ScenarioClass, SwapIntent) {
        let class = self.profile.class_for(index);
        let intent = match class {
            ScenarioClass::Small => small_swap(index, &mut self.rng),
            ScenarioClass::Tight => tight_swap(index, &mut self.rng),
            ScenarioClass::Large => large_swap(index, &mut self.rng),
        };
        debug!(index, %class, amount_in = intent.amount_in, "generated intent");
        (class, intent)
    }
}

fn random_direction<R: Rng>(rng: &mut R) -> TokenDirection {
    if rng.gen_range(0..=1u8) == 0 {
        TokenDirection::ZeroForOne
    } else {
        TokenDirection::OneForZero
    }
}

/// `floor(amount * ratio)` in double precision.
fn min_out(amount_in: u64, ratio: f64) -> u64 {
    (amount_in as f64 * ratio) as u64
}

fn small_swap<R: Rng>(nonce: u64, rng: &mut R) -> SwapIntent {
    let amount_in = rng.gen_range(SMALL_AMOUNT_IN.0..=SMALL_AMOUNT_IN.1);
    let token_direction = random_direction(rng);
    SwapIntent {
        nonce,
        pool_address: POOL_ETH_USDC,
        amount_in,
        min_amount_out: 1,
        token_direction,
    }
}

fn large_swap<R: Rng>(nonce: u64, rng: &mut R) -> SwapIntent {
    let amount_in = rng.gen_range(LARGE_AMOUNT_IN.0..=LARGE_AMOUNT_IN.1);
    let pool_address = LARGE_POOLS[rng.gen_range(0..LARGE_POOLS.len())];
    let token_direction = random_direction(rng);
    SwapIntent {
        nonce,
        pool_address,
        amount_in,
        min_amount_out: min_out(amount_in, LARGE_MIN_OUT_RATIO),
        token_direction,
    }
}

fn tight_swap<R: Rng>(nonce: u64, rng: &mut R) -> SwapIntent {
    let amount_in = rng.gen_range(TIGHT_AMOUNT_IN.0..=TIGHT_AMOUNT_IN.1);
    SwapIntent {
        nonce,
        pool_address: POOL_ETH_USDC,
        amount_in,
        min_amount_out: min_out(amount_in, TIGHT_MIN_OUT_RATIO),
        token_direction: TokenDirection::ZeroForOne,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_cycles_by_index() {
        use ScenarioClass::*;
        let classes: Vec<_> = (0..8).map(|i| Profile::Mixed.class_for(i)).collect();
        assert_eq!(classes, vec![Small, Tight, Large, Large, Small, Tight, Large, Large]);
    }

    #[test]
    fn fixed_profiles_never_vary() {
        for i in 0..16 {
            assert_eq!(Profile::Small.class_for(i), ScenarioClass::Small);
            assert_eq!(Profile::Large.class_for(i), ScenarioClass::Large);
            assert_eq!(Profile::Tight.class_for(i), ScenarioClass::Tight);
        }
    }

    #[test]
    fn small_stays_below_threshold() {
        let mut g = ScenarioGenerator::new(Profile::Small, 7);
        for i in 0..500 {
            let (class, s) = g.intent(i);
            assert_eq!(class, ScenarioClass::Small);
            assert!((1..=999_999).contains(&s.amount_in));
            assert_eq!(s.min_amount_out, 1);
            assert_eq!(s.nonce, i);
            assert_eq!(s.pool_address, POOL_ETH_USDC);
        }
    }

    #[test]
    fn large_uses_generous_slippage() {
        let mut g = ScenarioGenerator::new(Profile::Large, 7);
        let mut seen_pools = std::collections::HashSet::new();
        for i in 0..500 {
            let (_, s) = g.intent(i);
            assert!((10_000_000..=200_000_000).contains(&s.amount_in));
            assert_eq!(s.min_amount_out, (s.amount_in as f64 * 0.90) as u64);
            assert!(LARGE_POOLS.contains(&s.pool_address));
            seen_pools.insert(s.pool_address);
        }
        assert_eq!(seen_pools.len(), 2);
    }

    #[test]
    fn tight_is_fixed_direction_and_pool() {
        let mut g = ScenarioGenerator::new(Profile::Tight, 99);
        for i in 0..500 {
            let (_, s) = g.intent(i);
            assert!((5_000_000..=50_000_000).contains(&s.amount_in));
            assert_eq!(s.min_amount_out, (s.amount_in as f64 * 0.999) as u64);
            assert!(s.min_amount_out < s.amount_in);
            assert_eq!(s.token_direction, TokenDirection::ZeroForOne);
            assert_eq!(s.pool_address, POOL_ETH_USDC);
        }
    }

    #[test]
    fn same_seed_same_intents() {
        let mut a = ScenarioGenerator::new(Profile::Mixed, 42);
        let mut b = ScenarioGenerator::new(Profile::Mixed, 42);
        for i in 0..64 {
            assert_eq!(a.intent(i), b.intent(i));
        }
    }

    #[test]
    fn different_seed_diverges() {
        let mut a = ScenarioGenerator::new(Profile::Large, 1);
        let mut b = ScenarioGenerator::new(Profile::Large, 2);
        let xs: Vec<_> = (0..16).map(|i| a.intent(i).1).collect();
        let ys: Vec<_> = (0..16).map(|i| b.intent(i).1).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn profile_parses() {
        assert_eq!("MIXED".parse::<Profile>().unwrap(), Profile::Mixed);
        assert_eq!("tight".parse::<Profile>().unwrap(), Profile::Tight);
        assert!("huge".parse::<Profile>().is_err());
        assert_eq!(Profile::default().to_string(), "mixed");
    }
}
