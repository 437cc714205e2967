//! Deterministic RNG streams segregated by engine domain.
//!
//! Every random decision the engine makes draws from one of five streams
//! derived from a single user-visible seed. Stream positions are counted so
//! a restored session can fast-forward each stream past the draws that were
//! already spent, instead of re-rolling decisions that are cached in the
//! snapshot.

use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Draw counters for every stream, persisted as part of the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngCounters {
    pub dice: u64,
    pub board: u64,
    pub tasks: u64,
    pub side_events: u64,
    pub prize: u64,
}

/// Deterministic bundle of RNG streams segregated by engine domain.
#[derive(Debug, Clone)]
pub struct RngBundle {
    dice: CountingRng<SmallRng>,
    board: CountingRng<SmallRng>,
    tasks: CountingRng<SmallRng>,
    side_events: CountingRng<SmallRng>,
    prize: CountingRng<SmallRng>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            dice: CountingRng::new(derive_stream_seed(seed, b"dice")),
            board: CountingRng::new(derive_stream_seed(seed, b"board")),
            tasks: CountingRng::new(derive_stream_seed(seed, b"tasks")),
            side_events: CountingRng::new(derive_stream_seed(seed, b"side-events")),
            prize: CountingRng::new(derive_stream_seed(seed, b"prize")),
        }
    }

    /// Rebuild the bundle at the stream positions recorded in `counters`.
    ///
    /// `SmallRng` is a 64-bit generator whose `next_u32` is derived from a
    /// single 64-bit step, so replaying `next_u64` once per recorded draw
    /// lands every stream at its persisted position.
    #[must_use]
    pub fn restore(seed: u64, counters: RngCounters) -> Self {
        let mut bundle = Self::from_user_seed(seed);
        bundle.dice.fast_forward(counters.dice);
        bundle.board.fast_forward(counters.board);
        bundle.tasks.fast_forward(counters.tasks);
        bundle.side_events.fast_forward(counters.side_events);
        bundle.prize.fast_forward(counters.prize);
        bundle
    }

    /// Snapshot the current stream positions.
    #[must_use]
    pub const fn counters(&self) -> RngCounters {
        RngCounters {
            dice: self.dice.draws(),
            board: self.board.draws(),
            tasks: self.tasks.draws(),
            side_events: self.side_events.draws(),
            prize: self.prize.draws(),
        }
    }

    pub fn dice(&mut self) -> &mut CountingRng<SmallRng> {
        &mut self.dice
    }

    pub fn board(&mut self) -> &mut CountingRng<SmallRng> {
        &mut self.board
    }

    pub fn tasks(&mut self) -> &mut CountingRng<SmallRng> {
        &mut self.tasks
    }

    pub fn side_events(&mut self) -> &mut CountingRng<SmallRng> {
        &mut self.side_events
    }

    pub fn prize(&mut self) -> &mut CountingRng<SmallRng> {
        &mut self.prize
    }
}

/// Counting wrapper for RNG streams providing draw instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }

    fn fast_forward(&mut self, draws: u64) {
        use rand::RngCore;
        for _ in 0..draws {
            let _ = self.rng.next_u64();
        }
        self.draws = draws;
    }
}

impl<R: rand::RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: rand::RngCore> rand::RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        (self.rng.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}
