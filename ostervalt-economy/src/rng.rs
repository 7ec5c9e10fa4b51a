//! Deterministic RNG streams segregated by engine domain.
use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;

/// Independent streams so that, for a fixed seed, crime outcomes do not shift
/// when message lists change length.
#[derive(Debug, Clone)]
pub struct RngStreams {
    crime: ChaCha20Rng,
    messages: ChaCha20Rng,
}

impl RngStreams {
    /// Construct the streams from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            crime: ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, b"crime")),
            messages: ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, b"messages")),
        }
    }

    pub fn crime(&mut self) -> &mut ChaCha20Rng {
        &mut self.crime
    }

    pub fn messages(&mut self) -> &mut ChaCha20Rng {
        &mut self.messages
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&user_seed.to_le_bytes())
        .expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}
