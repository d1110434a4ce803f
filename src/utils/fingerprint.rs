// src/utils/fingerprint.rs

//! Order-insensitive set fingerprints.
//!
//! A fingerprint starts from the SHA-256 digest of a seed token and XORs in
//! the SHA-256 digest of every item. XOR is commutative and associative, so
//! the result does not depend on item order: `["2013", "USA", "CHN"]` and
//! `["2013", "CHN", "USA"]` collapse onto the same key.
//!
//! Keys are only comparable between hashers built from the same seed. The
//! seed is stored in the checkpoint manifest so resumed runs keep using the
//! key space their persisted stores were built with.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Width of a fingerprint in bytes.
pub const DIGEST_LEN: usize = 32;

/// Lowercase hex rendering of a set digest, used as an aggregation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seeded hasher producing [`Fingerprint`]s.
#[derive(Debug, Clone)]
pub struct FingerprintHasher {
    seed: Uuid,
    base: [u8; DIGEST_LEN],
}

impl FingerprintHasher {
    /// Create a hasher for the given seed token.
    pub fn new(seed: Uuid) -> Self {
        Self {
            seed,
            base: Sha256::digest(seed.as_bytes()).into(),
        }
    }

    /// Create a hasher with a fresh random seed.
    pub fn random() -> Self {
        Self::new(Uuid::new_v4())
    }

    /// The seed token this hasher was built from.
    pub fn seed(&self) -> Uuid {
        self.seed
    }

    /// Fingerprint a collection of strings, ignoring their order.
    ///
    /// An empty collection yields the digest of the seed alone.
    pub fn fingerprint<I, S>(&self, items: I) -> Fingerprint
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut combined = self.base;
        for item in items {
            let digest: [u8; DIGEST_LEN] = Sha256::digest(item.as_ref().as_bytes()).into();
            xor_into(&mut combined, &digest);
        }
        Fingerprint(hex::encode(combined))
    }

    /// Key for an entity pair observed in a given year.
    ///
    /// A pair of identical codes is reduced to the single code, otherwise the
    /// two equal digests would cancel each other out.
    pub fn pair_key(&self, year: &str, code1: &str, code2: &str) -> Fingerprint {
        if code1 == code2 {
            self.fingerprint([year, code1])
        } else {
            self.fingerprint([year, code1, code2])
        }
    }
}

fn xor_into(acc: &mut [u8; DIGEST_LEN], other: &[u8; DIGEST_LEN]) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a ^= b;
    }
}
