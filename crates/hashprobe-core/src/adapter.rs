//! Uniform capability surface over the hash functions under test.
//!
//! The sampler and evaluator only ever see [`HashAdapter`] trait objects and
//! create them through a [`HashFactory`], so no code path branches on which
//! concrete algorithm is active.

use std::fmt;
use std::str::FromStr;

use sha2::Digest;

use crate::error::ProbeError;

/// A resettable, incremental hash function.
pub trait HashAdapter: Send {
    /// Feed bytes into the running state.
    fn write(&mut self, data: &[u8]);

    /// Digest of everything written since the last reset.
    ///
    /// Does not consume or disturb the running state.
    fn sum(&self) -> Vec<u8>;

    /// Return to the empty-input state.
    fn reset(&mut self);

    /// Digest length in bytes.
    fn output_len(&self) -> usize;

    /// Digest width in bits.
    fn bit_width(&self) -> usize {
        self.output_len() * 8
    }
}

/// Produces fresh adapters for one named hash function.
pub trait HashFactory: Sync {
    fn name(&self) -> &str;

    fn create(&self) -> Box<dyn HashAdapter>;
}

// ---------------------------------------------------------------------------
// Concrete adapters
// ---------------------------------------------------------------------------

/// Adapter over any RustCrypto [`Digest`] implementation.
#[derive(Clone, Default)]
pub struct DigestAdapter<D> {
    inner: D,
}

impl<D: Digest> DigestAdapter<D> {
    pub fn new() -> Self {
        Self { inner: D::new() }
    }
}

impl<D: Digest + Clone + Send> HashAdapter for DigestAdapter<D> {
    fn write(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn sum(&self) -> Vec<u8> {
        self.inner.clone().finalize().to_vec()
    }

    fn reset(&mut self) {
        self.inner = D::new();
    }

    fn output_len(&self) -> usize {
        <D as Digest>::output_size()
    }
}

/// Adapter over BLAKE3 in its default 256-bit mode.
#[derive(Clone, Default)]
pub struct Blake3Adapter {
    inner: blake3::Hasher,
}

impl Blake3Adapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashAdapter for Blake3Adapter {
    fn write(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    fn sum(&self) -> Vec<u8> {
        self.inner.finalize().as_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn output_len(&self) -> usize {
        blake3::OUT_LEN
    }
}

// ---------------------------------------------------------------------------
// Built-in algorithms
// ---------------------------------------------------------------------------

/// Hash functions shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha3_256,
    Blake3,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [Self::Sha256, Self::Sha3_256, Self::Blake3];

    /// Digest width in bits.
    pub fn bit_width(self) -> usize {
        self.create().bit_width()
    }
}

impl HashFactory for HashAlgorithm {
    fn name(&self) -> &str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha3_256 => "sha3-256",
            Self::Blake3 => "blake3",
        }
    }

    fn create(&self) -> Box<dyn HashAdapter> {
        match self {
            Self::Sha256 => Box::new(DigestAdapter::<sha2::Sha256>::new()),
            Self::Sha3_256 => Box::new(DigestAdapter::<sha3::Sha3_256>::new()),
            Self::Blake3 => Box::new(Blake3Adapter::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha3-256" | "sha3" => Ok(Self::Sha3_256),
            "blake3" => Ok(Self::Blake3),
            other => Err(ProbeError::InvalidConfig(format!(
                "unknown hash algorithm '{other}'"
            ))),
        }
    }
}

/// Factory built from a name and a constructor closure.
pub struct FnFactory<F> {
    name: String,
    make: F,
}

impl<F> FnFactory<F>
where
    F: Fn() -> Box<dyn HashAdapter> + Sync,
{
    pub fn new(name: impl Into<String>, make: F) -> Self {
        Self {
            name: name.into(),
            make,
        }
    }
}

impl<F> HashFactory for FnFactory<F>
where
    F: Fn() -> Box<dyn HashAdapter> + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self) -> Box<dyn HashAdapter> {
        (self.make)()
    }
}

// ---------------------------------------------------------------------------
// Simulated hashes
// ---------------------------------------------------------------------------

/// Synthetic hashes with known statistics, for calibrating the tests
/// themselves.
pub mod simulated {
    use rand::Rng;

    use super::HashAdapter;

    /// Ideal random oracle: every digest bit is an independent fair coin,
    /// unrelated to the input.
    #[derive(Debug, Clone)]
    pub struct IdealOracle {
        output_len: usize,
    }

    impl IdealOracle {
        pub fn new(output_len: usize) -> Self {
            Self { output_len }
        }
    }

    impl HashAdapter for IdealOracle {
        fn write(&mut self, _data: &[u8]) {}

        fn sum(&self) -> Vec<u8> {
            let mut digest = vec![0u8; self.output_len];
            rand::rng().fill(&mut digest[..]);
            digest
        }

        fn reset(&mut self) {}

        fn output_len(&self) -> usize {
            self.output_len
        }
    }

    /// Wraps another adapter and forces one digest bit to 1.
    ///
    /// Bit `k` is bit `k % 8` (LSB first) of byte `k / 8`.
    pub struct StuckBit {
        inner: Box<dyn HashAdapter>,
        bit: usize,
    }

    impl StuckBit {
        pub fn new(inner: Box<dyn HashAdapter>, bit: usize) -> Self {
            assert!(bit < inner.bit_width(), "bit {bit} outside digest");
            Self { inner, bit }
        }
    }

    impl HashAdapter for StuckBit {
        fn write(&mut self, data: &[u8]) {
            self.inner.write(data);
        }

        fn sum(&self) -> Vec<u8> {
            let mut digest = self.inner.sum();
            digest[self.bit / 8] |= 1 << (self.bit % 8);
            digest
        }

        fn reset(&mut self) {
            self.inner.reset();
        }

        fn output_len(&self) -> usize {
            self.inner.output_len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::simulated::{IdealOracle, StuckBit};
    use super::*;

    #[test]
    fn known_answer_vectors() {
        let mut sha = HashAlgorithm::Sha256.create();
        sha.write(b"abc");
        assert_eq!(
            sha.sum()[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "SHA-256(\"abc\") prefix"
        );

        let mut sha3 = HashAlgorithm::Sha3_256.create();
        sha3.write(b"abc");
        assert_eq!(sha3.sum()[..4], [0x3a, 0x98, 0x5d, 0xa7]);

        let mut b3 = HashAlgorithm::Blake3.create();
        b3.write(b"abc");
        assert_eq!(b3.sum(), blake3::hash(b"abc").as_bytes().to_vec());
    }

    #[test]
    fn all_builtins_are_256_bit() {
        for algo in HashAlgorithm::ALL {
            assert_eq!(algo.create().output_len(), 32, "{algo}");
            assert_eq!(algo.bit_width(), 256);
        }
    }

    #[test]
    fn reset_then_same_input_is_idempotent() {
        for algo in HashAlgorithm::ALL {
            let mut h = algo.create();
            h.write(b"first input");
            let first = h.sum();
            h.reset();
            h.write(b"first input");
            assert_eq!(h.sum(), first, "{algo}");
        }
    }

    #[test]
    fn sum_is_non_destructive() {
        for algo in HashAlgorithm::ALL {
            let mut h = algo.create();
            h.write(b"hello ");
            let partial = h.sum();
            assert_eq!(h.sum(), partial, "{algo}: repeated sum changed");
            h.write(b"world");

            let mut whole = algo.create();
            whole.write(b"hello world");
            assert_eq!(h.sum(), whole.sum(), "{algo}: sum disturbed state");
        }
    }

    #[test]
    fn reset_matches_fresh_adapter() {
        for algo in HashAlgorithm::ALL {
            let mut used = algo.create();
            used.write(b"noise");
            used.reset();
            assert_eq!(used.sum(), algo.create().sum(), "{algo}");
        }
    }

    #[test]
    fn algorithm_names_round_trip() {
        for algo in HashAlgorithm::ALL {
            assert_eq!(algo.to_string().parse::<HashAlgorithm>().unwrap(), algo);
        }
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("sha3_256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha3_256);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn fn_factory_uses_closure() {
        let factory = FnFactory::new("oracle-16", || Box::new(IdealOracle::new(16)));
        assert_eq!(factory.name(), "oracle-16");
        assert_eq!(factory.create().bit_width(), 128);
    }

    #[test]
    fn stuck_bit_is_always_set() {
        let mut h = StuckBit::new(Box::new(IdealOracle::new(32)), 13);
        for _ in 0..200 {
            h.write(b"x");
            assert_ne!(h.sum()[1] & (1 << 5), 0);
            h.reset();
        }
    }
}
