//! Trial input generation.
//!
//! Each trial hashes a fresh random input. The Hamming test additionally
//! hashes a sibling of that input with exactly one bit flipped.

use rand::Rng;

use crate::error::{EntropyError, Result};

/// Input length used by the reference runs, in bytes.
pub const DEFAULT_INPUT_LEN: usize = 64;

/// Cryptographically strong random-byte source shared by all sampler workers.
pub trait ByteSource: Send + Sync {
    /// Fill `buf` completely, or fail.
    fn fill(&self, buf: &mut [u8]) -> std::result::Result<(), EntropyError>;
}

/// Operating-system CSPRNG via the `getrandom` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl ByteSource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> std::result::Result<(), EntropyError> {
        getrandom::fill(buf).map_err(EntropyError::from)
    }
}

/// Produces trial inputs and their one-bit-mutated siblings.
pub struct TrialGenerator<'a> {
    source: &'a dyn ByteSource,
}

impl<'a> TrialGenerator<'a> {
    pub fn new(source: &'a dyn ByteSource) -> Self {
        Self { source }
    }

    /// Return `len` random bytes from the underlying source.
    pub fn generate(&self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.source.fill(&mut data)?;
        Ok(data)
    }

    /// Copy `data` and flip one uniformly chosen bit of the copy.
    ///
    /// # Panics
    /// Panics if `data` is empty.
    pub fn mutate(&self, data: &[u8]) -> Vec<u8> {
        flip_random_bit(data)
    }
}

/// Copy `data` with one bit flipped at a uniformly random byte and bit offset.
pub fn flip_random_bit(data: &[u8]) -> Vec<u8> {
    assert!(!data.is_empty(), "cannot mutate an empty input");
    let mut rng = rand::rng();
    let byte = rng.random_range(0..data.len());
    let bit = rng.random_range(0..8u32);
    let mut mutated = data.to_vec();
    mutated[byte] ^= 1 << bit;
    mutated
}

/// Number of differing bits between two digests of equal length.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Result<u32> {
    if a.len() != b.len() {
        return Err(crate::error::ProbeError::DigestLengthMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;

    struct DeadSource;

    impl ByteSource for DeadSource {
        fn fill(&self, _buf: &mut [u8]) -> std::result::Result<(), EntropyError> {
            Err(EntropyError("source drained".into()))
        }
    }

    #[test]
    fn generate_returns_requested_length() {
        let generator = TrialGenerator::new(&OsEntropy);
        for len in [1, 32, 64, 1000] {
            assert_eq!(generator.generate(len).unwrap().len(), len);
        }
    }

    #[test]
    fn generate_is_not_constant() {
        let generator = TrialGenerator::new(&OsEntropy);
        let a = generator.generate(64).unwrap();
        let b = generator.generate(64).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn generate_surfaces_entropy_failure() {
        let generator = TrialGenerator::new(&DeadSource);
        let err = generator.generate(64).unwrap_err();
        assert!(matches!(err, ProbeError::Entropy(_)));
    }

    #[test]
    fn mutate_flips_exactly_one_bit() {
        let generator = TrialGenerator::new(&OsEntropy);
        for len in 1..=130 {
            let original = generator.generate(len).unwrap();
            let snapshot = original.clone();
            let mutated = generator.mutate(&original);
            assert_eq!(original, snapshot, "input modified in place");
            assert_eq!(mutated.len(), original.len());
            assert_eq!(hamming_distance(&original, &mutated).unwrap(), 1);
        }
    }

    #[test]
    fn mutate_reaches_every_bit_of_a_single_byte() {
        let mut seen = [false; 8];
        for _ in 0..2000 {
            let flipped = flip_random_bit(&[0u8])[0];
            seen[flipped.trailing_zeros() as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    #[should_panic(expected = "empty input")]
    fn mutate_rejects_empty_input() {
        flip_random_bit(&[]);
    }

    #[test]
    fn hamming_distance_counts_differing_bits() {
        assert_eq!(hamming_distance(&[0x00, 0xFF], &[0x00, 0xFF]).unwrap(), 0);
        assert_eq!(hamming_distance(&[0b1010_1010], &[0b0101_0101]).unwrap(), 8);
        assert_eq!(hamming_distance(&[0x01, 0x80], &[0x00, 0x00]).unwrap(), 2);
    }

    #[test]
    fn hamming_distance_rejects_length_mismatch() {
        let err = hamming_distance(&[0; 32], &[0; 31]).unwrap_err();
        assert_eq!(
            err,
            ProbeError::DigestLengthMismatch {
                expected: 32,
                actual: 31
            }
        );
    }
}
