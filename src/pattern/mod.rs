//! Data pattern definitions and buffer generation
//!
//! A data pattern describes the expected byte content of an IO buffer. The
//! same spec drives both sides of a transfer: `fill_buffer` generates the
//! write-side data, and the verification engine checks read-side data
//! against it. The spec is immutable for the duration of a run.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Kind of data pattern carried in IO buffers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PatternKind {
    /// Consecutive 8-byte little-endian integers holding their own byte
    /// offset, optionally OR'd with a prefix and/or bit-inverted
    Sequenced,
    /// A configured byte string of arbitrary length
    Hex,
    /// Every byte equals one configured byte value
    SingleChar,
    /// Per-buffer checksum. Named but not yet supported by the verification
    /// engine, which logs an error and reports zero mismatches for it.
    Checksum,
    /// Seeded pseudo-random bytes. Generation only: the verification engine
    /// does not understand this kind.
    Random,
}

/// Data pattern specification for one target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataPatternSpec {
    /// Pattern kind; `None` means no pattern was configured
    #[serde(default)]
    pub kind: Option<PatternKind>,
    /// Pattern bytes for `Hex` (the full string) and `SingleChar` (first byte)
    #[serde(default)]
    pub bytes: Vec<u8>,
    /// Repeat the hex pattern cyclically across the whole buffer instead of
    /// comparing only the first `bytes.len()` bytes
    #[serde(default)]
    pub replicate: bool,
    /// OR'd into every expected value of a sequenced pattern
    #[serde(default)]
    pub prefix: Option<u64>,
    /// One's-complement every expected value of a sequenced pattern
    #[serde(default)]
    pub inverse: bool,
    /// Seed for the random pattern
    #[serde(default)]
    pub seed: u64,
}

impl DataPatternSpec {
    /// Expected 8-byte integer for a sequenced pattern at an absolute byte
    /// offset
    #[inline]
    pub fn sequenced_value(&self, byte_offset: u64) -> u64 {
        let mut expected = byte_offset;
        if let Some(prefix) = self.prefix {
            expected |= prefix;
        }
        if self.inverse {
            expected = !expected;
        }
        expected
    }
}

/// Fill a write buffer with the configured pattern
///
/// `byte_offset` is the absolute offset the buffer will be written to; the
/// sequenced pattern embeds it, and the random pattern folds it into the
/// seed so distinct blocks carry distinct data. `Checksum` and unset
/// patterns leave the buffer untouched.
pub fn fill_buffer(spec: &DataPatternSpec, buffer: &mut [u8], byte_offset: u64) {
    match spec.kind {
        Some(PatternKind::Sequenced) => fill_sequenced(spec, buffer, byte_offset),
        Some(PatternKind::Hex) => fill_hex(spec, buffer),
        Some(PatternKind::SingleChar) => {
            if let Some(&byte) = spec.bytes.first() {
                buffer.fill(byte);
            }
        }
        Some(PatternKind::Random) => fill_random(spec, buffer, byte_offset),
        Some(PatternKind::Checksum) | None => {}
    }
}

fn fill_sequenced(spec: &DataPatternSpec, buffer: &mut [u8], byte_offset: u64) {
    for (i, chunk) in buffer.chunks_exact_mut(8).enumerate() {
        let expected = spec.sequenced_value(byte_offset + (i as u64) * 8);
        chunk.copy_from_slice(&expected.to_le_bytes());
    }
}

fn fill_hex(spec: &DataPatternSpec, buffer: &mut [u8]) {
    if spec.bytes.is_empty() {
        return;
    }
    let span = if spec.replicate {
        buffer.len()
    } else {
        spec.bytes.len().min(buffer.len())
    };
    for (i, byte) in buffer[..span].iter_mut().enumerate() {
        *byte = spec.bytes[i % spec.bytes.len()];
    }
}

fn fill_random(spec: &DataPatternSpec, buffer: &mut [u8], byte_offset: u64) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(spec.seed.wrapping_add(byte_offset));
    rng.fill_bytes(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequenced_spec() -> DataPatternSpec {
        DataPatternSpec {
            kind: Some(PatternKind::Sequenced),
            ..Default::default()
        }
    }

    #[test]
    fn test_fill_sequenced_embeds_offsets() {
        let spec = sequenced_spec();
        let mut buffer = vec![0u8; 32];
        fill_buffer(&spec, &mut buffer, 4096);

        for i in 0..4 {
            let word = u64::from_le_bytes(buffer[i * 8..i * 8 + 8].try_into().unwrap());
            assert_eq!(word, 4096 + (i as u64) * 8);
        }
    }

    #[test]
    fn test_fill_sequenced_prefix_and_inverse() {
        let spec = DataPatternSpec {
            kind: Some(PatternKind::Sequenced),
            prefix: Some(0x0123 << 48),
            inverse: true,
            ..Default::default()
        };
        let mut buffer = vec![0u8; 8];
        fill_buffer(&spec, &mut buffer, 16);

        let word = u64::from_le_bytes(buffer[..8].try_into().unwrap());
        assert_eq!(word, !((0x0123u64 << 48) | 16));
    }

    #[test]
    fn test_fill_hex_replicates_cyclically() {
        let spec = DataPatternSpec {
            kind: Some(PatternKind::Hex),
            bytes: vec![0xde, 0xad, 0xbe],
            replicate: true,
            ..Default::default()
        };
        let mut buffer = vec![0u8; 7];
        fill_buffer(&spec, &mut buffer, 0);
        assert_eq!(buffer, vec![0xde, 0xad, 0xbe, 0xde, 0xad, 0xbe, 0xde]);
    }

    #[test]
    fn test_fill_hex_without_replicate_touches_prefix_only() {
        let spec = DataPatternSpec {
            kind: Some(PatternKind::Hex),
            bytes: vec![0xaa, 0xbb],
            ..Default::default()
        };
        let mut buffer = vec![0u8; 6];
        fill_buffer(&spec, &mut buffer, 0);
        assert_eq!(buffer, vec![0xaa, 0xbb, 0, 0, 0, 0]);
    }

    #[test]
    fn test_fill_single_char() {
        let spec = DataPatternSpec {
            kind: Some(PatternKind::SingleChar),
            bytes: vec![b'x'],
            ..Default::default()
        };
        let mut buffer = vec![0u8; 16];
        fill_buffer(&spec, &mut buffer, 0);
        assert!(buffer.iter().all(|&b| b == b'x'));
    }

    #[test]
    fn test_fill_random_is_deterministic_per_offset() {
        let spec = DataPatternSpec {
            kind: Some(PatternKind::Random),
            seed: 42,
            ..Default::default()
        };
        let mut a = vec![0u8; 64];
        let mut b = vec![0u8; 64];
        fill_buffer(&spec, &mut a, 512);
        fill_buffer(&spec, &mut b, 512);
        assert_eq!(a, b);

        let mut c = vec![0u8; 64];
        fill_buffer(&spec, &mut c, 1024);
        assert_ne!(a, c);
    }
}
