//! Post-IO data verification
//!
//! After a read (or a destination-side receive), the worker hands the buffer
//! to the verification engine, which checks the embedded location header
//! and/or the buffer contents against the target's configured data pattern
//! and returns the number of miscompares. Mismatches are counted and logged
//! to the error sink; they are never fatal here, the caller decides
//! pass/fail policy.
//!
//! Two deliberate asymmetries carried over from the original protocol:
//! location verification takes strict priority over content verification
//! when both are requested, and only the sequenced checker caps its
//! per-mismatch logging (hex and single-char log every mismatch).
//!
//! A return of 0 can mean "verified clean" or "verification was a no-op"
//! (no mode requested, unknown pattern kind, or the unimplemented checksum
//! kind). Callers that need the distinction must check the configuration,
//! not the count.

use crate::config::TargetOptions;
use crate::pattern::{DataPatternSpec, PatternKind};
use std::io::Write;

/// Write the 8-byte location header into a buffer at write time
///
/// The location check on the read side expects the buffer's absolute byte
/// offset in the first 8 bytes, little-endian.
pub fn stamp_location(buffer: &mut [u8], byte_offset: u64) {
    if buffer.len() >= 8 {
        buffer[..8].copy_from_slice(&byte_offset.to_le_bytes());
    }
}

/// One buffer to verify, as seen by the worker that read it
#[derive(Debug)]
pub struct VerifyRequest<'a> {
    pub worker_index: usize,
    pub buffer: &'a [u8],
    /// Absolute byte offset this buffer was read from
    pub byte_offset: u64,
}

/// Verification engine for one target
#[derive(Debug, Clone)]
pub struct Verifier<'a> {
    target_id: u32,
    options: TargetOptions,
    pattern: &'a DataPatternSpec,
    block_size: u64,
    max_errors_to_print: u64,
}

impl<'a> Verifier<'a> {
    pub fn new(
        target_id: u32,
        options: TargetOptions,
        pattern: &'a DataPatternSpec,
        block_size: u64,
        max_errors_to_print: u64,
    ) -> Self {
        Self {
            target_id,
            options,
            pattern,
            // Mismatch logs divide by the block size; a zero from an
            // unvalidated config must not panic the checker
            block_size: block_size.max(1),
            max_errors_to_print,
        }
    }

    /// Verify location and/or contents of a read buffer
    ///
    /// Returns the number of miscompare errors. When the location check is
    /// requested it is the only check performed, even if content
    /// verification is also configured.
    pub fn verify(&self, sink: &mut dyn Write, request: &VerifyRequest, op_number: i64) -> u64 {
        if !self.options.verify_location && !self.options.verify_contents {
            let _ = writeln!(
                sink,
                "verify: target {} worker {}: verification type (location or contents) not specified, no verification performed",
                self.target_id, request.worker_index
            );
            return 0;
        }
        if self.options.verify_location {
            self.verify_location(sink, request, op_number)
        } else {
            self.verify_contents(sink, request, op_number)
        }
    }

    /// Compare the buffer's embedded location header against the expected
    /// byte offset. Emits exactly 0 or 1 error.
    pub fn verify_location(
        &self,
        sink: &mut dyn Write,
        request: &VerifyRequest,
        op_number: i64,
    ) -> u64 {
        if request.buffer.len() < 8 {
            return 0;
        }
        let embedded = u64::from_le_bytes(request.buffer[..8].try_into().unwrap());
        if embedded == request.byte_offset {
            return 0;
        }
        let _ = writeln!(
            sink,
            "verify_location: target {} worker {}: op {}: location mismatch, expected {}, got {}",
            self.target_id, request.worker_index, op_number, request.byte_offset, embedded
        );
        1
    }

    /// Compare the buffer contents against the configured data pattern
    pub fn verify_contents(
        &self,
        sink: &mut dyn Write,
        request: &VerifyRequest,
        op_number: i64,
    ) -> u64 {
        match self.pattern.kind {
            Some(PatternKind::Sequenced) => self.verify_sequence(sink, request, op_number),
            Some(PatternKind::Hex) => self.verify_hex(sink, request, op_number),
            Some(PatternKind::SingleChar) => self.verify_single_char(sink, request, op_number),
            Some(PatternKind::Checksum) => {
                let _ = writeln!(
                    sink,
                    "verify_checksum: target {} worker {}: checksum verification not implemented",
                    self.target_id, request.worker_index
                );
                0
            }
            Some(PatternKind::Random) | None => {
                let _ = writeln!(
                    sink,
                    "verify_contents: target {} worker {}: verification request not understood, no verification possible",
                    self.target_id, request.worker_index
                );
                0
            }
        }
    }

    /// Check a sequenced pattern: each 8-byte integer must equal its own
    /// absolute byte offset, with the configured prefix/inverse applied.
    ///
    /// Detailed mismatch lines stop after `max_errors_to_print`; counting
    /// continues and a single summary line reports the suppressed total.
    pub fn verify_sequence(
        &self,
        sink: &mut dyn Write,
        request: &VerifyRequest,
        op_number: i64,
    ) -> u64 {
        let mut errors: u64 = 0;
        for (i, chunk) in request.buffer.chunks_exact(8).enumerate() {
            let offset_in_buffer = (i as u64) * 8;
            let expected = self
                .pattern
                .sequenced_value(request.byte_offset + offset_in_buffer);
            let actual = u64::from_le_bytes(chunk.try_into().unwrap());
            if actual != expected {
                if errors < self.max_errors_to_print {
                    let _ = writeln!(
                        sink,
                        "verify_sequence: target {} worker {}: sequence mismatch on op {} at {} bytes into block {}, expected 0x{:016x}, got 0x{:016x}",
                        self.target_id,
                        request.worker_index,
                        op_number,
                        offset_in_buffer,
                        request.byte_offset / self.block_size,
                        expected,
                        actual
                    );
                }
                errors += 1;
            }
        }
        if errors > self.max_errors_to_print {
            let _ = writeln!(
                sink,
                "verify_sequence: target {} worker {}: {} additional sequence mismatches suppressed",
                self.target_id,
                request.worker_index,
                errors - self.max_errors_to_print
            );
        }
        errors
    }

    /// Check a hex pattern: cyclically across the whole buffer when
    /// replicate is set, otherwise only the first pattern-length bytes.
    /// Every mismatch is logged; there is no suppression cap.
    pub fn verify_hex(&self, sink: &mut dyn Write, request: &VerifyRequest, op_number: i64) -> u64 {
        if self.pattern.bytes.is_empty() {
            return 0;
        }
        let span = if self.pattern.replicate {
            request.buffer.len()
        } else {
            self.pattern.bytes.len().min(request.buffer.len())
        };
        let mut errors: u64 = 0;
        for (offset, &actual) in request.buffer[..span].iter().enumerate() {
            let expected = self.pattern.bytes[offset % self.pattern.bytes.len()];
            if actual != expected {
                self.log_byte_mismatch(
                    sink,
                    "verify_hex",
                    request,
                    op_number,
                    offset,
                    expected,
                    actual,
                );
                errors += 1;
            }
        }
        errors
    }

    /// Check that every byte of the buffer equals the configured byte.
    /// Every mismatch is logged; there is no suppression cap.
    pub fn verify_single_char(
        &self,
        sink: &mut dyn Write,
        request: &VerifyRequest,
        op_number: i64,
    ) -> u64 {
        let Some(&expected) = self.pattern.bytes.first() else {
            return 0;
        };
        let mut errors: u64 = 0;
        for (offset, &actual) in request.buffer.iter().enumerate() {
            if actual != expected {
                self.log_byte_mismatch(
                    sink,
                    "verify_single_char",
                    request,
                    op_number,
                    offset,
                    expected,
                    actual,
                );
                errors += 1;
            }
        }
        errors
    }

    #[allow(clippy::too_many_arguments)]
    fn log_byte_mismatch(
        &self,
        sink: &mut dyn Write,
        checker: &str,
        request: &VerifyRequest,
        op_number: i64,
        offset: usize,
        expected: u8,
        actual: u8,
    ) {
        let _ = writeln!(
            sink,
            "{}: target {} worker {}: content mismatch on op {} at {} bytes into block {}, expected 0x{:02x}, got 0x{:02x}",
            checker,
            self.target_id,
            request.worker_index,
            op_number,
            offset,
            request.byte_offset / self.block_size,
            expected,
            actual
        );
    }
}
