//! Bounds-checked sequential decoder for low-level DICOM data types

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use dicom_core::charset::{CharsetRole, CodingSystem};
use dicom_core::error::{DicomError, DicomResult};
use dicom_core::transfer_syntax::{Endianness, TransferSyntax};
use std::io::{self, BufRead, BufReader, Cursor, Read};

/// Saved parent state for one nested length-prefixed region.
struct LimitFrame {
    limit: u64,
    err: Option<DicomError>,
}

/// Sequential, bounds-checked reader of DICOM primitives
///
/// The decoder reads strictly forward from a buffered source. Every read is
/// checked against the current limit, the absolute bound on the consumable
/// position; the structural parser pushes a tighter limit when it enters a
/// nested length-prefixed region and pops it on exit.
///
/// A failing read records a sticky first-error and returns a zero or empty
/// placeholder instead of aborting, so a caller can parse best-effort through
/// malformed input and confirm correctness with one [`finish`] call at the
/// end. The sticky slot is saved and cleared on [`push_limit`] and restored on
/// [`pop_limit`], so an error inside one region never leaks into the parsing
/// of its siblings. A child region's own error is likewise NOT carried up by
/// [`pop_limit`]; a caller that wants propagation must inspect [`error`] and
/// re-raise before popping.
///
/// [`finish`]: Decoder::finish
/// [`push_limit`]: Decoder::push_limit
/// [`pop_limit`]: Decoder::pop_limit
/// [`error`]: Decoder::error
pub struct Decoder<R> {
    input: R,
    err: Option<DicomError>,
    ts: TransferSyntax,
    saved_syntaxes: Vec<TransferSyntax>,
    /// Absolute bound on the consumable position.
    limit: u64,
    /// Cumulative bytes consumed.
    pos: u64,
    limit_stack: Vec<LimitFrame>,
    coding_system: CodingSystem,
}

impl<'a> Decoder<Cursor<&'a [u8]>> {
    /// Create a decoder that reads from a byte slice.
    pub fn from_bytes(data: &'a [u8], ts: TransferSyntax) -> Self {
        Self::new(Cursor::new(data), ts)
    }

    /// Like [`Decoder::from_bytes`], but resolves a transfer syntax UID.
    ///
    /// Construction never fails: an unknown UID yields a decoder for the
    /// default syntax with the resolution error pre-set in the sticky slot.
    pub fn from_bytes_with_uid(data: &'a [u8], uid: &str) -> Self {
        match TransferSyntax::from_uid(uid) {
            Ok(ts) => Self::from_bytes(data, ts),
            Err(e) => {
                let mut dec = Self::from_bytes(data, TransferSyntax::default());
                dec.set_error(e);
                dec
            }
        }
    }
}

impl<R: Read> Decoder<BufReader<R>> {
    /// Create a decoder over an unbuffered reader.
    pub fn from_reader(input: R, ts: TransferSyntax) -> Self {
        Self::new(BufReader::new(input), ts)
    }
}

impl<R: BufRead> Decoder<R> {
    /// Create a decoder that reads from `input`.
    pub fn new(input: R, ts: TransferSyntax) -> Self {
        Self {
            input,
            err: None,
            ts,
            saved_syntaxes: Vec::new(),
            limit: u64::MAX,
            pos: 0,
            limit_stack: Vec::new(),
            coding_system: CodingSystem::default(),
        }
    }

    /// Override the per-role character set decoders used by string reads.
    pub fn set_coding_system(&mut self, cs: CodingSystem) {
        self.coding_system = cs;
    }

    /// The current transfer syntax.
    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.ts
    }

    /// Temporarily switch the transfer syntax; [`Decoder::pop_transfer_syntax`]
    /// restores the previous one.
    pub fn push_transfer_syntax(&mut self, ts: TransferSyntax) {
        log::trace!("decoder: push transfer syntax {:?} at offset {}", ts, self.pos);
        self.saved_syntaxes.push(self.ts);
        self.ts = ts;
    }

    /// Resolve a transfer syntax UID and push it in one step.
    ///
    /// An unknown UID sets the sticky error and pushes the default syntax, so
    /// the matching pop stays balanced.
    pub fn push_transfer_syntax_uid(&mut self, uid: &str) {
        let ts = match TransferSyntax::from_uid(uid) {
            Ok(ts) => ts,
            Err(e) => {
                self.set_error(e);
                TransferSyntax::default()
            }
        };
        self.push_transfer_syntax(ts);
    }

    /// Restore the transfer syntax saved by the most recent push.
    ///
    /// Panics if no push is outstanding.
    pub fn pop_transfer_syntax(&mut self) {
        self.ts = self
            .saved_syntaxes
            .pop()
            .expect("pop_transfer_syntax on empty stack");
    }

    /// Bound the next `bytes` bytes as a nested region.
    ///
    /// Saves the current limit together with the sticky error slot and clears
    /// the slot, giving the region a clean error epoch. A region that would
    /// extend past the active limit is clamped to zero readable bytes and a
    /// bounds error is recorded against the parent.
    pub fn push_limit(&mut self, bytes: u64) {
        let mut new_limit = self.pos.saturating_add(bytes);
        if new_limit > self.limit {
            self.set_error(DicomError::OutOfBounds {
                requested: bytes,
                available: self.remaining(),
                offset: self.pos,
            });
            new_limit = self.pos;
        }
        log::trace!("decoder: push limit {} at offset {}", bytes, self.pos);
        self.limit_stack.push(LimitFrame {
            limit: self.limit,
            err: self.err.take(),
        });
        self.limit = new_limit;
    }

    /// Leave the current nested region, restoring the parent limit and the
    /// parent's saved error slot.
    ///
    /// Any unconsumed remainder of the region is skipped first, so a malformed
    /// or partially-understood region does not corrupt the parsing of its
    /// siblings. The region's own sticky error is dropped here, never carried
    /// up; inspect [`Decoder::error`] before popping to propagate it.
    ///
    /// Panics if no [`Decoder::push_limit`] is outstanding.
    pub fn pop_limit(&mut self) {
        if self.pos < self.limit {
            let rest = self.limit - self.pos;
            log::warn!(
                "decoder: region not fully consumed, skipping {} bytes at offset {}",
                rest,
                self.pos
            );
            self.skip(rest);
        }
        let frame = self.limit_stack.pop().expect("pop_limit on empty stack");
        self.limit = frame.limit;
        self.err = frame.err;
    }

    /// Record `err` as the sticky error unless one is already set.
    pub fn set_error(&mut self, err: DicomError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// The first error recorded in the current epoch, if any.
    pub fn error(&self) -> Option<&DicomError> {
        self.err.as_ref()
    }

    /// Cumulative number of bytes consumed.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes still consumable under the current limit.
    pub fn remaining(&self) -> u64 {
        self.limit - self.pos
    }

    /// Whether any more data can be read.
    ///
    /// True once a sticky error is set, the current limit is exhausted, or a
    /// non-consuming lookahead shows the source has no further bytes.
    pub fn eof(&mut self) -> bool {
        if self.err.is_some() {
            return true;
        }
        if self.remaining() == 0 {
            return true;
        }
        match self.input.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(_) => true,
        }
    }

    /// Must be called once the top-level pass is done.
    ///
    /// Returns the sticky error if one was recorded, and a trailing-data error
    /// if consumable bytes remain at the outermost level. Nested-region
    /// under-consumption is handled leniently by [`Decoder::pop_limit`], not
    /// here.
    ///
    /// Panics on unbalanced limit or transfer syntax pushes.
    pub fn finish(mut self) -> DicomResult<()> {
        assert!(
            self.limit_stack.is_empty(),
            "finish with unbalanced limit stack"
        );
        assert!(
            self.saved_syntaxes.is_empty(),
            "finish with unbalanced transfer syntax stack"
        );
        if let Some(err) = self.err.take() {
            return Err(err);
        }
        if !self.eof() {
            return Err(DicomError::TrailingData { offset: self.pos });
        }
        Ok(())
    }

    /// Read an unsigned byte. On failure, returns 0 and records the error.
    pub fn read_u8(&mut self) -> u8 {
        let mut buf = [0u8; 1];
        if !self.read_fixed(&mut buf) {
            return 0;
        }
        buf[0]
    }

    /// Read a signed byte.
    pub fn read_i8(&mut self) -> i8 {
        self.read_u8() as i8
    }

    /// Read a u16 in the current byte order.
    pub fn read_u16(&mut self) -> u16 {
        let mut buf = [0u8; 2];
        if !self.read_fixed(&mut buf) {
            return 0;
        }
        match self.ts.endianness {
            Endianness::Little => LittleEndian::read_u16(&buf),
            Endianness::Big => BigEndian::read_u16(&buf),
        }
    }

    /// Read an i16 in the current byte order.
    pub fn read_i16(&mut self) -> i16 {
        self.read_u16() as i16
    }

    /// Read a u32 in the current byte order.
    pub fn read_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        if !self.read_fixed(&mut buf) {
            return 0;
        }
        match self.ts.endianness {
            Endianness::Little => LittleEndian::read_u32(&buf),
            Endianness::Big => BigEndian::read_u32(&buf),
        }
    }

    /// Read an i32 in the current byte order.
    pub fn read_i32(&mut self) -> i32 {
        self.read_u32() as i32
    }

    /// Read an IEEE 754 f32 in the current byte order.
    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_u32())
    }

    /// Read an IEEE 754 f64 in the current byte order.
    pub fn read_f64(&mut self) -> f64 {
        let mut buf = [0u8; 8];
        if !self.read_fixed(&mut buf) {
            return 0.0;
        }
        let bits = match self.ts.endianness {
            Endianness::Little => LittleEndian::read_u64(&buf),
            Endianness::Big => BigEndian::read_u64(&buf),
        };
        f64::from_bits(bits)
    }

    /// Read exactly `len` raw bytes. On failure, returns an empty vector and
    /// records the error; the position is unchanged on a bounds failure.
    pub fn read_bytes(&mut self, len: usize) -> Vec<u8> {
        if !self.check_remaining(len as u64) {
            return Vec::new();
        }
        let mut buf = vec![0u8; len];
        if !self.read_exact_unchecked(&mut buf) {
            return Vec::new();
        }
        buf
    }

    /// Read exactly `len` bytes as text in the default (ideographic) role.
    pub fn read_str(&mut self, len: usize) -> String {
        self.read_str_with_role(CharsetRole::Ideographic, len)
    }

    /// Read exactly `len` bytes as text in the given character set role.
    ///
    /// If a decoder is configured for the role, the raw bytes are transcoded
    /// through it (failure sets the sticky error and yields an empty string).
    /// Otherwise the bytes are assumed to be 7-bit text and passed through
    /// unchanged; bytes that are not representable as text set the sticky
    /// error rather than being silently rewritten.
    pub fn read_str_with_role(&mut self, role: CharsetRole, len: usize) -> String {
        let bytes = self.read_bytes(len);
        if bytes.is_empty() {
            return String::new();
        }
        match self.coding_system.decoder_for(role) {
            Some(decoder) => match decoder.decode(&bytes) {
                Ok(text) => text,
                Err(e) => {
                    self.set_error(e);
                    String::new()
                }
            },
            // UTF-8 is a superset of the assumed 7-bit repertoire.
            None => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    self.set_error(DicomError::CharsetDecode(e.to_string()));
                    String::new()
                }
            },
        }
    }

    /// Advance the position by `len` bytes without keeping the data.
    ///
    /// The skip is performed through the source's internal buffer in bounded
    /// steps, so a large skip never allocates a matching amount of memory.
    pub fn skip(&mut self, len: u64) {
        if !self.check_remaining(len) {
            return;
        }
        let mut remaining = len;
        while remaining > 0 {
            let step = match self.input.fill_buf() {
                Ok(buf) => buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.set_error(DicomError::Transport {
                        source: e,
                        offset: self.pos,
                    });
                    return;
                }
            };
            if step == 0 {
                self.set_error(unexpected_eof(self.pos));
                return;
            }
            self.input.consume(step);
            self.pos += step as u64;
            remaining -= step as u64;
        }
    }

    /// Bounds check: records an out-of-bounds error and returns false if fewer
    /// than `len` bytes remain under the current limit. Nothing is consumed on
    /// failure.
    fn check_remaining(&mut self, len: u64) -> bool {
        let available = self.remaining();
        if available < len {
            self.set_error(DicomError::OutOfBounds {
                requested: len,
                available,
                offset: self.pos,
            });
            return false;
        }
        true
    }

    /// Bounds check plus exact read into `buf`.
    fn read_fixed(&mut self, buf: &mut [u8]) -> bool {
        if !self.check_remaining(buf.len() as u64) {
            return false;
        }
        self.read_exact_unchecked(buf)
    }

    /// Fill `buf` from the source, assuming the bounds check already passed.
    /// A short or failing source read becomes a transport error.
    fn read_exact_unchecked(&mut self, buf: &mut [u8]) -> bool {
        let mut filled = 0;
        while filled < buf.len() {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.set_error(unexpected_eof(self.pos));
                    return false;
                }
                Ok(n) => {
                    filled += n;
                    self.pos += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.set_error(DicomError::Transport {
                        source: e,
                        offset: self.pos,
                    });
                    return false;
                }
            }
        }
        true
    }
}

fn unexpected_eof(offset: u64) -> DicomError {
    DicomError::Transport {
        source: io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of stream"),
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::charset::{TextDecoder, Utf8Decoder};
    use dicom_core::transfer_syntax::VrMode;

    fn little() -> TransferSyntax {
        TransferSyntax::new(Endianness::Little, VrMode::Explicit)
    }

    fn big() -> TransferSyntax {
        TransferSyntax::new(Endianness::Big, VrMode::Explicit)
    }

    #[test]
    fn test_read_u32_little_endian() {
        let data = [0x01, 0x00, 0x00, 0x00];
        let mut dec = Decoder::from_bytes(&data, little());
        assert_eq!(dec.read_u32(), 1);
        dec.finish().unwrap();
    }

    #[test]
    fn test_read_u32_big_endian() {
        let data = [0x01, 0x00, 0x00, 0x00];
        let mut dec = Decoder::from_bytes(&data, big());
        assert_eq!(dec.read_u32(), 16_777_216);
        dec.finish().unwrap();
    }

    #[test]
    fn test_bounds_failure_consumes_nothing() {
        let data = [0x01, 0x02, 0x03];
        let mut dec = Decoder::from_bytes(&data, little());
        dec.push_limit(3);
        assert_eq!(dec.read_bytes(5), Vec::<u8>::new());
        assert_eq!(dec.position(), 0);
        match dec.error() {
            Some(DicomError::OutOfBounds {
                requested: 5,
                available: 3,
                offset: 0,
            }) => {}
            other => panic!("unexpected error state: {other:?}"),
        }
    }

    #[test]
    fn test_push_limit_clamps_when_exceeding_parent() {
        let data = [0u8; 8];
        let mut dec = Decoder::from_bytes(&data, little());
        dec.push_limit(4);
        dec.push_limit(10); // larger than the 4 remaining, clamps to zero
        assert_eq!(dec.remaining(), 0);
        assert!(dec.eof());
        assert_eq!(dec.read_u8(), 0);
        dec.pop_limit();
        // The clamp error was charged to the parent epoch and is back now.
        assert!(matches!(dec.error(), Some(DicomError::OutOfBounds { .. })));
    }

    #[test]
    fn test_pop_limit_skips_unconsumed_remainder() {
        let data: Vec<u8> = (0..20).collect();
        let mut dec = Decoder::from_bytes(&data, little());
        dec.push_limit(20);
        let before = dec.remaining();
        dec.push_limit(10);
        assert_eq!(dec.read_bytes(3), vec![0, 1, 2]);
        dec.pop_limit();
        assert_eq!(dec.position(), 10);
        assert!(dec.error().is_none());
        assert_eq!(dec.remaining(), before - 10);
        assert_eq!(dec.read_u8(), 10);
        dec.pop_limit(); // drains the outer region
        dec.finish().unwrap();
    }

    #[test]
    fn test_child_error_does_not_cross_pop() {
        let data = [0u8; 4];
        let mut dec = Decoder::from_bytes(&data, little());
        dec.push_limit(2);
        let _ = dec.read_u32(); // only 2 bytes in the region
        assert!(dec.error().is_some());
        dec.pop_limit();
        assert!(dec.error().is_none());
        assert_eq!(dec.read_u16(), 0);
        assert!(dec.error().is_none());
    }

    #[test]
    fn test_parent_error_restored_after_pop() {
        let data = [0u8; 4];
        let mut dec = Decoder::from_bytes(&data, little());
        dec.set_error(DicomError::CharsetDecode("bad".into()));
        dec.push_limit(2);
        assert!(dec.error().is_none());
        dec.pop_limit();
        assert!(matches!(dec.error(), Some(DicomError::CharsetDecode(_))));
    }

    #[test]
    fn test_sticky_error_first_wins_and_reaches_finish() {
        let data = [0x01];
        let mut dec = Decoder::from_bytes(&data, little());
        // No limit pushed, so the source runs dry mid-read: a transport error.
        let _ = dec.read_u32();
        assert_eq!(dec.read_u8(), 0); // placeholder, original error kept
        let err = dec.finish().unwrap_err();
        assert!(matches!(err, DicomError::Transport { .. }));
    }

    #[test]
    fn test_finish_reports_trailing_data() {
        let data = [0x01, 0x02];
        let mut dec = Decoder::from_bytes(&data, little());
        assert_eq!(dec.read_u8(), 1);
        let err = dec.finish().unwrap_err();
        assert!(matches!(err, DicomError::TrailingData { offset: 1 }));
    }

    #[test]
    fn test_transfer_syntax_stack_nests() {
        let mut dec = Decoder::from_bytes(&[], little());
        dec.push_transfer_syntax(big());
        dec.push_transfer_syntax(TransferSyntax::new(Endianness::Little, VrMode::Implicit));
        dec.pop_transfer_syntax();
        assert_eq!(dec.transfer_syntax(), big());
        dec.pop_transfer_syntax();
        assert_eq!(dec.transfer_syntax(), little());
    }

    #[test]
    fn test_push_transfer_syntax_uid_unknown_stays_balanced() {
        let mut dec = Decoder::from_bytes(&[], little());
        dec.push_transfer_syntax_uid("0.0");
        assert!(matches!(
            dec.error(),
            Some(DicomError::UnknownTransferSyntax(_))
        ));
        dec.pop_transfer_syntax();
        assert_eq!(dec.transfer_syntax(), little());
    }

    #[test]
    fn test_skip_and_eof() {
        let data = [0u8; 6];
        let mut dec = Decoder::from_bytes(&data, little());
        dec.skip(4);
        assert_eq!(dec.position(), 4);
        assert!(!dec.eof());
        dec.skip(2);
        assert!(dec.eof());
        dec.finish().unwrap();
    }

    #[test]
    fn test_skip_past_end_is_bounds_error() {
        let data = [0u8; 3];
        let mut dec = Decoder::from_bytes(&data, little());
        dec.push_limit(3);
        dec.skip(5);
        assert_eq!(dec.position(), 0);
        assert!(matches!(dec.error(), Some(DicomError::OutOfBounds { .. })));
    }

    #[test]
    fn test_read_str_pass_through() {
        let mut dec = Decoder::from_bytes(b"ABC\\DEF", little());
        assert_eq!(dec.read_str(3), "ABC");
        dec.skip(1);
        assert_eq!(dec.read_str(3), "DEF");
        dec.finish().unwrap();
    }

    #[test]
    fn test_read_str_with_configured_role() {
        let mut dec = Decoder::from_bytes("山田^太郎".as_bytes(), little());
        dec.set_coding_system(CodingSystem {
            ideographic: Some(Box::new(Utf8Decoder)),
            ..Default::default()
        });
        let s = dec.read_str_with_role(CharsetRole::Ideographic, "山田^太郎".len());
        assert_eq!(s, "山田^太郎");
        dec.finish().unwrap();
    }

    #[test]
    fn test_read_str_unconfigured_role_rejects_unrepresentable_bytes() {
        let mut dec = Decoder::from_bytes(&[b'A', 0xFF, 0xFE, b'B'], little());
        assert_eq!(dec.read_str(4), "");
        assert!(matches!(dec.error(), Some(DicomError::CharsetDecode(_))));
        // Position still advanced by the full field length.
        assert_eq!(dec.position(), 4);
    }

    #[test]
    fn test_read_str_decode_failure_sets_sticky_error() {
        struct Failing;
        impl TextDecoder for Failing {
            fn decode(&self, _: &[u8]) -> dicom_core::DicomResult<String> {
                Err(DicomError::CharsetDecode("not shift-jis".into()))
            }
        }
        let mut dec = Decoder::from_bytes(&[0x82, 0xA0], little());
        dec.set_coding_system(CodingSystem {
            phonetic: Some(Box::new(Failing)),
            ..Default::default()
        });
        assert_eq!(dec.read_str_with_role(CharsetRole::Phonetic, 2), "");
        assert!(matches!(dec.error(), Some(DicomError::CharsetDecode(_))));
    }

    #[test]
    fn test_from_bytes_with_unknown_uid() {
        let dec = Decoder::from_bytes_with_uid(&[0x00], "1.2.3");
        assert!(matches!(
            dec.error(),
            Some(DicomError::UnknownTransferSyntax(_))
        ));
    }

    #[test]
    #[should_panic(expected = "pop_limit on empty stack")]
    fn test_pop_limit_underflow_panics() {
        let mut dec = Decoder::from_bytes(&[], little());
        dec.pop_limit();
    }

    #[test]
    #[should_panic(expected = "unbalanced limit stack")]
    fn test_finish_with_open_region_panics() {
        let mut dec = Decoder::from_bytes(&[0u8; 4], little());
        dec.push_limit(4);
        let _ = dec.finish();
    }
}
