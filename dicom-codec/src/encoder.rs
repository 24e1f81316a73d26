//! Sequential encoder for low-level DICOM data types

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use dicom_core::error::DicomError;
use dicom_core::transfer_syntax::{Endianness, TransferSyntax};
use std::io::Write;

/// Sequential writer of DICOM primitives into a sink
///
/// Multi-byte values are laid out per the current transfer syntax, which can
/// be temporarily switched with [`push_transfer_syntax`]/[`pop_transfer_syntax`]
/// when a nested region is encoded under a different syntax.
///
/// A sink failure sets a sticky first-error instead of aborting; later writes
/// still run against the sink and their own failures are swallowed once an
/// error is recorded, so one [`error`] check at the end covers a whole pass.
///
/// [`push_transfer_syntax`]: Encoder::push_transfer_syntax
/// [`pop_transfer_syntax`]: Encoder::pop_transfer_syntax
/// [`error`]: Encoder::error
pub struct Encoder<W: Write> {
    out: W,
    err: Option<DicomError>,
    ts: TransferSyntax,
    saved_syntaxes: Vec<TransferSyntax>,
}

impl Encoder<Vec<u8>> {
    /// Create an encoder that writes to an in-memory buffer.
    ///
    /// The contents are obtained via [`Encoder::bytes`].
    pub fn in_memory(ts: TransferSyntax) -> Self {
        Self::new(Vec::new(), ts)
    }

    /// Like [`Encoder::in_memory`], but resolves a transfer syntax UID.
    ///
    /// Construction never fails: an unknown UID yields an encoder for the
    /// default syntax with the resolution error pre-set in the sticky slot.
    pub fn in_memory_with_uid(uid: &str) -> Self {
        match TransferSyntax::from_uid(uid) {
            Ok(ts) => Self::in_memory(ts),
            Err(e) => {
                let mut enc = Self::in_memory(TransferSyntax::default());
                enc.set_error(e);
                enc
            }
        }
    }

    /// Consume the encoder and return the accumulated bytes.
    ///
    /// Panics if the transfer syntax stack is unbalanced or a sticky error is
    /// present; both indicate a caller bug, not bad input.
    pub fn bytes(self) -> Vec<u8> {
        assert!(
            self.saved_syntaxes.is_empty(),
            "Encoder::bytes with unbalanced transfer syntax stack"
        );
        if let Some(err) = &self.err {
            panic!("Encoder::bytes on errored encoder: {err}");
        }
        self.out
    }
}

impl<W: Write> Encoder<W> {
    /// Create an encoder that writes to `out`.
    pub fn new(out: W, ts: TransferSyntax) -> Self {
        Self {
            out,
            err: None,
            ts,
            saved_syntaxes: Vec::new(),
        }
    }

    /// Like [`Encoder::new`], but resolves a transfer syntax UID. Never fails;
    /// see [`Encoder::in_memory_with_uid`].
    pub fn with_uid(out: W, uid: &str) -> Self {
        match TransferSyntax::from_uid(uid) {
            Ok(ts) => Self::new(out, ts),
            Err(e) => {
                let mut enc = Self::new(out, TransferSyntax::default());
                enc.set_error(e);
                enc
            }
        }
    }

    /// The current transfer syntax.
    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.ts
    }

    /// Temporarily switch the transfer syntax; [`Encoder::pop_transfer_syntax`]
    /// restores the previous one.
    pub fn push_transfer_syntax(&mut self, ts: TransferSyntax) {
        log::trace!("encoder: push transfer syntax {:?}", ts);
        self.saved_syntaxes.push(self.ts);
        self.ts = ts;
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

    /// Record `err` as the sticky error unless one is already set.
    pub fn set_error(&mut self, err: DicomError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// The first error recorded so far, if any.
    pub fn error(&self) -> Option<&DicomError> {
        self.err.as_ref()
    }

    /// Write an unsigned byte.
    pub fn write_u8(&mut self, v: u8) {
        self.write_raw(&[v]);
    }

    /// Write a signed byte.
    pub fn write_i8(&mut self, v: i8) {
        self.write_raw(&[v as u8]);
    }

    /// Write a u16 in the current byte order.
    pub fn write_u16(&mut self, v: u16) {
        let mut buf = [0u8; 2];
        match self.ts.endianness {
            Endianness::Little => LittleEndian::write_u16(&mut buf, v),
            Endianness::Big => BigEndian::write_u16(&mut buf, v),
        }
        self.write_raw(&buf);
    }

    /// Write an i16 in the current byte order.
    pub fn write_i16(&mut self, v: i16) {
        self.write_u16(v as u16);
    }

    /// Write a u32 in the current byte order.
    pub fn write_u32(&mut self, v: u32) {
        let mut buf = [0u8; 4];
        match self.ts.endianness {
            Endianness::Little => LittleEndian::write_u32(&mut buf, v),
            Endianness::Big => BigEndian::write_u32(&mut buf, v),
        }
        self.write_raw(&buf);
    }

    /// Write an i32 in the current byte order.
    pub fn write_i32(&mut self, v: i32) {
        self.write_u32(v as u32);
    }

    /// Write an IEEE 754 f32 in the current byte order.
    pub fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    /// Write an IEEE 754 f64 in the current byte order.
    pub fn write_f64(&mut self, v: f64) {
        let mut buf = [0u8; 8];
        match self.ts.endianness {
            Endianness::Little => LittleEndian::write_u64(&mut buf, v.to_bits()),
            Endianness::Big => BigEndian::write_u64(&mut buf, v.to_bits()),
        }
        self.write_raw(&buf);
    }

    /// Copy `bytes` to the output verbatim.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_raw(bytes);
    }

    /// Write `len` zero bytes, in bounded-size chunks.
    pub fn write_zeros(&mut self, len: usize) {
        const CHUNK: usize = 1 << 12;
        let zeros = [0u8; CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let step = remaining.min(CHUNK);
            self.write_raw(&zeros[..step]);
            remaining -= step;
        }
    }

    /// Write the string bytes, without any length prefix or padding.
    ///
    /// Padding to even length is the structural parser's responsibility.
    pub fn write_str(&mut self, v: &str) {
        self.write_raw(v.as_bytes());
    }

    fn write_raw(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes) {
            self.set_error(DicomError::Io(e));
        }
    }
}
