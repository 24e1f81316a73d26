//! Low-level binary encoding/decoding for DICOM transfer syntaxes
//!
//! This crate provides the primitive codec layer consumed by a structural
//! element/dataset parser: sequential readers and writers of fixed-width
//! integers, IEEE floats, raw byte runs, and character-set-aware strings
//! under a negotiated transfer syntax, plus the nested-region bookkeeping
//! (read limits, transfer syntax overrides) needed to traverse length-
//! prefixed elements safely.
//!
//! It does not know about tags, VR dictionaries, or dataset structure; the
//! caller supplies region lengths and transfer-syntax switch points.

pub mod decoder;
pub mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;

pub use dicom_core::charset::{CharsetRole, CodingSystem, TextDecoder, Utf8Decoder};
pub use dicom_core::error::{DicomError, DicomResult};
pub use dicom_core::transfer_syntax::{
    DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN, EXPLICIT_VR_BIG_ENDIAN, EXPLICIT_VR_LITTLE_ENDIAN,
    Endianness, IMPLICIT_VR_LITTLE_ENDIAN, StandardRegistry, TransferSyntax,
    TransferSyntaxRegistry, VrMode,
};
