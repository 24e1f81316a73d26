//! Transfer syntax types for DICOM streams
//!
//! A transfer syntax is the (byte order, VR convention) pair negotiated for an
//! entire stream. This module provides the value types and the UID resolution
//! contract used by the encoder/decoder when entering a stream or a nested
//! region encoded under a different syntax.

use crate::error::{DicomError, DicomResult};

/// Byte order of multi-byte integers and floats on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Whether data elements carry their VR code inline
///
/// This layer only carries the mode for the benefit of the structural parser;
/// it never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrMode {
    /// VR is looked up in the external tag dictionary, not stored inline.
    Implicit,
    /// The 2-byte VR code is stored inline with each data element.
    Explicit,
    /// For passes that never encode or decode data elements.
    Unknown,
}

/// An immutable (byte order, VR mode) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSyntax {
    pub endianness: Endianness,
    pub vr_mode: VrMode,
}

/// Implicit VR Little Endian
pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
/// Explicit VR Little Endian
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
/// Deflated Explicit VR Little Endian
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
/// Explicit VR Big Endian (retired)
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

impl TransferSyntax {
    pub const fn new(endianness: Endianness, vr_mode: VrMode) -> Self {
        Self { endianness, vr_mode }
    }

    /// Resolve a transfer syntax UID through the standard registry.
    pub fn from_uid(uid: &str) -> DicomResult<Self> {
        StandardRegistry.resolve(uid)
    }
}

impl Default for TransferSyntax {
    /// Explicit VR Little Endian, the default for new streams.
    fn default() -> Self {
        Self::new(Endianness::Little, VrMode::Explicit)
    }
}

/// UID -> transfer syntax resolution contract
///
/// Implemented by [`StandardRegistry`] for the standard UIDs; callers with
/// private syntaxes supply their own implementation.
pub trait TransferSyntaxRegistry {
    fn resolve(&self, uid: &str) -> DicomResult<TransferSyntax>;
}

/// Registry of the standard DICOM transfer syntax UIDs
///
/// Encapsulated syntaxes (JPEG/JPEG 2000/RLE families) all use Explicit VR
/// Little Endian framing outside the pixel data, which is all this layer
/// cares about.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardRegistry;

impl TransferSyntaxRegistry for StandardRegistry {
    fn resolve(&self, uid: &str) -> DicomResult<TransferSyntax> {
        use Endianness::*;
        use VrMode::*;
        match uid {
            IMPLICIT_VR_LITTLE_ENDIAN => Ok(TransferSyntax::new(Little, Implicit)),
            EXPLICIT_VR_LITTLE_ENDIAN | DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => {
                Ok(TransferSyntax::new(Little, Explicit))
            }
            EXPLICIT_VR_BIG_ENDIAN => Ok(TransferSyntax::new(Big, Explicit)),
            // JPEG baseline through JPEG 2000, and RLE Lossless.
            u if u.starts_with("1.2.840.10008.1.2.4.") || u == "1.2.840.10008.1.2.5" => {
                Ok(TransferSyntax::new(Little, Explicit))
            }
            _ => Err(DicomError::UnknownTransferSyntax(uid.to_string())),
        }
    }
}
