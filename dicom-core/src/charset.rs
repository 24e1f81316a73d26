//! Pluggable character set decoding
//!
//! DICOM person-name fields may carry up to three representations of the same
//! text (alphabetic, ideographic, phonetic), each potentially in a different
//! character repertoire (PS3.5 6.1.2.1). The decoder asks a [`CodingSystem`]
//! for the decoder of a given role; when none is configured the raw bytes are
//! assumed to be 7-bit text and passed through unchanged.

use crate::error::{DicomError, DicomResult};

/// One byte-sequence -> text decoding capability
pub trait TextDecoder {
    fn decode(&self, bytes: &[u8]) -> DicomResult<String>;
}

/// Which of the three person-name representations a string field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetRole {
    /// Default role, also used for ideographic representations.
    Ideographic,
    Alphabetic,
    Phonetic,
}

/// Per-role character set decoders for one stream
///
/// All roles default to unset (7-bit pass-through).
#[derive(Default)]
pub struct CodingSystem {
    pub ideographic: Option<Box<dyn TextDecoder>>,
    pub alphabetic: Option<Box<dyn TextDecoder>>,
    pub phonetic: Option<Box<dyn TextDecoder>>,
}

impl CodingSystem {
    /// The decoder configured for `role`, if any.
    pub fn decoder_for(&self, role: CharsetRole) -> Option<&dyn TextDecoder> {
        match role {
            CharsetRole::Ideographic => self.ideographic.as_deref(),
            CharsetRole::Alphabetic => self.alphabetic.as_deref(),
            CharsetRole::Phonetic => self.phonetic.as_deref(),
        }
    }
}

/// Strict UTF-8 decoder
///
/// Useful for streams declaring ISO_IR 192; invalid sequences are reported as
/// input errors rather than replaced.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Decoder;

impl TextDecoder for Utf8Decoder {
    fn decode(&self, bytes: &[u8]) -> DicomResult<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DicomError::CharsetDecode(e.to_string()))
    }
}
