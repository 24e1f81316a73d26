//! Core types for the DICOM binary codec layer
//!
//! This crate provides the transfer syntax value types, the error type, and
//! the pluggable character set contract shared by the encoder and decoder.

pub mod charset;
pub mod error;
pub mod transfer_syntax;

pub use charset::{CharsetRole, CodingSystem, TextDecoder, Utf8Decoder};
pub use error::{DicomError, DicomResult};
pub use transfer_syntax::{
    Endianness, StandardRegistry, TransferSyntax, TransferSyntaxRegistry, VrMode,
};
