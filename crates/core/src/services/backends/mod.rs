//! Instruction decoding backends.
//!
//! The pipeline only needs linear, best-effort decoding of a byte range into
//! [`InstructionRecord`]s with structured operands. Decoding stops at the first
//! byte sequence the backend cannot decode; there is no re-synchronisation.

use thiserror::Error;

use crate::model::InstructionRecord;

#[cfg(feature = "capstone-backend")]
pub mod capstone;

#[cfg(feature = "capstone-backend")]
pub use capstone::CapstoneDecoder;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Decoder initialisation failed: {0}")]
    Init(String),
}

/// Trait implemented by instruction decoders.
pub trait InstructionDecoder {
    /// Decode `bytes` as if loaded at `address`.
    fn decode(&self, bytes: &[u8], address: u64) -> Vec<InstructionRecord>;
    fn name(&self) -> &'static str;
}
