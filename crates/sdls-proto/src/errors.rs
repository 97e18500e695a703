//! Error types for frame and PDU codecs.
//!
//! Codec errors are structural only: they describe byte-level problems
//! (truncation, reserved bits, field overflow). Policy decisions such as
//! "is this SPI known" belong to the protocol engine, not the codec.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = core::result::Result<T, FrameError>;

/// Errors from parsing or encoding wire structures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer is too short for the structure being parsed
    #[error("frame too short: need {expected} bytes, have {actual}")]
    FrameTooShort {
        /// Bytes required by the structure
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Declared frame length exceeds the supplied buffer
    #[error("declared length {declared} exceeds buffer of {available} bytes")]
    LengthOverflow {
        /// Length claimed by the primary header (total octets)
        declared: usize,
        /// Octets actually supplied
        available: usize,
    },

    /// Reserved (spare) bits were not zero
    #[error("reserved bits set in header byte: {value:#04x}")]
    ReservedBitsSet {
        /// The offending byte with non-zero spare bits
        value: u8,
    },

    /// A field value does not fit its on-wire bit width
    #[error("{field} value {value} exceeds maximum {max}")]
    FieldOverflow {
        /// Name of the offending field
        field: &'static str,
        /// Value that was supplied
        value: u32,
        /// Largest encodable value
        max: u32,
    },

    /// Tag byte does not name a known extended procedure
    #[error("unknown procedure: service group {service_group:#04b}, pid {pid:#03x}")]
    UnknownProcedure {
        /// Two-bit service group from the tag byte
        service_group: u8,
        /// Four-bit procedure identifier from the tag byte
        pid: u8,
    },
}
