//! Wire-format codecs for SDLS-protected transfer frames.
//!
//! Pure byte-to-struct conversions with no policy: telecommand primary
//! and segment headers, the SA-governed security header, CRC tables and
//! the frame error control field, the space-packet envelope used by
//! extended procedures, the TLV procedure header, and the two
//! operational-control-field words.
//!
//! All multi-byte fields are big-endian network order. Packed bit fields
//! are handled with explicit shifts and masks; no struct layout tricks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod crc;
pub mod errors;
pub mod ocf;
pub mod space_packet;
pub mod tc;
pub mod tlv;

pub use errors::{FrameError, Result};
pub use ocf::{Clcw, FrameSecurityReport, OcfWord};
pub use space_packet::{PusHeader, SpacePacketHeader};
pub use tc::{Gvcid, SecurityHeader, SegmentHeader, TcPrimaryHeader};
pub use tlv::{
    KeyProcedure, MonitoringProcedure, PduHeader, PduType, Procedure, SaProcedure,
};
