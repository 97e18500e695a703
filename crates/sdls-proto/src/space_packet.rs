//! CCSDS space-packet and PUS secondary headers.
//!
//! Extended-procedure commands ride inside processed TC payloads as space
//! packets: a 6-byte CCSDS primary header, an optional 4-byte PUS
//! secondary header, then the TLV procedure data unit.

use bytes::BufMut;

use crate::errors::{FrameError, Result};

/// CCSDS space-packet primary header (6 bytes, packed big-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpacePacketHeader {
    /// Packet version number (3 bits)
    pub version: u8,
    /// Packet type: false = telemetry, true = telecommand (1 bit)
    pub packet_type: bool,
    /// Secondary header flag (1 bit)
    pub sec_hdr_flag: bool,
    /// Application process identifier (11 bits)
    pub apid: u16,
    /// Sequence flags (2 bits)
    pub seq_flags: u8,
    /// Packet sequence count or name (14 bits)
    pub seq_count: u16,
    /// Packet data length field: data octets minus one
    pub data_len: u16,
}

impl SpacePacketHeader {
    /// Encoded size of the primary header.
    pub const SIZE: usize = 6;

    /// Parse a space-packet header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// [`FrameError::FrameTooShort`] if fewer than 6 bytes are supplied.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(FrameError::FrameTooShort { expected: Self::SIZE, actual: buf.len() });
        }

        Ok(Self {
            version: (buf[0] & 0xE0) >> 5,
            packet_type: buf[0] & 0x10 != 0,
            sec_hdr_flag: buf[0] & 0x08 != 0,
            apid: u16::from(buf[0] & 0x07) << 8 | u16::from(buf[1]),
            seq_flags: (buf[2] & 0xC0) >> 6,
            seq_count: u16::from(buf[2] & 0x3F) << 8 | u16::from(buf[3]),
            data_len: u16::from(buf[4]) << 8 | u16::from(buf[5]),
        })
    }

    /// Pack the header into its six-byte wire form.
    ///
    /// # Errors
    ///
    /// [`FrameError::FieldOverflow`] if a field exceeds its bit width.
    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE]> {
        if self.version > 7 {
            return Err(FrameError::FieldOverflow {
                field: "version",
                value: u32::from(self.version),
                max: 7,
            });
        }
        if self.apid > 0x7FF {
            return Err(FrameError::FieldOverflow {
                field: "apid",
                value: u32::from(self.apid),
                max: 0x7FF,
            });
        }
        if self.seq_count > 0x3FFF {
            return Err(FrameError::FieldOverflow {
                field: "seq_count",
                value: u32::from(self.seq_count),
                max: 0x3FFF,
            });
        }

        Ok([
            self.version << 5
                | u8::from(self.packet_type) << 4
                | u8::from(self.sec_hdr_flag) << 3
                | ((self.apid & 0x700) >> 8) as u8,
            (self.apid & 0xFF) as u8,
            (self.seq_flags & 0x03) << 6 | ((self.seq_count & 0x3F00) >> 8) as u8,
            (self.seq_count & 0xFF) as u8,
            ((self.data_len & 0xFF00) >> 8) as u8,
            (self.data_len & 0xFF) as u8,
        ])
    }

    /// Append the packed header to `dst`.
    pub fn write(&self, dst: &mut impl BufMut) -> Result<()> {
        dst.put_slice(&self.to_bytes()?);
        Ok(())
    }
}

/// PUS secondary header (4 bytes) as carried by extended procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PusHeader {
    /// Secondary header flag (1 bit)
    pub sec_hdr_flag: bool,
    /// PUS version (3 bits)
    pub version: u8,
    /// Acknowledgement flags (4 bits)
    pub ack: u8,
    /// Service type
    pub service_type: u8,
    /// Service subtype
    pub service_subtype: u8,
    /// Source identifier (4 bits)
    pub source_id: u8,
    /// Spare (4 bits)
    pub spare: u8,
}

impl PusHeader {
    /// Encoded size of the PUS header.
    pub const SIZE: usize = 4;

    /// Parse a PUS header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// [`FrameError::FrameTooShort`] if fewer than 4 bytes are supplied.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(FrameError::FrameTooShort { expected: Self::SIZE, actual: buf.len() });
        }

        Ok(Self {
            sec_hdr_flag: buf[0] & 0x80 != 0,
            version: (buf[0] & 0x70) >> 4,
            ack: buf[0] & 0x0F,
            service_type: buf[1],
            service_subtype: buf[2],
            source_id: (buf[3] & 0xF0) >> 4,
            spare: buf[3] & 0x0F,
        })
    }

    /// Pack the header into its four-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            u8::from(self.sec_hdr_flag) << 7 | (self.version & 0x07) << 4 | (self.ack & 0x0F),
            self.service_type,
            self.service_subtype,
            (self.source_id & 0x0F) << 4 | (self.spare & 0x0F),
        ]
    }
}
