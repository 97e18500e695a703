//! Telecommand transfer-frame structures.
//!
//! The TC primary header is five bytes of packed bit fields (CCSDS
//! 232.0-B). Every field is extracted and inserted with explicit shifts
//! and masks; nothing here relies on compiler bitfield layout. Multi-byte
//! integers are big-endian on the wire.
//!
//! The security header has no fixed shape: the widths of its IV, sequence
//! number, and pad-length fields are dictated by the Security Association
//! in force on the channel, so [`SecurityHeader::parse`] takes the widths
//! as arguments.

use bytes::BufMut;

use crate::errors::{FrameError, Result};

/// Global Virtual Channel Identifier: (transfer frame version,
/// spacecraft id, virtual channel id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gvcid {
    /// Transfer frame version number (2 bits)
    pub tfvn: u8,
    /// Spacecraft identifier (10 bits)
    pub scid: u16,
    /// Virtual channel identifier (6 bits)
    pub vcid: u8,
}

/// TC transfer-frame primary header (5 bytes, packed big-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcPrimaryHeader {
    /// Transfer frame version number (2 bits)
    pub tfvn: u8,
    /// Bypass flag: type-B frames skip frame-acceptance checks
    pub bypass: bool,
    /// Control command flag: type-C frames carry FARM directives
    pub control_command: bool,
    /// Spacecraft identifier (10 bits)
    pub scid: u16,
    /// Virtual channel identifier (6 bits)
    pub vcid: u8,
    /// Frame length field: total frame octets minus one (10 bits)
    pub frame_len: u16,
    /// Frame sequence number
    pub frame_seq: u8,
}

impl TcPrimaryHeader {
    /// Encoded size of the primary header.
    pub const SIZE: usize = 5;

    /// Largest total frame size encodable in the 10-bit length field.
    pub const MAX_FRAME_SIZE: usize = 1024;

    /// Parse a primary header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// - [`FrameError::FrameTooShort`] if fewer than 5 bytes are supplied
    /// - [`FrameError::ReservedBitsSet`] if the two spare bits are not zero
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(FrameError::FrameTooShort { expected: Self::SIZE, actual: buf.len() });
        }
        if buf[0] & 0x0C != 0 {
            return Err(FrameError::ReservedBitsSet { value: buf[0] });
        }

        Ok(Self {
            tfvn: (buf[0] & 0xC0) >> 6,
            bypass: buf[0] & 0x20 != 0,
            control_command: buf[0] & 0x10 != 0,
            scid: u16::from(buf[0] & 0x03) << 8 | u16::from(buf[1]),
            vcid: (buf[2] & 0xFC) >> 2,
            frame_len: u16::from(buf[2] & 0x03) << 8 | u16::from(buf[3]),
            frame_seq: buf[4],
        })
    }

    /// Pack the header into its five-byte wire form.
    ///
    /// # Errors
    ///
    /// [`FrameError::FieldOverflow`] if a field exceeds its bit width.
    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE]> {
        if self.tfvn > 3 {
            return Err(FrameError::FieldOverflow {
                field: "tfvn",
                value: u32::from(self.tfvn),
                max: 3,
            });
        }
        if self.scid > 0x3FF {
            return Err(FrameError::FieldOverflow {
                field: "scid",
                value: u32::from(self.scid),
                max: 0x3FF,
            });
        }
        if self.vcid > 0x3F {
            return Err(FrameError::FieldOverflow {
                field: "vcid",
                value: u32::from(self.vcid),
                max: 0x3F,
            });
        }
        if self.frame_len > 0x3FF {
            return Err(FrameError::FieldOverflow {
                field: "frame_len",
                value: u32::from(self.frame_len),
                max: 0x3FF,
            });
        }

        Ok([
            self.tfvn << 6
                | u8::from(self.bypass) << 5
                | u8::from(self.control_command) << 4
                | ((self.scid & 0x300) >> 8) as u8,
            (self.scid & 0xFF) as u8,
            self.vcid << 2 | ((self.frame_len & 0x300) >> 8) as u8,
            (self.frame_len & 0xFF) as u8,
            self.frame_seq,
        ])
    }

    /// Append the packed header to `dst`.
    pub fn write(&self, dst: &mut impl BufMut) -> Result<()> {
        dst.put_slice(&self.to_bytes()?);
        Ok(())
    }

    /// Total frame length in octets (length field plus one).
    #[must_use]
    pub fn total_len(&self) -> usize {
        usize::from(self.frame_len) + 1
    }

    /// Global virtual channel identifier of this frame.
    #[must_use]
    pub fn gvcid(&self) -> Gvcid {
        Gvcid { tfvn: self.tfvn, scid: self.scid, vcid: self.vcid }
    }
}

/// TC segment header (1 byte): sequence flags and MAP identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Segmentation sequence flags (2 bits)
    pub sequence_flags: u8,
    /// Multiplexer access point identifier (6 bits)
    pub mapid: u8,
}

impl SegmentHeader {
    /// Encoded size of the segment header.
    pub const SIZE: usize = 1;

    /// Sequence flags for an unsegmented service data unit.
    pub const UNSEGMENTED: u8 = 0b11;

    /// Decode from the single header byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self { sequence_flags: (byte & 0xC0) >> 6, mapid: byte & 0x3F }
    }

    /// Pack into the single header byte.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        (self.sequence_flags & 0x03) << 6 | (self.mapid & 0x3F)
    }
}

/// Security header: SPI plus SA-governed variable-width fields.
///
/// Wire layout: `SPI(16) ‖ IV ‖ sequence number ‖ pad length`, each
/// trailing field present only when the SA declares a non-zero width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeader {
    /// Security parameter index selecting the SA
    pub spi: u16,
    /// Initialization vector bytes (may be empty)
    pub iv: Vec<u8>,
    /// Anti-replay sequence number bytes (may be empty)
    pub sn: Vec<u8>,
    /// Pad-length field bytes (may be empty; value is big-endian)
    pub pad_len: Vec<u8>,
}

impl SecurityHeader {
    /// Size of the fixed SPI prefix.
    pub const SPI_SIZE: usize = 2;

    /// Parse a security header whose field widths are known from the SA.
    ///
    /// # Errors
    ///
    /// [`FrameError::FrameTooShort`] if `buf` cannot hold the declared
    /// widths.
    pub fn parse(buf: &[u8], iv_len: usize, sn_len: usize, pad_len_len: usize) -> Result<Self> {
        let needed = Self::SPI_SIZE + iv_len + sn_len + pad_len_len;
        if buf.len() < needed {
            return Err(FrameError::FrameTooShort { expected: needed, actual: buf.len() });
        }

        let spi = u16::from(buf[0]) << 8 | u16::from(buf[1]);
        let iv_end = Self::SPI_SIZE + iv_len;
        let sn_end = iv_end + sn_len;
        let pad_end = sn_end + pad_len_len;

        Ok(Self {
            spi,
            iv: buf[Self::SPI_SIZE..iv_end].to_vec(),
            sn: buf[iv_end..sn_end].to_vec(),
            pad_len: buf[sn_end..pad_end].to_vec(),
        })
    }

    /// Encoded size of this header.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::SPI_SIZE + self.iv.len() + self.sn.len() + self.pad_len.len()
    }

    /// Append the packed header to `dst`.
    pub fn write(&self, dst: &mut impl BufMut) {
        dst.put_u16(self.spi);
        dst.put_slice(&self.iv);
        dst.put_slice(&self.sn);
        dst.put_slice(&self.pad_len);
    }

    /// Pad length as an integer (zero when the field is absent).
    #[must_use]
    pub fn pad_len_value(&self) -> u16 {
        self.pad_len.iter().fold(0u16, |acc, b| acc << 8 | u16::from(*b))
    }
}
