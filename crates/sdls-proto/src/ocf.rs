//! Operational Control Field words: CLCW and Frame Security Report.
//!
//! The OCF is a four-byte trailer slot in telemetry frames. Outbound
//! frames alternate between the COP-1 link-control word and the frame
//! security report, distinguished by the control-word-type bit.

/// Communications Link Control Word (COP-1 status, control word type 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clcw {
    /// CLCW version number (2 bits)
    pub version: u8,
    /// Status field (3 bits)
    pub status_field: u8,
    /// COP-in-effect (2 bits; 1 = COP-1)
    pub cop_in_effect: u8,
    /// Virtual channel the report concerns (6 bits)
    pub vcid: u8,
    /// No-RF-available flag
    pub no_rf_available: bool,
    /// No-bit-lock flag
    pub no_bit_lock: bool,
    /// Lockout flag
    pub lockout: bool,
    /// Wait flag
    pub wait: bool,
    /// Retransmit flag
    pub retransmit: bool,
    /// FARM-B counter (2 bits)
    pub farm_b_counter: u8,
    /// Report value: next expected frame sequence number
    pub report_value: u8,
}

impl Clcw {
    /// Encoded size of an OCF word.
    pub const SIZE: usize = 4;

    /// Pack into the four OCF bytes (control word type 0).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            (self.version & 0x03) << 5
                | (self.status_field & 0x07) << 2
                | (self.cop_in_effect & 0x03),
            (self.vcid & 0x3F) << 2,
            u8::from(self.no_rf_available) << 7
                | u8::from(self.no_bit_lock) << 6
                | u8::from(self.lockout) << 5
                | u8::from(self.wait) << 4
                | u8::from(self.retransmit) << 3
                | (self.farm_b_counter & 0x03) << 1,
            self.report_value,
        ]
    }
}

/// Frame Security Report (control word type 1, FSR version 0b100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSecurityReport {
    /// Alarm flag: a security rejection has occurred
    pub alarm: bool,
    /// Bad sequence-number flag (anti-replay rejection)
    pub bad_sn: bool,
    /// Bad MAC flag (integrity rejection)
    pub bad_mac: bool,
    /// Invalid SPI flag
    pub invalid_spi: bool,
    /// SPI of the most recently processed frame
    pub last_spi: u16,
    /// Low byte of the most recently extracted sequence number
    pub sn_value: u8,
}

impl FrameSecurityReport {
    /// Encoded size of an OCF word.
    pub const SIZE: usize = 4;

    /// FSR version number carried in bits 4..7 of the first byte.
    pub const VERSION: u8 = 0b100;

    /// Pack into the four OCF bytes (control word type 1).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            1 << 7
                | (Self::VERSION & 0x07) << 4
                | u8::from(self.alarm) << 3
                | u8::from(self.bad_sn) << 2
                | u8::from(self.bad_mac) << 1
                | u8::from(self.invalid_spi),
            ((self.last_spi & 0xFF00) >> 8) as u8,
            (self.last_spi & 0xFF) as u8,
            self.sn_value,
        ]
    }
}

/// One OCF word, ready for insertion into an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcfWord {
    /// COP-1 link control word
    Clcw(Clcw),
    /// Frame security report
    Report(FrameSecurityReport),
}

impl OcfWord {
    /// Pack whichever word this is into the four OCF bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 4] {
        match self {
            Self::Clcw(clcw) => clcw.to_bytes(),
            Self::Report(report) => report.to_bytes(),
        }
    }
}
