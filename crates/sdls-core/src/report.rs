//! Frame Security Report and CLCW state, and the OCF alternation.
//!
//! The engine keeps one live FSR that rejection paths update, and one
//! CLCW whose COP-1 fields the caller maintains. Outbound telemetry asks
//! for [`Reporting::next_ocf`] and gets the two words alternately.

use sdls_proto::{Clcw, FrameSecurityReport, OcfWord};

/// Live report state feeding the operational control field.
pub struct Reporting {
    /// Current frame security report
    pub fsr: FrameSecurityReport,
    /// Current link control word
    pub clcw: Clcw,
    next_is_report: bool,
}

impl Reporting {
    /// Fresh state: clean FSR, CLCW with COP-1 in effect, CLCW first.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fsr: FrameSecurityReport::default(),
            clcw: Clcw { cop_in_effect: 1, ..Clcw::default() },
            next_is_report: false,
        }
    }

    /// The OCF word for the next outbound frame, alternating CLCW and
    /// FSR.
    pub fn next_ocf(&mut self) -> OcfWord {
        let word = if self.next_is_report {
            OcfWord::Report(self.fsr)
        } else {
            OcfWord::Clcw(self.clcw)
        };
        self.next_is_report = !self.next_is_report;
        word
    }

    /// Note the SPI of the frame being processed.
    pub fn saw_spi(&mut self, spi: u16) {
        self.fsr.last_spi = spi;
    }

    /// Note the low byte of the extracted sequence counter.
    pub fn saw_sequence(&mut self, low_byte: u8) {
        self.fsr.sn_value = low_byte;
    }

    /// Flag an invalid SPI.
    pub fn flag_invalid_spi(&mut self) {
        self.fsr.alarm = true;
        self.fsr.invalid_spi = true;
    }

    /// Flag an anti-replay rejection.
    pub fn flag_bad_sequence(&mut self) {
        self.fsr.alarm = true;
        self.fsr.bad_sn = true;
    }

    /// Flag an authentication failure.
    pub fn flag_bad_mac(&mut self) {
        self.fsr.alarm = true;
        self.fsr.bad_mac = true;
    }

    /// Flag a non-integrity rejection (alarm only).
    pub fn flag_alarm(&mut self) {
        self.fsr.alarm = true;
    }

    /// Clear all FSR alarm bits (monitoring-and-control reset-alarm).
    pub fn reset_alarms(&mut self) {
        self.fsr.alarm = false;
        self.fsr.bad_sn = false;
        self.fsr.bad_mac = false;
        self.fsr.invalid_spi = false;
    }
}

impl Default for Reporting {
    fn default() -> Self {
        Self::new()
    }
}
