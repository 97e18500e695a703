//! Monitoring-and-control procedures over the event log and the FSR.

use crate::{context::CryptoContext, log::EVENT_VALUE_LEN};

/// Self-test result byte: everything nominal.
const SELF_TEST_OK: u8 = 0x00;

impl CryptoContext {
    /// Ping: empty reply, proof of life.
    pub(crate) fn mc_ping(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Log status: `count(2) ‖ remaining(2)`. Reading resets the
    /// since-last-read count.
    pub(crate) fn mc_log_status(&mut self) -> Vec<u8> {
        let summary = self.log.summary_and_mark_read();
        let count = u16::try_from(summary.events_since_read).unwrap_or(u16::MAX);

        let mut reply = Vec::with_capacity(4);
        reply.extend_from_slice(&count.to_be_bytes());
        reply.extend_from_slice(&summary.remaining_slots.to_be_bytes());
        reply
    }

    /// Dump log: `{type(1) ‖ len(1) ‖ value(4)}` per entry, oldest
    /// first.
    pub(crate) fn mc_dump_log(&self) -> Vec<u8> {
        let entries = self.log.entries();
        let mut reply = Vec::with_capacity(entries.len() * (2 + EVENT_VALUE_LEN));
        for entry in entries {
            reply.push(entry.event.code());
            reply.push(entry.len);
            reply.extend_from_slice(&entry.value);
        }
        reply
    }

    /// Erase log: zero the buffer, reply with the fresh status.
    pub(crate) fn mc_erase_log(&mut self) -> Vec<u8> {
        self.log.erase();
        self.mc_log_status()
    }

    /// Self test: single OK byte.
    pub(crate) fn mc_self_test(&self) -> Vec<u8> {
        vec![SELF_TEST_OK]
    }

    /// Reset alarm: clear all FSR alarm bits.
    pub(crate) fn mc_reset_alarm(&mut self) {
        self.reporting.reset_alarms();
        tracing::debug!("fsr alarms cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, log::EventType};

    #[test]
    fn log_status_counts_and_resets() {
        let mut ctx = CryptoContext::new(Config::new());
        ctx.log.record(EventType::SpiInvalid, 9);

        // Startup + the rejection
        let reply = ctx.mc_log_status();
        assert_eq!(&reply[..2], &2u16.to_be_bytes());

        let reply = ctx.mc_log_status();
        assert_eq!(&reply[..2], &0u16.to_be_bytes());
    }

    #[test]
    fn dump_log_lays_out_entries() {
        let mut ctx = CryptoContext::new(Config::new());
        ctx.log.record(EventType::IvReplayError, 0x0009);

        let reply = ctx.mc_dump_log();
        // Startup entry followed by the replay entry
        assert_eq!(reply.len(), 12);
        assert_eq!(reply[6], EventType::IvReplayError.code());
        assert_eq!(reply[7], 4);
        assert_eq!(&reply[8..12], &[0, 0, 0, 9]);
    }

    #[test]
    fn erase_log_reports_empty_status() {
        let mut ctx = CryptoContext::new(Config::new());
        ctx.log.record(EventType::FecfError, 1);

        let reply = ctx.mc_erase_log();
        assert_eq!(&reply[..2], &0u16.to_be_bytes());
        assert!(ctx.event_log().entries().is_empty());
    }

    #[test]
    fn reset_alarm_clears_fsr_bits() {
        let mut ctx = CryptoContext::new(Config::new());
        ctx.reporting.flag_bad_mac();
        ctx.mc_reset_alarm();
        assert!(!ctx.reporting().fsr.alarm);
        assert!(!ctx.reporting().fsr.bad_mac);
    }
}
