//! Extended-procedure dispatcher.
//!
//! When a processed TC payload is addressed to the security unit (APID
//! 0x080), it is a space packet carrying one TLV procedure data unit.
//! The dispatcher parses the envelope, matches the procedure sum type
//! exhaustively, runs the handler, and wraps any reply payload back into
//! the same envelope with the reply bit set.

pub(crate) mod key_mgmt;
pub(crate) mod monitor;
pub(crate) mod sa_mgmt;
pub(crate) mod user;

use bytes::{BufMut, Bytes, BytesMut};
use sdls_proto::{
    KeyProcedure, MonitoringProcedure, PduHeader, PduType, Procedure, PusHeader, SaProcedure,
    SpacePacketHeader,
};

use crate::{context::CryptoContext, error::ProcessingError, key_ring::KeyState};

/// APID of the security unit: procedure commands arrive on it and
/// replies are sourced from it.
pub const PROCEDURE_APID: u16 = 0x080;

/// APID used for user-procedure (idle trigger) replies.
pub const USER_REPLY_APID: u16 = 0x090;

/// Big-endian u16 from two bytes.
pub(crate) fn be16(hi: u8, lo: u8) -> u16 {
    u16::from(hi) << 8 | u16::from(lo)
}

impl CryptoContext {
    /// Route one extended-procedure packet to its handler.
    ///
    /// `carrier_iv` is the IV of the frame that delivered the packet;
    /// key verification derives its challenge nonces from it. Returns
    /// the reply packet for procedures that produce one.
    pub(crate) fn dispatch_procedures(
        &mut self,
        packet: &[u8],
        carrier_iv: &[u8],
    ) -> Result<Option<Bytes>, ProcessingError> {
        let _envelope = SpacePacketHeader::parse(packet)?;
        let mut offset = SpacePacketHeader::SIZE;
        if self.config.has_pus_header {
            PusHeader::parse(&packet[offset..])?;
            offset += PusHeader::SIZE;
        }

        let header = PduHeader::parse(packet.get(offset..).unwrap_or(&[]))?;
        offset += PduHeader::SIZE;
        let end = offset + usize::from(header.pdu_len);
        let data = packet
            .get(offset..end)
            .ok_or(ProcessingError::PduMalformed { reason: "pdu length exceeds packet" })?;

        if header.pdu_type == PduType::Reply {
            return Err(ProcessingError::PduMalformed { reason: "reply pdu on command path" });
        }

        tracing::debug!(procedure = ?header.procedure, len = data.len(), "extended procedure");

        match header.procedure {
            Procedure::Key(KeyProcedure::Otar) => self.key_otar(data).map(|()| None),
            Procedure::Key(KeyProcedure::Activation) => {
                self.key_update(data, KeyState::Active).map(|()| None)
            },
            Procedure::Key(KeyProcedure::Deactivation) => {
                self.key_update(data, KeyState::Deactivated).map(|()| None)
            },
            Procedure::Key(KeyProcedure::Destruction) => {
                self.key_update(data, KeyState::Destroyed).map(|()| None)
            },
            Procedure::Key(KeyProcedure::Verification) => {
                let payload = self.key_verify(data, carrier_iv)?;
                self.build_reply(header.procedure, PROCEDURE_APID, &payload).map(Some)
            },
            Procedure::Key(KeyProcedure::Inventory) => {
                let payload = self.key_inventory(data)?;
                self.build_reply(header.procedure, PROCEDURE_APID, &payload).map(Some)
            },
            Procedure::Sa(SaProcedure::Create) => self.sa_create(data).map(|()| None),
            Procedure::Sa(SaProcedure::Delete) => self.sa_delete(data).map(|()| None),
            Procedure::Sa(SaProcedure::Rekey) => self.sa_rekey(data).map(|()| None),
            Procedure::Sa(SaProcedure::Expire) => self.sa_expire(data).map(|()| None),
            Procedure::Sa(SaProcedure::Start) => self.sa_start(data).map(|()| None),
            Procedure::Sa(SaProcedure::Stop) => self.sa_stop(data).map(|()| None),
            Procedure::Sa(SaProcedure::SetArsn) => self.sa_set_arsn(data).map(|()| None),
            Procedure::Sa(SaProcedure::SetArsnw) => self.sa_set_arsnw(data).map(|()| None),
            Procedure::Sa(SaProcedure::ReadArsn) => {
                let payload = self.sa_read_arsn(data)?;
                self.build_reply(header.procedure, PROCEDURE_APID, &payload).map(Some)
            },
            Procedure::Sa(SaProcedure::Status) => {
                let payload = self.sa_status(data)?;
                self.build_reply(header.procedure, PROCEDURE_APID, &payload).map(Some)
            },
            Procedure::Monitoring(MonitoringProcedure::Ping) => {
                self.build_reply(header.procedure, PROCEDURE_APID, &self.mc_ping()).map(Some)
            },
            Procedure::Monitoring(MonitoringProcedure::LogStatus) => {
                let payload = self.mc_log_status();
                self.build_reply(header.procedure, PROCEDURE_APID, &payload).map(Some)
            },
            Procedure::Monitoring(MonitoringProcedure::DumpLog) => {
                let payload = self.mc_dump_log();
                self.build_reply(header.procedure, PROCEDURE_APID, &payload).map(Some)
            },
            Procedure::Monitoring(MonitoringProcedure::EraseLog) => {
                let payload = self.mc_erase_log();
                self.build_reply(header.procedure, PROCEDURE_APID, &payload).map(Some)
            },
            Procedure::Monitoring(MonitoringProcedure::SelfTest) => {
                let payload = self.mc_self_test();
                self.build_reply(header.procedure, PROCEDURE_APID, &payload).map(Some)
            },
            Procedure::Monitoring(MonitoringProcedure::ResetAlarm) => {
                self.mc_reset_alarm();
                Ok(None)
            },
            Procedure::User(pid) => {
                if !self.config.enable_fault_injection {
                    return Err(ProcessingError::PduMalformed {
                        reason: "user procedures disabled",
                    });
                }
                self.user_procedure(pid, data)
            },
        }
    }

    /// Wrap a reply payload into the procedure envelope.
    pub(crate) fn build_reply(
        &self,
        procedure: Procedure,
        apid: u16,
        payload: &[u8],
    ) -> Result<Bytes, ProcessingError> {
        let pus_len = if self.config.has_pus_header { PusHeader::SIZE } else { 0 };
        let data_octets = pus_len + PduHeader::SIZE + payload.len();

        let envelope = SpacePacketHeader {
            version: 0,
            packet_type: false,
            sec_hdr_flag: true,
            apid,
            seq_flags: 0b11,
            seq_count: 0,
            data_len: data_octets.saturating_sub(1) as u16,
        };

        let mut out = BytesMut::with_capacity(SpacePacketHeader::SIZE + data_octets);
        envelope.write(&mut out)?;
        if self.config.has_pus_header {
            out.put_slice(&PusHeader::default().to_bytes());
        }
        PduHeader {
            pdu_type: PduType::Reply,
            procedure,
            pdu_len: payload.len() as u16,
        }
        .write(&mut out);
        out.put_slice(payload);

        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn reply_envelope_round_trips() {
        let ctx = CryptoContext::new(Config::new());
        let reply = ctx
            .build_reply(
                Procedure::Monitoring(MonitoringProcedure::Ping),
                PROCEDURE_APID,
                &[0xAA, 0xBB],
            )
            .unwrap();

        let envelope = SpacePacketHeader::parse(&reply).unwrap();
        assert_eq!(envelope.apid, PROCEDURE_APID);
        assert!(envelope.sec_hdr_flag);

        let offset = SpacePacketHeader::SIZE + PusHeader::SIZE;
        let header = PduHeader::parse(&reply[offset..]).unwrap();
        assert_eq!(header.pdu_type, PduType::Reply);
        assert_eq!(header.procedure, Procedure::Monitoring(MonitoringProcedure::Ping));
        assert_eq!(header.pdu_len, 2);
        assert_eq!(&reply[offset + PduHeader::SIZE..], &[0xAA, 0xBB]);
    }

    #[test]
    fn reply_pdus_are_not_dispatched() {
        let mut ctx = CryptoContext::new(Config::new());
        let reply = ctx
            .build_reply(
                Procedure::Monitoring(MonitoringProcedure::Ping),
                PROCEDURE_APID,
                &[],
            )
            .unwrap();

        let result = ctx.dispatch_procedures(&reply, &[]);
        assert_eq!(
            result,
            Err(ProcessingError::PduMalformed { reason: "reply pdu on command path" })
        );
    }
}
