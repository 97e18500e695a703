//! User service group: fault-injection controls for validation
//! campaigns.
//!
//! These never run in flight configurations: the dispatcher refuses the
//! whole service group unless the configuration enables fault injection.

use bytes::Bytes;
use sdls_proto::Procedure;

use crate::{
    context::CryptoContext,
    error::ProcessingError,
    key_ring::KeyState,
    procedures::{USER_REPLY_APID, be16},
};

impl CryptoContext {
    /// Route one user-defined procedure.
    ///
    /// 0 is the idle trigger (empty reply); 1 through 4 toggle
    /// corruption of SPI, IV, MAC, and FECF on subsequent applies; 5
    /// marks a key corrupted.
    pub(crate) fn user_procedure(
        &mut self,
        pid: u8,
        data: &[u8],
    ) -> Result<Option<Bytes>, ProcessingError> {
        match pid {
            0 => self.build_reply(Procedure::User(0), USER_REPLY_APID, &[]).map(Some),
            1 => {
                self.fault.corrupt_spi = !self.fault.corrupt_spi;
                tracing::debug!(armed = self.fault.corrupt_spi, "spi corruption toggled");
                Ok(None)
            },
            2 => {
                self.fault.corrupt_iv = !self.fault.corrupt_iv;
                tracing::debug!(armed = self.fault.corrupt_iv, "iv corruption toggled");
                Ok(None)
            },
            3 => {
                self.fault.corrupt_mac = !self.fault.corrupt_mac;
                tracing::debug!(armed = self.fault.corrupt_mac, "mac corruption toggled");
                Ok(None)
            },
            4 => {
                self.fault.corrupt_fecf = !self.fault.corrupt_fecf;
                tracing::debug!(armed = self.fault.corrupt_fecf, "fecf corruption toggled");
                Ok(None)
            },
            5 => {
                if data.len() < 2 {
                    return Err(ProcessingError::PduMalformed { reason: "key id missing" });
                }
                let kid = be16(data[0], data[1]);
                self.keys.set_state(kid, KeyState::Corrupted)?;
                tracing::debug!(kid, "key marked corrupted");
                Ok(None)
            },
            _ => Err(ProcessingError::PduMalformed { reason: "unsupported user procedure" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn armed_context() -> CryptoContext {
        let mut config = Config::new();
        config.enable_fault_injection = true;
        CryptoContext::new(config)
    }

    #[test]
    fn toggles_flip_and_flip_back() {
        let mut ctx = armed_context();
        ctx.user_procedure(3, &[]).unwrap();
        assert!(ctx.fault_injection().corrupt_mac);
        ctx.user_procedure(3, &[]).unwrap();
        assert!(!ctx.fault_injection().corrupt_mac);
    }

    #[test]
    fn corrupt_key_flags_the_slot() {
        let mut ctx = armed_context();
        ctx.user_procedure(5, &130u16.to_be_bytes()).unwrap();
        assert_eq!(ctx.key_ring().get(130).unwrap().state(), KeyState::Corrupted);
    }

    #[test]
    fn idle_trigger_replies_on_the_user_apid() {
        let mut ctx = armed_context();
        let reply = ctx.user_procedure(0, &[]).unwrap().unwrap();
        let envelope = sdls_proto::SpacePacketHeader::parse(&reply).unwrap();
        assert_eq!(envelope.apid, USER_REPLY_APID);
    }

    #[test]
    fn unknown_pid_is_rejected() {
        let mut ctx = armed_context();
        assert!(matches!(
            ctx.user_procedure(6, &[]),
            Err(ProcessingError::PduMalformed { .. })
        ));
    }
}
