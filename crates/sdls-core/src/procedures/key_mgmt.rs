//! Key-management procedures: OTAR, state transitions, verification,
//! inventory.

use sdls_crypto::{AES256_KEY_LEN, GCM_IV_LEN, MAC_LEN};

use crate::{
    context::CryptoContext,
    error::ProcessingError,
    key_ring::{KeyRing, KeyState},
    log::EventType,
    procedures::be16,
};

/// Challenge length in a key-verification block.
pub const CHALLENGE_LEN: usize = 16;

/// OTAR PDU prefix: master key id plus upload IV.
const OTAR_PREFIX_LEN: usize = 2 + GCM_IV_LEN;

/// One encrypted upload block: session key id plus key material.
const OTAR_BLOCK_LEN: usize = 2 + AES256_KEY_LEN;

/// One key-verification request block: key id plus challenge.
const VERIFY_BLOCK_LEN: usize = 2 + CHALLENGE_LEN;

impl CryptoContext {
    /// Over-the-air rekeying.
    ///
    /// PDU: `MKID(2) ‖ IV ‖ {EKID(2) ‖ EK(32)}* ‖ MAC(16)`, with the key
    /// blocks encrypted under the master key. Delivered keys install as
    /// PREACTIVE. The whole upload is validated before any key is
    /// installed, so a bad block leaves the ring untouched.
    pub(crate) fn key_otar(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        if data.len() < OTAR_PREFIX_LEN + MAC_LEN {
            return Err(ProcessingError::PduMalformed { reason: "otar pdu too short" });
        }

        let mkid = be16(data[0], data[1]);
        if !KeyRing::is_master(mkid) {
            self.reporting.flag_alarm();
            self.log.record(EventType::MkidInvalid, mkid);
            tracing::warn!(mkid, "otar rejected: key id is not a master key");
            return Err(ProcessingError::OtarMasterKeyInvalid { kid: mkid });
        }

        let iv = &data[2..OTAR_PREFIX_LEN];
        let ciphertext = &data[OTAR_PREFIX_LEN..data.len() - MAC_LEN];
        let tag = &data[data.len() - MAC_LEN..];
        if ciphertext.is_empty() || ciphertext.len() % OTAR_BLOCK_LEN != 0 {
            return Err(ProcessingError::PduMalformed { reason: "otar key blocks misaligned" });
        }

        let master = self.keys.get(mkid)?.value();
        let plaintext = self.provider.aead_decrypt_and_verify(master, iv, &[], ciphertext, tag)?;

        let mut uploads = Vec::with_capacity(plaintext.len() / OTAR_BLOCK_LEN);
        for block in plaintext.chunks_exact(OTAR_BLOCK_LEN) {
            let ekid = be16(block[0], block[1]);
            if KeyRing::is_master(ekid) {
                self.reporting.flag_alarm();
                self.log.record(EventType::OtarMasterKey, ekid);
                tracing::warn!(ekid, "otar rejected: cannot deliver into the master range");
                return Err(ProcessingError::OtarMasterKeyInvalid { kid: ekid });
            }
            // Range check before any block installs
            self.keys.get(ekid)?;
            let mut key = [0u8; AES256_KEY_LEN];
            key.copy_from_slice(&block[2..]);
            uploads.push((ekid, key));
        }

        let count = uploads.len();
        for (ekid, key) in uploads {
            self.keys.install(ekid, key)?;
        }
        tracing::debug!(mkid, count, "otar installed session keys");
        Ok(())
    }

    /// Commanded key state transition (activation, deactivation,
    /// destruction).
    ///
    /// PDU: a flat list of 16-bit key ids. Master keys cannot be
    /// transitioned, and each key must be exactly one lifecycle step
    /// before `target`. The list is validated before any state changes.
    pub(crate) fn key_update(
        &mut self,
        data: &[u8],
        target: KeyState,
    ) -> Result<(), ProcessingError> {
        if data.is_empty() || data.len() % 2 != 0 {
            return Err(ProcessingError::PduMalformed { reason: "key id list misaligned" });
        }
        let kids: Vec<u16> = data.chunks_exact(2).map(|c| be16(c[0], c[1])).collect();

        for &kid in &kids {
            let state = self.keys.get(kid)?.state();
            if KeyRing::is_master(kid) {
                self.reporting.flag_alarm();
                self.log.record(EventType::MasterKeyStateError, kid);
                tracing::warn!(kid, "state change on a master key rejected");
                return Err(ProcessingError::KeyStateInvalid { kid, state });
            }
            if !state.steps_to(target) {
                self.log.record(EventType::KeyTransitionError, kid);
                tracing::warn!(kid, from = ?state, to = ?target, "key transition rejected");
                return Err(ProcessingError::KeyStateInvalid { kid, state });
            }
        }
        for &kid in &kids {
            self.keys.set_state(kid, target)?;
        }
        tracing::debug!(count = kids.len(), to = ?target, "key states updated");
        Ok(())
    }

    /// Key verification challenge-response.
    ///
    /// Request: `{KID(2) ‖ challenge(16)}*`. Each challenge is encrypted
    /// under its key with a nonce derived from the carrier frame's IV by
    /// folding the one-based block index into the trailing byte, so no
    /// two blocks (and no block and the carrier) share a nonce.
    ///
    /// Reply: `{KID(2) ‖ IV(12) ‖ ciphertext(16) ‖ tag(16)}*`.
    pub(crate) fn key_verify(
        &mut self,
        data: &[u8],
        carrier_iv: &[u8],
    ) -> Result<Vec<u8>, ProcessingError> {
        if data.is_empty() || data.len() % VERIFY_BLOCK_LEN != 0 {
            return Err(ProcessingError::PduMalformed { reason: "verify blocks misaligned" });
        }

        let blocks = data.len() / VERIFY_BLOCK_LEN;
        let mut reply = Vec::with_capacity(blocks * (2 + GCM_IV_LEN + CHALLENGE_LEN + MAC_LEN));
        for (index, block) in data.chunks_exact(VERIFY_BLOCK_LEN).enumerate() {
            let kid = be16(block[0], block[1]);
            let challenge = &block[2..];

            let mut iv = [0u8; GCM_IV_LEN];
            let n = carrier_iv.len().min(GCM_IV_LEN);
            iv[GCM_IV_LEN - n..].copy_from_slice(&carrier_iv[carrier_iv.len() - n..]);
            iv[GCM_IV_LEN - 1] ^= (index as u8).wrapping_add(1);

            let key = self.keys.get(kid)?.value();
            let sealed = self.provider.aead_encrypt(key, &iv, &[], challenge)?;

            reply.extend_from_slice(&kid.to_be_bytes());
            reply.extend_from_slice(&iv);
            reply.extend_from_slice(&sealed.ciphertext);
            reply.extend_from_slice(&sealed.tag);
        }
        Ok(reply)
    }

    /// Key inventory range query.
    ///
    /// Request: `first(2) ‖ last(2)`. Reply: `count(2) ‖ {KID(2) ‖
    /// state(1)}` for each id in `first..last`.
    pub(crate) fn key_inventory(&mut self, data: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        if data.len() < 4 {
            return Err(ProcessingError::PduMalformed { reason: "inventory range missing" });
        }
        let first = be16(data[0], data[1]);
        let last = be16(data[2], data[3]);
        if first > last || usize::from(last) > self.keys.len() {
            return Err(ProcessingError::PduMalformed { reason: "inventory range invalid" });
        }

        let count = last - first;
        let mut reply = Vec::with_capacity(2 + usize::from(count) * 3);
        reply.extend_from_slice(&count.to_be_bytes());
        for kid in first..last {
            reply.extend_from_slice(&kid.to_be_bytes());
            reply.push(self.keys.get(kid)?.state().code());
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn context() -> CryptoContext {
        let mut ctx = CryptoContext::new(Config::new());
        ctx.key_ring_mut().load(0, [0x11; 32], KeyState::Active).unwrap();
        ctx
    }

    #[test]
    fn key_update_is_all_or_nothing() {
        let mut ctx = context();
        ctx.key_ring_mut().install(130, [1; 32]).unwrap();
        ctx.key_ring_mut().load(131, [2; 32], KeyState::Active).unwrap();

        // 131 is already ACTIVE, so the whole command must fail
        let pdu = [0x00, 0x82, 0x00, 0x83];
        let result = ctx.key_update(&pdu, KeyState::Active);
        assert!(matches!(result, Err(ProcessingError::KeyStateInvalid { kid: 131, .. })));

        // 130 must not have moved
        assert_eq!(ctx.key_ring().get(130).unwrap().state(), KeyState::Preactive);
    }

    #[test]
    fn otar_is_atomic_across_bad_key_ids() {
        use sdls_crypto::{CryptoProvider, RustCryptoProvider};

        let mut ctx = context();

        // First block is fine, second names a slot past the ring
        let upload_iv = [0x0C; 12];
        let mut plaintext = Vec::new();
        plaintext.extend_from_slice(&130u16.to_be_bytes());
        plaintext.extend_from_slice(&[0xA0; 32]);
        plaintext.extend_from_slice(&300u16.to_be_bytes());
        plaintext.extend_from_slice(&[0xA1; 32]);
        let sealed = RustCryptoProvider::new()
            .aead_encrypt(&[0x11; 32], &upload_iv, &[], &plaintext)
            .unwrap();

        let mut data = 0u16.to_be_bytes().to_vec();
        data.extend_from_slice(&upload_iv);
        data.extend_from_slice(&sealed.ciphertext);
        data.extend_from_slice(&sealed.tag);

        let result = ctx.key_otar(&data);
        assert_eq!(result, Err(ProcessingError::KeyNotFound { kid: 300 }));
        // The valid first block must not have been installed
        assert_eq!(ctx.key_ring().get(130).unwrap().value(), &[0u8; 32]);
    }

    #[test]
    fn key_update_rejects_master_keys() {
        let mut ctx = context();
        let pdu = [0x00, 0x05];
        let result = ctx.key_update(&pdu, KeyState::Active);
        assert!(matches!(result, Err(ProcessingError::KeyStateInvalid { kid: 5, .. })));
        assert!(ctx.reporting().fsr.alarm);
    }

    #[test]
    fn key_verify_derives_one_nonce_per_block() {
        let mut ctx = context();
        ctx.key_ring_mut().load(130, [3; 32], KeyState::Active).unwrap();
        ctx.key_ring_mut().load(131, [4; 32], KeyState::Active).unwrap();

        let mut pdu = Vec::new();
        pdu.extend_from_slice(&130u16.to_be_bytes());
        pdu.extend_from_slice(&[0xC1; CHALLENGE_LEN]);
        pdu.extend_from_slice(&131u16.to_be_bytes());
        pdu.extend_from_slice(&[0xC2; CHALLENGE_LEN]);

        let carrier_iv = [0xAB; 12];
        let reply = ctx.key_verify(&pdu, &carrier_iv).unwrap();

        let block_len = 2 + 12 + CHALLENGE_LEN + 16;
        assert_eq!(reply.len(), 2 * block_len);

        let iv0 = &reply[2..14];
        let iv1 = &reply[block_len + 2..block_len + 14];
        assert_eq!(iv0[11], 0xAB ^ 1);
        assert_eq!(iv1[11], 0xAB ^ 2);
        assert_ne!(iv0, iv1);
    }

    #[test]
    fn key_inventory_reports_states() {
        let mut ctx = context();
        ctx.key_ring_mut().load(128, [1; 32], KeyState::Active).unwrap();

        let mut pdu = Vec::new();
        pdu.extend_from_slice(&128u16.to_be_bytes());
        pdu.extend_from_slice(&130u16.to_be_bytes());

        let reply = ctx.key_inventory(&pdu).unwrap();
        assert_eq!(&reply[..2], &2u16.to_be_bytes());
        // kid 128 ACTIVE
        assert_eq!(&reply[2..5], &[0x00, 0x80, KeyState::Active.code()]);
        // kid 129 untouched, PREACTIVE
        assert_eq!(&reply[5..8], &[0x00, 0x81, KeyState::Preactive.code()]);
    }

    #[test]
    fn inventory_range_is_validated() {
        let mut ctx = context();
        let mut pdu = Vec::new();
        pdu.extend_from_slice(&10u16.to_be_bytes());
        pdu.extend_from_slice(&5u16.to_be_bytes());
        assert!(matches!(
            ctx.key_inventory(&pdu),
            Err(ProcessingError::PduMalformed { .. })
        ));
    }
}
