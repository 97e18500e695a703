//! SA-management procedures: lifecycle and counter maintenance on the
//! SA store.
//!
//! Every PDU starts with the 16-bit SPI of the association it targets.
//! Transitions go through [`SecurityAssociation::transition`], so the
//! one-step lifecycle holds no matter what the ground sends.

use sdls_crypto::MAC_LEN;
use sdls_proto::Gvcid;

use crate::{
    context::CryptoContext,
    counter::{Counter, MAX_COUNTER_LEN},
    error::ProcessingError,
    procedures::be16,
    sa::{AuthenticationSuite, ChannelBinding, EncryptionSuite, SaState, SecurityAssociation},
};

/// Fixed size of a create PDU.
const CREATE_PDU_LEN: usize = 15;

/// One channel binding in a start PDU.
const BINDING_LEN: usize = 5;

fn spi_prefix(data: &[u8]) -> Result<(u16, &[u8]), ProcessingError> {
    if data.len() < 2 {
        return Err(ProcessingError::PduMalformed { reason: "spi missing" });
    }
    Ok((be16(data[0], data[1]), &data[2..]))
}

impl CryptoContext {
    fn sa_mut(&mut self, spi: u16) -> Result<&mut SecurityAssociation, ProcessingError> {
        self.store.by_spi_mut(spi).ok_or(ProcessingError::SpiInvalid { spi })
    }

    /// Create an UNKEYED association.
    ///
    /// PDU: `SPI(2) ‖ flags(1: bit0 EST, bit1 AST) ‖ SHIVF(1) ‖ SHSNF(1)
    /// ‖ SHPLF(1) ‖ STMACF(1) ‖ ECS(1) ‖ ACS(1) ‖ EKID(2) ‖ AKID(2) ‖
    /// ARSNW(2)`.
    pub(crate) fn sa_create(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        if data.len() < CREATE_PDU_LEN {
            return Err(ProcessingError::PduMalformed { reason: "create pdu too short" });
        }
        let spi = be16(data[0], data[1]);
        let flags = data[2];
        let shivf_len = usize::from(data[3]);
        let shsnf_len = usize::from(data[4]);
        if shivf_len > MAX_COUNTER_LEN || shsnf_len > MAX_COUNTER_LEN {
            return Err(ProcessingError::PduMalformed { reason: "counter width too large" });
        }
        let shplf_len = usize::from(data[5]);
        let stmacf_len = usize::from(data[6]);
        if shplf_len > MAX_COUNTER_LEN || stmacf_len > MAC_LEN {
            return Err(ProcessingError::PduMalformed { reason: "field width too large" });
        }

        let mut sa = SecurityAssociation::new(spi);
        sa.est = flags & 0x01 != 0;
        sa.ast = flags & 0x02 != 0;
        sa.iv = Counter::zeroed(shivf_len);
        sa.arsn = Counter::zeroed(shsnf_len);
        sa.shplf_len = shplf_len;
        sa.stmacf_len = stmacf_len;
        sa.ecs = EncryptionSuite::from_code(data[7])
            .ok_or(ProcessingError::PduMalformed { reason: "unknown encryption suite" })?;
        sa.acs = AuthenticationSuite::from_code(data[8])
            .ok_or(ProcessingError::PduMalformed { reason: "unknown authentication suite" })?;
        sa.ekid = be16(data[9], data[10]);
        sa.akid = be16(data[11], data[12]);
        sa.arsnw = be16(data[13], data[14]);

        self.store.insert(sa)?;
        tracing::debug!(spi, "sa created");
        Ok(())
    }

    /// Delete an association outright.
    pub(crate) fn sa_delete(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        let (spi, _) = spi_prefix(data)?;
        self.store.remove(spi)?;
        tracing::debug!(spi, "sa deleted");
        Ok(())
    }

    /// Assign key ids: UNKEYED to KEYED.
    ///
    /// PDU: `SPI(2) ‖ EKID(2) ‖ AKID(2)`.
    pub(crate) fn sa_rekey(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        let (spi, rest) = spi_prefix(data)?;
        if rest.len() < 4 {
            return Err(ProcessingError::PduMalformed { reason: "rekey key ids missing" });
        }
        let ekid = be16(rest[0], rest[1]);
        let akid = be16(rest[2], rest[3]);

        let sa = self.sa_mut(spi)?;
        sa.transition(SaState::Keyed)?;
        sa.ekid = ekid;
        sa.akid = akid;
        tracing::debug!(spi, ekid, akid, "sa rekeyed");
        Ok(())
    }

    /// Retire key material: KEYED to UNKEYED.
    pub(crate) fn sa_expire(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        let (spi, _) = spi_prefix(data)?;
        self.sa_mut(spi)?.transition(SaState::Unkeyed)?;
        tracing::debug!(spi, "sa expired");
        Ok(())
    }

    /// Begin operational service: KEYED to OPERATIONAL.
    ///
    /// PDU: `SPI(2) ‖ {TFVN(1) ‖ SCID(2) ‖ VCID(1) ‖ MAPID(1)}*`. An
    /// empty binding list keeps the SA's existing channel table. At most
    /// one SA may be operational per channel (per MAP id when the
    /// mission binds SAs that way), so a conflicting start is refused.
    pub(crate) fn sa_start(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        let (spi, rest) = spi_prefix(data)?;
        if rest.len() % BINDING_LEN != 0 {
            return Err(ProcessingError::PduMalformed { reason: "channel bindings misaligned" });
        }

        let sa = self.store.by_spi(spi).ok_or(ProcessingError::SpiInvalid { spi })?;
        sa.check_invariants(&self.keys)?;
        let bindings: Vec<ChannelBinding> = if rest.is_empty() {
            sa.channels.clone()
        } else {
            rest.chunks_exact(BINDING_LEN)
                .map(|c| ChannelBinding {
                    gvcid: Gvcid { tfvn: c[0], scid: be16(c[1], c[2]), vcid: c[3] },
                    mapid: c[4],
                })
                .collect()
        };

        let per_mapid = self.config.unique_sa_per_mapid;
        let conflict = self.store.iter().any(|other| {
            other.spi != spi
                && other.state == SaState::Operational
                && bindings.iter().any(|b| {
                    other.admits(b.gvcid, if per_mapid { Some(b.mapid) } else { None })
                })
        });
        if conflict {
            tracing::warn!(spi, "sa start refused: channel already has an operational sa");
            return Err(ProcessingError::DuplicateOperationalSa { spi });
        }

        let sa = self.sa_mut(spi)?;
        sa.transition(SaState::Operational)?;
        sa.channels = bindings;
        tracing::debug!(spi, "sa started");
        Ok(())
    }

    /// Suspend operational service: OPERATIONAL to KEYED.
    pub(crate) fn sa_stop(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        let (spi, _) = spi_prefix(data)?;
        self.sa_mut(spi)?.transition(SaState::Keyed)?;
        tracing::debug!(spi, "sa stopped");
        Ok(())
    }

    /// Overwrite an anti-replay counter.
    ///
    /// PDU: `SPI(2) ‖ counter`. The counter is matched by width: the
    /// ARSN when the bytes fit its field, otherwise the IV.
    pub(crate) fn sa_set_arsn(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        let (spi, rest) = spi_prefix(data)?;
        let sa = self.sa_mut(spi)?;
        if !sa.arsn.is_empty() && rest.len() == sa.arsn.len() {
            sa.arsn.set_from_slice(rest);
        } else if !sa.iv.is_empty() && rest.len() == sa.iv.len() {
            sa.iv.set_from_slice(rest);
        } else {
            return Err(ProcessingError::PduMalformed { reason: "counter width mismatch" });
        }
        tracing::debug!(spi, "sa counter set");
        Ok(())
    }

    /// Overwrite the anti-replay window width.
    ///
    /// PDU: `SPI(2) ‖ ARSNW(2)`.
    pub(crate) fn sa_set_arsnw(&mut self, data: &[u8]) -> Result<(), ProcessingError> {
        let (spi, rest) = spi_prefix(data)?;
        if rest.len() < 2 {
            return Err(ProcessingError::PduMalformed { reason: "arsnw missing" });
        }
        let arsnw = be16(rest[0], rest[1]);
        self.sa_mut(spi)?.arsnw = arsnw;
        tracing::debug!(spi, arsnw, "sa window set");
        Ok(())
    }

    /// Report an anti-replay counter.
    ///
    /// Reply: `SPI(2) ‖ counter` (the ARSN when present, else the IV).
    pub(crate) fn sa_read_arsn(&mut self, data: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        let (spi, _) = spi_prefix(data)?;
        let sa = self.store.by_spi(spi).ok_or(ProcessingError::SpiInvalid { spi })?;

        let counter =
            if sa.arsn.is_empty() { sa.iv.as_bytes() } else { sa.arsn.as_bytes() };
        let mut reply = Vec::with_capacity(2 + counter.len());
        reply.extend_from_slice(&spi.to_be_bytes());
        reply.extend_from_slice(counter);
        Ok(reply)
    }

    /// Report the SA state.
    ///
    /// Reply: `SPI(2) ‖ state(1)`.
    pub(crate) fn sa_status(&mut self, data: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        let (spi, _) = spi_prefix(data)?;
        let sa = self.store.by_spi(spi).ok_or(ProcessingError::SpiInvalid { spi })?;
        Ok(vec![data[0], data[1], sa.state.code()])
    }
}
