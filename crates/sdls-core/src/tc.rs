//! Telecommand apply/process pipelines.
//!
//! Apply wraps an outbound plaintext frame in security material; process
//! validates an inbound protected frame and strips it. Both walk the
//! same layout: primary header, optional segment header, security
//! header, payload, security trailer, optional FECF.
//!
//! Rejections are ordered: parse, authorization, integrity of the frame
//! envelope, anti-replay, cryptographic verification. Counters commit
//! only after every check has passed, so a rejected frame leaves the SA
//! byte-for-byte unchanged. Apply increments counters before invoking
//! the primitive; a failed apply therefore leaves the increment behind,
//! which is safe (counter gaps are tolerated) and keeps IVs single-use.

use bytes::{BufMut, Bytes, BytesMut};
use sdls_crypto::CryptoError;
use sdls_proto::{
    FrameError, SecurityHeader, SegmentHeader, TcPrimaryHeader, crc,
};

use crate::{
    config::ManagedParameters,
    context::CryptoContext,
    counter::Counter,
    error::ProcessingError,
    log::EventType,
    sa::{AuthenticationSuite, SaState, SecurityAssociation},
    store::NUM_SA,
};

/// Leading bytes that mark a processed payload as an extended-procedure
/// packet (version 0, secondary header, APID 0x080).
const PROCEDURE_PACKET_PREFIX: [u8; 2] = [0x18, 0x80];

/// FECF width when a channel carries one.
const FECF_LEN: usize = 2;

/// How the (EST, AST) flags and suites combine for one SA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CipherMode {
    /// EST=1, AST=1: AEAD encrypt-and-tag
    AuthenticatedEncryption,
    /// EST=0, AST=1, standalone MAC suite
    AuthenticationMac,
    /// EST=0, AST=1, tag supplied by the AEAD over cleartext
    AuthenticationAead,
    /// EST=0, AST=0 — and EST=1 alone, which is reserved and currently
    /// passes through in clear
    ClearPassThrough,
}

fn cipher_mode(sa: &SecurityAssociation) -> CipherMode {
    match (sa.est, sa.ast) {
        (true, true) => CipherMode::AuthenticatedEncryption,
        (false, true) => {
            if sa.acs == AuthenticationSuite::Aes256Cmac {
                CipherMode::AuthenticationMac
            } else {
                CipherMode::AuthenticationAead
            }
        },
        _ => CipherMode::ClearPassThrough,
    }
}

/// Bytewise AND of the leading frame bytes with the SA's authentication
/// bit mask, truncated to the security-header boundary.
fn build_aad(frame: &[u8], abm: &[u8], payload_offset: usize) -> Vec<u8> {
    let aad_len = abm.len().min(payload_offset).min(frame.len());
    frame[..aad_len].iter().zip(abm).map(|(byte, mask)| byte & mask).collect()
}

/// The verified output of one process call.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Parsed primary header (VCID already masked)
    pub header: TcPrimaryHeader,
    /// SPI the frame was processed under
    pub spi: u16,
    /// Verified plaintext payload; empty when the payload was an
    /// extended-procedure packet and was dispatched instead
    pub pdu: Bytes,
    /// Extended-procedure reply, when the payload was dispatched and
    /// the procedure produces one
    pub reply: Option<Bytes>,
}

impl CryptoContext {
    /// Apply security to an outbound plaintext TC frame.
    ///
    /// `frame` is the caller's frame: primary header, segment header if
    /// the channel carries one, then the service data unit. The result
    /// carries the security header and trailer, with the length field
    /// and FECF recomputed.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::NoApplicableSa`] when no operational SA
    ///   covers the channel
    /// - [`ProcessingError::KeyStateInvalid`] when a referenced key is
    ///   not ACTIVE
    /// - [`ProcessingError::FrameSizeOverflow`] when the protected frame
    ///   would not fit the 10-bit length field
    /// - [`ProcessingError::CounterWrap`] when the SA counter wraps
    pub fn apply_security(&mut self, frame: &[u8]) -> Result<Bytes, ProcessingError> {
        let header = TcPrimaryHeader::parse(frame)?;
        let gvcid = header.gvcid();
        let mp = *self.managed_parameters_for(&header)?;

        let mut offset = TcPrimaryHeader::SIZE;
        let segment = if mp.has_segment_header {
            let byte = *frame.get(offset).ok_or(FrameError::FrameTooShort {
                expected: offset + 1,
                actual: frame.len(),
            })?;
            offset += SegmentHeader::SIZE;
            Some(SegmentHeader::from_byte(byte))
        } else {
            None
        };
        let payload = &frame[offset..];
        let mapid = if self.config.unique_sa_per_mapid {
            segment.map(|s| s.mapid)
        } else {
            None
        };

        // Resolve the SA and commit the counter increments in one store
        // access, then work from a snapshot.
        let sa = {
            let sa = self
                .store
                .operational_for(gvcid, mapid)
                .ok_or(ProcessingError::NoApplicableSa { vcid: header.vcid, mapid })?;
            sa.check_invariants(&self.keys)?;
            let spi = sa.spi;
            match cipher_mode(sa) {
                CipherMode::AuthenticatedEncryption | CipherMode::AuthenticationAead => {
                    sa.iv.increment().map_err(|_| ProcessingError::CounterWrap { spi })?;
                },
                CipherMode::AuthenticationMac => {
                    sa.arsn.increment().map_err(|_| ProcessingError::CounterWrap { spi })?;
                },
                CipherMode::ClearPassThrough => {},
            }
            sa.clone()
        };
        let mode = cipher_mode(&sa);

        let mac_len = if sa.ast { sa.stmacf_len } else { 0 };
        let fecf_len = if mp.has_fecf && self.config.create_fecf { FECF_LEN } else { 0 };
        let sec_header = SecurityHeader {
            spi: if self.config.enable_fault_injection && self.fault.corrupt_spi {
                sa.spi.wrapping_add(1)
            } else {
                sa.spi
            },
            iv: sa.iv.as_bytes().to_vec(),
            sn: sa.arsn.as_bytes().to_vec(),
            pad_len: vec![0; sa.shplf_len],
        };

        let total = TcPrimaryHeader::SIZE
            + segment.map_or(0, |_| SegmentHeader::SIZE)
            + sec_header.encoded_len()
            + payload.len()
            + mac_len
            + fecf_len;
        if total > TcPrimaryHeader::MAX_FRAME_SIZE {
            return Err(ProcessingError::FrameSizeOverflow {
                size: total,
                max: TcPrimaryHeader::MAX_FRAME_SIZE,
            });
        }

        let mut out = BytesMut::with_capacity(total);
        TcPrimaryHeader { frame_len: (total - 1) as u16, ..header }.write(&mut out)?;
        if let Some(seg) = segment {
            out.put_u8(seg.to_byte());
        }
        sec_header.write(&mut out);

        if self.config.enable_fault_injection && self.fault.corrupt_iv && !sa.iv.is_empty() {
            let last = out.len() - sa.shplf_len - sa.shsnf_len() - 1;
            out[last] = out[last].wrapping_add(1);
        }

        let payload_offset = out.len();
        let aad = build_aad(&out, &sa.abm, payload_offset);

        match mode {
            CipherMode::AuthenticatedEncryption => {
                let key = self.keys.active_value(sa.ekid)?;
                let sealed = self.provider.aead_encrypt(key, sa.iv.as_bytes(), &aad, payload)?;
                out.put_slice(&sealed.ciphertext);
                out.put_slice(&sealed.tag[..mac_len.min(sealed.tag.len())]);
            },
            CipherMode::AuthenticationMac => {
                let key = self.keys.active_value(sa.akid)?;
                let mut data = aad.clone();
                data.extend_from_slice(payload);
                let tag = self.provider.mac_tag(key, &data)?;
                out.put_slice(payload);
                out.put_slice(&tag[..mac_len.min(tag.len())]);
            },
            CipherMode::AuthenticationAead => {
                let key = self.keys.active_value(sa.akid)?;
                let mut data = aad.clone();
                data.extend_from_slice(payload);
                let tag = self.provider.aead_tag_only(key, sa.iv.as_bytes(), &data)?;
                out.put_slice(payload);
                out.put_slice(&tag[..mac_len.min(tag.len())]);
            },
            CipherMode::ClearPassThrough => {
                out.put_slice(payload);
            },
        }

        if self.config.enable_fault_injection && self.fault.corrupt_mac && mac_len > 0 {
            let first_mac = out.len() - mac_len;
            out[first_mac] ^= 0xFF;
        }

        if fecf_len > 0 {
            let mut fecf = crc::fecf(&out);
            if self.config.enable_fault_injection && self.fault.corrupt_fecf {
                fecf = fecf.wrapping_add(1);
            }
            out.put_u16(fecf);
        }

        tracing::debug!(spi = sa.spi, len = out.len(), "security applied to tc frame");
        Ok(out.freeze())
    }

    /// Process an inbound protected TC frame.
    ///
    /// Walks the rejection points in order: header parse and managed
    /// parameters, SPI validity, SA state and channel admission, FECF,
    /// anti-replay, tag verification. Counters commit only after the
    /// tag verifies. Extended-procedure payloads are dispatched and the
    /// reply returned in [`ProcessedFrame::reply`].
    ///
    /// # Errors
    ///
    /// One typed error per rejection point; see [`ProcessingError`].
    /// Every frame-implicating rejection also updates the FSR and
    /// appends an event-log entry.
    pub fn process_security(&mut self, frame: &[u8]) -> Result<ProcessedFrame, ProcessingError> {
        let mut header = TcPrimaryHeader::parse(frame)?;
        header.vcid &= self.config.vcid_bitmask;
        let total = header.total_len();
        if total > frame.len() {
            return Err(
                FrameError::LengthOverflow { declared: total, available: frame.len() }.into()
            );
        }
        let gvcid = header.gvcid();
        let mp = *self.managed_parameters_for(&header)?;

        let mut offset = TcPrimaryHeader::SIZE;
        let segment = if mp.has_segment_header {
            let byte = *frame.get(offset).ok_or(FrameError::FrameTooShort {
                expected: offset + 1,
                actual: frame.len(),
            })?;
            offset += SegmentHeader::SIZE;
            Some(SegmentHeader::from_byte(byte))
        } else {
            None
        };

        // SPI is always the first two security-header bytes.
        if total < offset + SecurityHeader::SPI_SIZE {
            return Err(FrameError::FrameTooShort {
                expected: offset + SecurityHeader::SPI_SIZE,
                actual: total,
            }
            .into());
        }
        let spi = u16::from(frame[offset]) << 8 | u16::from(frame[offset + 1]);
        self.reporting.saw_spi(spi);

        if spi == 0x0000 || spi == 0xFFFF || spi > NUM_SA {
            return Err(self.reject_spi(spi));
        }
        let Some(sa) = self.store.by_spi(spi).cloned() else {
            return Err(self.reject_spi(spi));
        };

        if !self.config.ignore_sa_state && sa.state != SaState::Operational {
            self.reporting.flag_alarm();
            self.log.record(EventType::SaStateError, spi);
            tracing::warn!(spi, state = ?sa.state, "tc frame on non-operational sa");
            return Err(ProcessingError::SaStateInvalid { spi, state: sa.state });
        }

        let mapid = if self.config.unique_sa_per_mapid {
            segment.map(|s| s.mapid)
        } else {
            None
        };
        if !sa.admits(gvcid, mapid) {
            self.reporting.flag_alarm();
            self.log.record(EventType::ChannelError, spi);
            tracing::warn!(spi, vcid = header.vcid, "sa does not admit channel");
            return Err(ProcessingError::ChannelNotAdmitted { spi, vcid: header.vcid });
        }

        let fecf_len = if mp.has_fecf { FECF_LEN } else { 0 };
        if mp.has_fecf && self.config.check_fecf {
            let received = u16::from(frame[total - 2]) << 8 | u16::from(frame[total - 1]);
            let computed = crc::fecf(&frame[..total - FECF_LEN]);
            if received != computed {
                self.reporting.flag_alarm();
                self.log.record(EventType::FecfError, spi);
                tracing::warn!(spi, received, computed, "fecf mismatch");
                return Err(ProcessingError::FecfInvalid { received, computed });
            }
        }

        let sec_header = SecurityHeader::parse(
            &frame[offset..total],
            sa.shivf_len(),
            sa.shsnf_len(),
            sa.shplf_len,
        )?;
        offset += sec_header.encoded_len();

        let mode = cipher_mode(&sa);
        let received_counter = match mode {
            CipherMode::AuthenticatedEncryption | CipherMode::AuthenticationAead => {
                Some(Counter::from_slice(&sec_header.iv))
            },
            CipherMode::AuthenticationMac => Some(Counter::from_slice(&sec_header.sn)),
            CipherMode::ClearPassThrough => None,
        };
        if let Some(counter) = &received_counter {
            if let Some(low) = counter.as_bytes().last() {
                self.reporting.saw_sequence(*low);
            }
        }

        if !self.config.ignore_anti_replay {
            if let Some(counter) = &received_counter {
                self.check_anti_replay(&sa, mode, counter)?;
            }
        }

        let mac_len = if sa.ast { sa.stmacf_len } else { 0 };
        if total < offset + mac_len + fecf_len {
            return Err(FrameError::FrameTooShort {
                expected: offset + mac_len + fecf_len,
                actual: total,
            }
            .into());
        }
        let payload_end = total - fecf_len - mac_len;
        let payload = &frame[offset..payload_end];
        let mac = &frame[payload_end..payload_end + mac_len];
        let aad = build_aad(frame, &sa.abm, offset);

        let mut plaintext = match mode {
            CipherMode::AuthenticatedEncryption => {
                let key = self.keys.active_value(sa.ekid)?;
                match self.provider.aead_decrypt_and_verify(key, &sec_header.iv, &aad, payload, mac)
                {
                    Ok(plaintext) => plaintext,
                    Err(CryptoError::AuthenticationFailed) => return Err(self.reject_mac(spi)),
                    Err(err) => return Err(err.into()),
                }
            },
            CipherMode::AuthenticationMac => {
                let key = self.keys.active_value(sa.akid)?;
                let mut data = aad.clone();
                data.extend_from_slice(payload);
                match self.provider.mac_verify(key, &data, mac) {
                    Ok(()) => payload.to_vec(),
                    Err(CryptoError::AuthenticationFailed) => return Err(self.reject_mac(spi)),
                    Err(err) => return Err(err.into()),
                }
            },
            CipherMode::AuthenticationAead => {
                let key = self.keys.active_value(sa.akid)?;
                let mut data = aad.clone();
                data.extend_from_slice(payload);
                match self.provider.aead_decrypt_and_verify(key, &sec_header.iv, &data, &[], mac) {
                    Ok(_) => payload.to_vec(),
                    Err(CryptoError::AuthenticationFailed) => return Err(self.reject_mac(spi)),
                    Err(err) => return Err(err.into()),
                }
            },
            CipherMode::ClearPassThrough => payload.to_vec(),
        };

        let pad = usize::from(sec_header.pad_len_value());
        if pad <= plaintext.len() {
            plaintext.truncate(plaintext.len() - pad);
        }

        // Every check passed: commit the accepted counter.
        if let (Some(counter), Some(sa_mut)) = (&received_counter, self.store.by_spi_mut(spi)) {
            match mode {
                CipherMode::AuthenticatedEncryption | CipherMode::AuthenticationAead => {
                    sa_mut.iv.set_from_slice(counter.as_bytes());
                },
                CipherMode::AuthenticationMac => {
                    sa_mut.arsn.set_from_slice(counter.as_bytes());
                },
                CipherMode::ClearPassThrough => {},
            }
        }

        tracing::debug!(spi, len = plaintext.len(), "tc frame processed");

        if self.config.process_sdls_pdus && plaintext.starts_with(&PROCEDURE_PACKET_PREFIX) {
            let reply = self.dispatch_procedures(&plaintext, &sec_header.iv)?;
            return Ok(ProcessedFrame { header, spi, pdu: Bytes::new(), reply });
        }

        Ok(ProcessedFrame { header, spi, pdu: plaintext.into(), reply: None })
    }

    fn managed_parameters_for(
        &self,
        header: &TcPrimaryHeader,
    ) -> Result<&ManagedParameters, ProcessingError> {
        let gvcid = header.gvcid();
        self.config.managed_parameters(gvcid).ok_or_else(|| {
            if self.config.knows_scid(header.scid) {
                ProcessingError::ChannelNotManaged {
                    tfvn: header.tfvn,
                    scid: header.scid,
                    vcid: header.vcid,
                }
            } else {
                ProcessingError::ScidMismatch { scid: header.scid }
            }
        })
    }

    fn reject_spi(&mut self, spi: u16) -> ProcessingError {
        self.reporting.flag_invalid_spi();
        self.log.record(EventType::SpiInvalid, spi);
        tracing::warn!(spi, "invalid spi on received tc frame");
        ProcessingError::SpiInvalid { spi }
    }

    fn reject_mac(&mut self, spi: u16) -> ProcessingError {
        self.reporting.flag_bad_mac();
        self.log.record(EventType::MacError, spi);
        tracing::warn!(spi, "mac validation failed");
        ProcessingError::MacValidation { spi }
    }

    /// Window-then-replay ordering: a counter outside the window is a
    /// window failure even when it equals the stored value; the strict
    /// compare only fires for wrap anomalies inside the window.
    fn check_anti_replay(
        &mut self,
        sa: &SecurityAssociation,
        mode: CipherMode,
        received: &Counter,
    ) -> Result<(), ProcessingError> {
        let spi = sa.spi;
        let uses_iv = matches!(
            mode,
            CipherMode::AuthenticatedEncryption | CipherMode::AuthenticationAead
        );
        let last = if uses_iv { &sa.iv } else { &sa.arsn };

        if !received.within_window(last, usize::from(sa.arsnw)) {
            self.reporting.flag_bad_sequence();
            let event = if uses_iv { EventType::IvWindowError } else { EventType::ArsnWindowError };
            self.log.record(event, spi);
            tracing::warn!(spi, received = ?received, "counter outside anti-replay window");
            return Err(if uses_iv {
                ProcessingError::IvOutsideWindow { spi }
            } else {
                ProcessingError::ArsnOutsideWindow { spi }
            });
        }

        if received <= last {
            self.reporting.flag_bad_sequence();
            let event = if uses_iv { EventType::IvReplayError } else { EventType::ArsnReplayError };
            self.log.record(event, spi);
            tracing::warn!(spi, received = ?received, "counter replayed");
            return Err(if uses_iv {
                ProcessingError::IvReplay { spi }
            } else {
                ProcessingError::ArsnReplay { spi }
            });
        }

        Ok(())
    }
}
