//! Security Associations: the cryptographic context of one channel.
//!
//! An SA binds a set of virtual channels to key ids, cipher suites, the
//! last accepted counters, and the widths of the variable security-header
//! fields. SAs move through `NONE -> UNKEYED -> KEYED -> OPERATIONAL`
//! with downgrades allowed one step at a time; skipping KEYED is
//! forbidden in both directions.

use sdls_crypto::MAC_LEN;
use sdls_proto::Gvcid;

use crate::{counter::Counter, error::ProcessingError, key_ring::KeyRing};

/// Authentication bit-mask capacity in bytes.
pub const ABM_SIZE: usize = 1024;

/// Lifecycle state of a security association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaState {
    /// Slot exists but holds no usable association
    None,
    /// Created, no key ids assigned
    Unkeyed,
    /// Key ids assigned, not passing traffic
    Keyed,
    /// Passing traffic
    Operational,
}

impl SaState {
    /// One-byte code used in status replies.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Unkeyed => 1,
            Self::Keyed => 2,
            Self::Operational => 3,
        }
    }
}

/// Encryption cipher suite selector (ECS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionSuite {
    /// No encryption
    #[default]
    None,
    /// AES-256 in Galois/Counter Mode
    Aes256Gcm,
}

impl EncryptionSuite {
    /// One-byte code used in SA-management PDUs.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Aes256Gcm => 1,
        }
    }

    /// Decode from the one-byte PDU code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Aes256Gcm),
            _ => None,
        }
    }
}

/// Authentication cipher suite selector (ACS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthenticationSuite {
    /// No standalone authentication (AEAD tag may still apply)
    #[default]
    None,
    /// AES-256 CMAC
    Aes256Cmac,
}

impl AuthenticationSuite {
    /// One-byte code used in SA-management PDUs.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Aes256Cmac => 1,
        }
    }

    /// Decode from the one-byte PDU code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Aes256Cmac),
            _ => None,
        }
    }
}

/// One (channel, MAP id) binding in an SA's admission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBinding {
    /// Channel identity
    pub gvcid: Gvcid,
    /// MAP id within the channel's segment headers
    pub mapid: u8,
}

/// A security association.
#[derive(Debug, Clone)]
pub struct SecurityAssociation {
    /// Security parameter index
    pub spi: u16,
    /// Lifecycle state
    pub state: SaState,
    /// Encryption enabled for this SA
    pub est: bool,
    /// Authentication enabled for this SA
    pub ast: bool,
    /// Encryption key id
    pub ekid: u16,
    /// Authentication key id
    pub akid: u16,
    /// Encryption cipher suite
    pub ecs: EncryptionSuite,
    /// Authentication cipher suite
    pub acs: AuthenticationSuite,
    /// Last used/accepted initialization vector
    pub iv: Counter,
    /// Last used/accepted anti-replay sequence number
    pub arsn: Counter,
    /// Anti-replay window width
    pub arsnw: u16,
    /// Authentication bit mask, ANDed over leading frame bytes
    pub abm: Vec<u8>,
    /// Pad-length field width in the security header
    pub shplf_len: usize,
    /// MAC field width in the security trailer
    pub stmacf_len: usize,
    /// Channels admitted by this SA
    pub channels: Vec<ChannelBinding>,
}

impl SecurityAssociation {
    /// A fresh UNKEYED association with nothing enabled.
    #[must_use]
    pub fn new(spi: u16) -> Self {
        Self {
            spi,
            state: SaState::Unkeyed,
            est: false,
            ast: false,
            ekid: 0,
            akid: 0,
            ecs: EncryptionSuite::None,
            acs: AuthenticationSuite::None,
            iv: Counter::zeroed(0),
            arsn: Counter::zeroed(0),
            arsnw: 0,
            abm: vec![0; ABM_SIZE],
            shplf_len: 0,
            stmacf_len: 0,
            channels: Vec::new(),
        }
    }

    /// IV field width in the security header.
    #[must_use]
    pub fn shivf_len(&self) -> usize {
        self.iv.len()
    }

    /// Sequence-number field width in the security header.
    #[must_use]
    pub fn shsnf_len(&self) -> usize {
        self.arsn.len()
    }

    /// True when the SA admits frames on `gvcid`, optionally narrowed to
    /// one MAP id.
    #[must_use]
    pub fn admits(&self, gvcid: Gvcid, mapid: Option<u8>) -> bool {
        self.channels
            .iter()
            .any(|b| b.gvcid == gvcid && mapid.is_none_or(|m| m == b.mapid))
    }

    /// Move to `target`, enforcing the one-step lifecycle.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::SaStateInvalid`] for any transition other than
    /// the adjacent ones.
    pub fn transition(&mut self, target: SaState) -> Result<(), ProcessingError> {
        let allowed = matches!(
            (self.state, target),
            (SaState::None, SaState::Unkeyed)
                | (SaState::Unkeyed, SaState::Keyed)
                | (SaState::Keyed, SaState::Operational | SaState::Unkeyed)
                | (SaState::Operational, SaState::Keyed)
        );
        if !allowed {
            return Err(ProcessingError::SaStateInvalid { spi: self.spi, state: self.state });
        }
        self.state = target;
        Ok(())
    }

    /// Check the invariants an SA must satisfy before going operational.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::SaStateInvalid`] when the flag/suite/width
    ///   combination is inconsistent
    /// - [`ProcessingError::KeyNotFound`] or
    ///   [`ProcessingError::KeyStateInvalid`] when encryption is enabled
    ///   but EKID does not name an ACTIVE key
    pub fn check_invariants(&self, keys: &KeyRing) -> Result<(), ProcessingError> {
        let broken = ProcessingError::SaStateInvalid { spi: self.spi, state: self.state };

        if self.est {
            if self.iv.is_empty() || self.ecs == EncryptionSuite::None {
                return Err(broken);
            }
            keys.active_value(self.ekid)?;
        }
        if self.ast {
            let has_tag_source =
                self.acs != AuthenticationSuite::None || self.ecs == EncryptionSuite::Aes256Gcm;
            if self.stmacf_len != MAC_LEN || !has_tag_source {
                return Err(broken);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_ring::KeyState;

    fn gvcid(vcid: u8) -> Gvcid {
        Gvcid { tfvn: 0, scid: 0x003, vcid }
    }

    fn bound_sa() -> SecurityAssociation {
        let mut sa = SecurityAssociation::new(9);
        sa.channels.push(ChannelBinding { gvcid: gvcid(0), mapid: 0 });
        sa.channels.push(ChannelBinding { gvcid: gvcid(1), mapid: 4 });
        sa
    }

    #[test]
    fn admits_by_channel_and_mapid() {
        let sa = bound_sa();
        assert!(sa.admits(gvcid(0), None));
        assert!(sa.admits(gvcid(1), Some(4)));
        assert!(!sa.admits(gvcid(1), Some(5)));
        assert!(!sa.admits(gvcid(2), None));
    }

    #[test]
    fn lifecycle_cannot_skip_keyed() {
        let mut sa = SecurityAssociation::new(1);
        assert_eq!(sa.state, SaState::Unkeyed);

        // UNKEYED -> OPERATIONAL must be rejected
        assert!(sa.transition(SaState::Operational).is_err());

        sa.transition(SaState::Keyed).unwrap();
        sa.transition(SaState::Operational).unwrap();
        sa.transition(SaState::Keyed).unwrap();
        sa.transition(SaState::Unkeyed).unwrap();
    }

    #[test]
    fn encryption_invariants() {
        let mut keys = KeyRing::new();
        keys.load(130, [1; 32], KeyState::Active).unwrap();

        let mut sa = SecurityAssociation::new(2);
        sa.est = true;
        sa.ecs = EncryptionSuite::Aes256Gcm;
        sa.ekid = 130;
        // Missing IV width
        assert!(sa.check_invariants(&keys).is_err());

        sa.iv = Counter::zeroed(12);
        sa.check_invariants(&keys).unwrap();

        sa.ecs = EncryptionSuite::None;
        assert!(sa.check_invariants(&keys).is_err());
    }

    #[test]
    fn encryption_requires_an_active_key() {
        let mut keys = KeyRing::new();
        keys.install(130, [1; 32]).unwrap();

        let mut sa = SecurityAssociation::new(2);
        sa.est = true;
        sa.ecs = EncryptionSuite::Aes256Gcm;
        sa.iv = Counter::zeroed(12);
        sa.ekid = 130;

        // Installed but still PREACTIVE
        assert_eq!(
            sa.check_invariants(&keys),
            Err(ProcessingError::KeyStateInvalid { kid: 130, state: KeyState::Preactive })
        );

        keys.transition(130, KeyState::Active).unwrap();
        sa.check_invariants(&keys).unwrap();

        // A key id with no slot at all
        sa.ekid = 0x1FF;
        assert_eq!(
            sa.check_invariants(&keys),
            Err(ProcessingError::KeyNotFound { kid: 0x1FF })
        );
    }

    #[test]
    fn authentication_invariants() {
        let keys = KeyRing::new();

        let mut sa = SecurityAssociation::new(3);
        sa.ast = true;
        // No MAC width, no tag source
        assert!(sa.check_invariants(&keys).is_err());

        sa.stmacf_len = 16;
        assert!(sa.check_invariants(&keys).is_err());

        sa.acs = AuthenticationSuite::Aes256Cmac;
        sa.check_invariants(&keys).unwrap();

        // AEAD tag satisfies authentication without a standalone suite
        sa.acs = AuthenticationSuite::None;
        sa.ecs = EncryptionSuite::Aes256Gcm;
        sa.check_invariants(&keys).unwrap();
    }
}
