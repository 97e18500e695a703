//! Key ring: key material and lifecycle states.
//!
//! Key ids below [`MASTER_KEY_THRESHOLD`] are master keys: they are
//! loaded before flight, protect OTAR uploads, and can neither be
//! state-transitioned by command nor replaced over the air. Ids at or
//! above the threshold are session keys with the full lifecycle.

use sdls_crypto::AES256_KEY_LEN;
use zeroize::Zeroize;

use crate::error::ProcessingError;

/// Number of key slots in the ring.
pub const KEY_RING_SIZE: usize = 256;

/// Key ids below this are master keys.
pub const MASTER_KEY_THRESHOLD: u16 = 128;

/// Lifecycle state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Installed but not yet usable for traffic
    Preactive,
    /// Usable for traffic
    Active,
    /// Retired from traffic, material still present
    Deactivated,
    /// Material destroyed
    Destroyed,
    /// Flagged unusable after a fault
    Corrupted,
}

impl KeyState {
    /// One-byte code used in inventory replies.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Preactive => 1,
            Self::Active => 2,
            Self::Deactivated => 3,
            Self::Destroyed => 4,
            Self::Corrupted => 5,
        }
    }

    /// True when a commanded transition from `self` to `target` moves
    /// exactly one step forward in the lifecycle.
    #[must_use]
    pub fn steps_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Preactive, Self::Active)
                | (Self::Active, Self::Deactivated)
                | (Self::Deactivated, Self::Destroyed)
        )
    }
}

/// One key slot: 256-bit material plus lifecycle state.
#[derive(Clone)]
pub struct Key {
    value: [u8; AES256_KEY_LEN],
    state: KeyState,
}

impl Key {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Key material.
    #[must_use]
    pub fn value(&self) -> &[u8; AES256_KEY_LEN] {
        &self.value
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// Fixed-size table of key slots indexed by key id.
pub struct KeyRing {
    keys: Vec<Key>,
}

impl KeyRing {
    /// Ring of [`KEY_RING_SIZE`] zeroed, pre-active slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: (0..KEY_RING_SIZE)
                .map(|_| Key { value: [0; AES256_KEY_LEN], state: KeyState::Preactive })
                .collect(),
        }
    }

    /// True when `kid` addresses a master key slot.
    #[must_use]
    pub fn is_master(kid: u16) -> bool {
        kid < MASTER_KEY_THRESHOLD
    }

    /// The key in slot `kid`, regardless of state.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::KeyNotFound`] when `kid` is out of range.
    pub fn get(&self, kid: u16) -> Result<&Key, ProcessingError> {
        self.keys.get(usize::from(kid)).ok_or(ProcessingError::KeyNotFound { kid })
    }

    /// Key material for traffic use: the key must be ACTIVE.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::KeyNotFound`] when `kid` is out of range
    /// - [`ProcessingError::KeyStateInvalid`] when the key is not ACTIVE
    pub fn active_value(&self, kid: u16) -> Result<&[u8; AES256_KEY_LEN], ProcessingError> {
        let key = self.get(kid)?;
        if key.state != KeyState::Active {
            return Err(ProcessingError::KeyStateInvalid { kid, state: key.state });
        }
        Ok(&key.value)
    }

    /// Install key material into a slot and mark it PREACTIVE.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::KeyNotFound`] when `kid` is out of range.
    pub fn install(&mut self, kid: u16, value: [u8; AES256_KEY_LEN]) -> Result<(), ProcessingError> {
        let key =
            self.keys.get_mut(usize::from(kid)).ok_or(ProcessingError::KeyNotFound { kid })?;
        key.value.zeroize();
        key.value = value;
        key.state = KeyState::Preactive;
        Ok(())
    }

    /// Install key material with an explicit state (ground loading).
    ///
    /// # Errors
    ///
    /// [`ProcessingError::KeyNotFound`] when `kid` is out of range.
    pub fn load(
        &mut self,
        kid: u16,
        value: [u8; AES256_KEY_LEN],
        state: KeyState,
    ) -> Result<(), ProcessingError> {
        self.install(kid, value)?;
        self.set_state(kid, state)
    }

    /// Commanded one-step-forward transition.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::KeyNotFound`] when `kid` is out of range
    /// - [`ProcessingError::KeyStateInvalid`] unless the current state is
    ///   exactly one step before `target`
    pub fn transition(&mut self, kid: u16, target: KeyState) -> Result<(), ProcessingError> {
        let current = self.get(kid)?.state;
        if !current.steps_to(target) {
            return Err(ProcessingError::KeyStateInvalid { kid, state: current });
        }
        self.set_state(kid, target)
    }

    /// Force a state without lifecycle checks (fault handling).
    ///
    /// # Errors
    ///
    /// [`ProcessingError::KeyNotFound`] when `kid` is out of range.
    pub fn set_state(&mut self, kid: u16, state: KeyState) -> Result<(), ProcessingError> {
        let key =
            self.keys.get_mut(usize::from(kid)).ok_or(ProcessingError::KeyNotFound { kid })?;
        key.state = state;
        if state == KeyState::Destroyed {
            key.value.zeroize();
        }
        Ok(())
    }

    /// Number of slots in the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// The ring always has slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for KeyRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_threshold_splits_the_ring() {
        assert!(KeyRing::is_master(0));
        assert!(KeyRing::is_master(127));
        assert!(!KeyRing::is_master(128));
    }

    #[test]
    fn active_value_requires_active_state() {
        let mut ring = KeyRing::new();
        ring.install(130, [0xAB; 32]).unwrap();

        let result = ring.active_value(130);
        assert_eq!(
            result,
            Err(ProcessingError::KeyStateInvalid { kid: 130, state: KeyState::Preactive })
        );

        ring.transition(130, KeyState::Active).unwrap();
        assert_eq!(ring.active_value(130).unwrap(), &[0xAB; 32]);
    }

    #[test]
    fn lifecycle_walks_one_step_at_a_time() {
        let mut ring = KeyRing::new();
        ring.install(130, [1; 32]).unwrap();

        // Two steps forward at once is rejected
        let result = ring.transition(130, KeyState::Deactivated);
        assert!(matches!(result, Err(ProcessingError::KeyStateInvalid { .. })));

        ring.transition(130, KeyState::Active).unwrap();
        ring.transition(130, KeyState::Deactivated).unwrap();
        ring.transition(130, KeyState::Destroyed).unwrap();
        assert_eq!(ring.get(130).unwrap().state(), KeyState::Destroyed);
    }

    #[test]
    fn repeated_activation_is_rejected() {
        let mut ring = KeyRing::new();
        ring.install(140, [2; 32]).unwrap();
        ring.transition(140, KeyState::Active).unwrap();

        let result = ring.transition(140, KeyState::Active);
        assert_eq!(
            result,
            Err(ProcessingError::KeyStateInvalid { kid: 140, state: KeyState::Active })
        );
    }

    #[test]
    fn destruction_zeroizes_material() {
        let mut ring = KeyRing::new();
        ring.load(131, [0xEE; 32], KeyState::Deactivated).unwrap();
        ring.transition(131, KeyState::Destroyed).unwrap();
        assert_eq!(ring.get(131).unwrap().value(), &[0u8; 32]);
    }

    #[test]
    fn out_of_range_kid_is_not_found() {
        let ring = KeyRing::new();
        assert_eq!(ring.get(0x1FF).err(), Some(ProcessingError::KeyNotFound { kid: 0x1FF }));
    }
}
