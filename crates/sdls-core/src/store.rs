//! SA store contract and the bounded in-memory reference store.
//!
//! The store is single-writer: the engine takes it mutably for the whole
//! of one apply or process call, so counter read-modify-write stays
//! atomic with validation. Callers driving the engine from several
//! threads serialize access to the context externally.

use sdls_proto::Gvcid;

use crate::{
    error::ProcessingError,
    sa::{SaState, SecurityAssociation},
};

/// Largest SPI the engine accepts; also the table capacity.
pub const NUM_SA: u16 = 64;

/// Lookup and mutation contract consumed by the pipelines and by the
/// SA-management procedures.
pub trait SaStore: Send {
    /// The SA with this SPI, if present.
    fn by_spi(&self, spi: u16) -> Option<&SecurityAssociation>;

    /// Mutable access to the SA with this SPI.
    fn by_spi_mut(&mut self, spi: u16) -> Option<&mut SecurityAssociation>;

    /// The operational SA admitting this channel (and MAP id, when the
    /// mission binds SAs per MAP).
    fn operational_for(
        &mut self,
        gvcid: Gvcid,
        mapid: Option<u8>,
    ) -> Option<&mut SecurityAssociation>;

    /// Insert a new SA.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::SpiInvalid`] for SPIs outside `1..=NUM_SA`
    /// - [`ProcessingError::SaStateInvalid`] when the SPI is taken
    /// - [`ProcessingError::FrameSizeOverflow`] when the table is full
    fn insert(&mut self, sa: SecurityAssociation) -> Result<(), ProcessingError>;

    /// Remove the SA with this SPI.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::SpiInvalid`] when no such SA exists.
    fn remove(&mut self, spi: u16) -> Result<(), ProcessingError>;

    /// Iterate all SAs (uniqueness checks, inventories).
    fn iter(&self) -> Box<dyn Iterator<Item = &SecurityAssociation> + '_>;
}

/// Bounded in-memory SA table, the reference [`SaStore`].
#[derive(Default)]
pub struct InMemorySaStore {
    sas: Vec<SecurityAssociation>,
}

impl InMemorySaStore {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaStore for InMemorySaStore {
    fn by_spi(&self, spi: u16) -> Option<&SecurityAssociation> {
        self.sas.iter().find(|sa| sa.spi == spi)
    }

    fn by_spi_mut(&mut self, spi: u16) -> Option<&mut SecurityAssociation> {
        self.sas.iter_mut().find(|sa| sa.spi == spi)
    }

    fn operational_for(
        &mut self,
        gvcid: Gvcid,
        mapid: Option<u8>,
    ) -> Option<&mut SecurityAssociation> {
        self.sas
            .iter_mut()
            .find(|sa| sa.state == SaState::Operational && sa.admits(gvcid, mapid))
    }

    fn insert(&mut self, sa: SecurityAssociation) -> Result<(), ProcessingError> {
        if sa.spi == 0 || sa.spi > NUM_SA {
            return Err(ProcessingError::SpiInvalid { spi: sa.spi });
        }
        if self.by_spi(sa.spi).is_some() {
            return Err(ProcessingError::SaStateInvalid { spi: sa.spi, state: SaState::None });
        }
        if self.sas.len() >= usize::from(NUM_SA) {
            return Err(ProcessingError::FrameSizeOverflow {
                size: self.sas.len() + 1,
                max: usize::from(NUM_SA),
            });
        }
        self.sas.push(sa);
        Ok(())
    }

    fn remove(&mut self, spi: u16) -> Result<(), ProcessingError> {
        let before = self.sas.len();
        self.sas.retain(|sa| sa.spi != spi);
        if self.sas.len() == before {
            return Err(ProcessingError::SpiInvalid { spi });
        }
        Ok(())
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &SecurityAssociation> + '_> {
        Box::new(self.sas.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sa::ChannelBinding;

    fn gvcid(vcid: u8) -> Gvcid {
        Gvcid { tfvn: 0, scid: 0x003, vcid }
    }

    fn operational_sa(spi: u16, vcid: u8) -> SecurityAssociation {
        let mut sa = SecurityAssociation::new(spi);
        sa.state = SaState::Operational;
        sa.channels.push(ChannelBinding { gvcid: gvcid(vcid), mapid: 0 });
        sa
    }

    #[test]
    fn insert_and_lookup_by_spi() {
        let mut store = InMemorySaStore::new();
        store.insert(operational_sa(9, 0)).unwrap();

        assert_eq!(store.by_spi(9).map(|sa| sa.spi), Some(9));
        assert!(store.by_spi(10).is_none());
    }

    #[test]
    fn insert_rejects_reserved_and_duplicate_spi() {
        let mut store = InMemorySaStore::new();
        assert!(matches!(
            store.insert(operational_sa(0, 0)),
            Err(ProcessingError::SpiInvalid { spi: 0 })
        ));

        store.insert(operational_sa(9, 0)).unwrap();
        assert!(matches!(
            store.insert(operational_sa(9, 1)),
            Err(ProcessingError::SaStateInvalid { spi: 9, .. })
        ));
    }

    #[test]
    fn operational_lookup_skips_non_operational() {
        let mut store = InMemorySaStore::new();
        let mut idle = operational_sa(1, 0);
        idle.state = SaState::Keyed;
        store.insert(idle).unwrap();
        store.insert(operational_sa(9, 0)).unwrap();

        let found = store.operational_for(gvcid(0), None).map(|sa| sa.spi);
        assert_eq!(found, Some(9));
    }

    #[test]
    fn operational_lookup_respects_mapid() {
        let mut store = InMemorySaStore::new();
        store.insert(operational_sa(9, 0)).unwrap();

        assert!(store.operational_for(gvcid(0), Some(0)).is_some());
        assert!(store.operational_for(gvcid(0), Some(7)).is_none());
    }

    #[test]
    fn remove_unknown_spi_fails() {
        let mut store = InMemorySaStore::new();
        assert!(matches!(store.remove(4), Err(ProcessingError::SpiInvalid { spi: 4 })));
    }
}
