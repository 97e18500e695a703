//! The engine context: every piece of state the pipelines touch.
//!
//! There are no process-wide singletons. A [`CryptoContext`] owns the
//! configuration, the primitive provider, the SA store, the key ring,
//! the event log, and the report state; it is built once at
//! initialization and threaded through every call. Callers driving one
//! context from several threads serialize access externally so that
//! counter updates stay atomic with validation.

use sdls_crypto::{CryptoProvider, RustCryptoProvider};
use sdls_proto::OcfWord;

use crate::{
    config::{Config, ProviderKind, SaStoreKind},
    fault::FaultInjection,
    key_ring::KeyRing,
    log::{EventLog, EventType, LogSummary},
    report::Reporting,
    store::{InMemorySaStore, SaStore},
};

/// Protocol-engine state, constructed once and threaded through every
/// public operation.
pub struct CryptoContext {
    pub(crate) config: Config,
    pub(crate) provider: Box<dyn CryptoProvider>,
    pub(crate) store: Box<dyn SaStore>,
    pub(crate) keys: KeyRing,
    pub(crate) log: EventLog,
    pub(crate) reporting: Reporting,
    pub(crate) fault: FaultInjection,
}

impl CryptoContext {
    /// Initialize an engine with the implementations the configuration
    /// selects. Records the startup event.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let provider: Box<dyn CryptoProvider> = match config.provider_kind {
            ProviderKind::RustCrypto => Box::new(RustCryptoProvider::new()),
        };
        let store: Box<dyn SaStore> = match config.store_kind {
            SaStoreKind::InMemory => Box::new(InMemorySaStore::new()),
        };
        Self::with_parts(config, store, provider)
    }

    /// Initialize with caller-supplied store and provider (hardware
    /// security modules, persistent SA databases).
    #[must_use]
    pub fn with_parts(
        config: Config,
        store: Box<dyn SaStore>,
        provider: Box<dyn CryptoProvider>,
    ) -> Self {
        let mut log = EventLog::new();
        log.record(EventType::Startup, 0);
        tracing::debug!("sdls engine initialized");

        Self {
            config,
            provider,
            store,
            keys: KeyRing::new(),
            log,
            reporting: Reporting::new(),
            fault: FaultInjection::new(),
        }
    }

    /// Release the engine. Key material is zeroized as the ring drops.
    pub fn shutdown(self) {
        drop(self);
        tracing::debug!("sdls engine shut down");
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The key ring.
    #[must_use]
    pub fn key_ring(&self) -> &KeyRing {
        &self.keys
    }

    /// Mutable key ring (ground key loading).
    pub fn key_ring_mut(&mut self) -> &mut KeyRing {
        &mut self.keys
    }

    /// The SA store.
    #[must_use]
    pub fn sa_store(&self) -> &dyn SaStore {
        self.store.as_ref()
    }

    /// Mutable SA store (mission SA provisioning).
    pub fn sa_store_mut(&mut self) -> &mut dyn SaStore {
        self.store.as_mut()
    }

    /// The event log.
    #[must_use]
    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Current log fill level.
    #[must_use]
    pub fn log_summary(&self) -> LogSummary {
        self.log.summary()
    }

    /// Live report state (FSR and CLCW).
    #[must_use]
    pub fn reporting(&self) -> &Reporting {
        &self.reporting
    }

    /// Mutable report state (caller-maintained CLCW fields).
    pub fn reporting_mut(&mut self) -> &mut Reporting {
        &mut self.reporting
    }

    /// OCF word for the next outbound telemetry frame.
    pub fn next_ocf(&mut self) -> OcfWord {
        self.reporting.next_ocf()
    }

    /// Current fault-injection toggles.
    #[must_use]
    pub fn fault_injection(&self) -> &FaultInjection {
        &self.fault
    }
}
